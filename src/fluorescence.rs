//
// fluorescence.rs
// PDT-Tools-rs
//
// Corrects and summarizes fluorescence intensity samples, compares pre- and post-treatment
// acquisitions, scores the treatment effect and writes a narrative report.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::models::{
    AnalysisReport, Background, ComparisonResult, FluorescenceMetrics, FluorescenceRequest,
    FluorescenceResponse, FluorescenceSample, Interpretation, NormalizationMethod, RegionChange,
    RegionMetrics, TissueType, TreatmentEffectScore,
};
use crate::stats::{self, round_dp};

pub const DEFAULT_EXCITATION_NM: f64 = 405.0;
pub const DEFAULT_EMISSION_NM: f64 = 635.0;
pub const DEFAULT_HISTOGRAM_BINS: usize = 20;
pub const MAX_HISTOGRAM_BINS: usize = 4096;
/// Upper bound on normalized values echoed back in a response.
pub const NORMALIZED_PREVIEW_LEN: usize = 100;

/// Score bucket lower bounds, highest first.
const INTERPRETATION_BUCKETS: &[(f64, Interpretation)] = &[
    (8.0, Interpretation::Excellent),
    (6.0, Interpretation::Good),
    (4.0, Interpretation::Moderate),
    (2.0, Interpretation::Limited),
];

/// How a sample is corrected and summarized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingOptions {
    pub tissue: TissueType,
    pub excitation_nm: f64,
    pub emission_nm: f64,
    pub background_correction: bool,
    pub normalization: NormalizationMethod,
    pub histogram_bins: usize,
}

impl ProcessingOptions {
    pub fn new(tissue: TissueType) -> Self {
        Self {
            tissue,
            excitation_nm: DEFAULT_EXCITATION_NM,
            emission_nm: DEFAULT_EMISSION_NM,
            background_correction: true,
            normalization: NormalizationMethod::Max,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
        }
    }
}

/// Optical correction relative to oral mucosa.
pub fn tissue_correction_factor(tissue: TissueType) -> f64 {
    match tissue {
        TissueType::Skin => 1.2,
        TissueType::OralMucosa => 1.0,
        TissueType::Muscle => 1.3,
        TissueType::Brain => 0.9,
        TissueType::Liver => 1.4,
        TissueType::Other => 1.0,
    }
}

fn score_tissue_factor(tissue: TissueType) -> f64 {
    match tissue {
        TissueType::OralMucosa => 1.2,
        TissueType::Skin => 1.0,
        TissueType::Muscle => 0.8,
        _ => 1.0,
    }
}

/// Subtracts a background and clamps at zero.
///
/// A scalar is broadcast, a same-length sequence is subtracted pairwise, and any other
/// sequence contributes only its mean.
pub fn subtract_background(values: &[f64], background: &Background) -> Vec<f64> {
    match background {
        Background::Uniform(level) => values.iter().map(|v| (v - level).max(0.0)).collect(),
        Background::PerPixel(levels) if levels.len() == values.len() => values
            .iter()
            .zip(levels)
            .map(|(v, level)| (v - level).max(0.0))
            .collect(),
        Background::PerPixel(levels) => {
            let level = stats::mean(levels).unwrap_or(0.0);
            values.iter().map(|v| (v - level).max(0.0)).collect()
        }
    }
}

/// Regions carry no pixel positions, so they only see a single background level.
fn region_background(background: &Background) -> Background {
    match background {
        Background::Uniform(level) => Background::Uniform(*level),
        Background::PerPixel(levels) => Background::Uniform(stats::mean(levels).unwrap_or(0.0)),
    }
}

fn correct(values: &[f64], background: Option<&Background>, tissue_factor: f64) -> Vec<f64> {
    let mut corrected = match background {
        Some(background) => subtract_background(values, background),
        None => values.to_vec(),
    };
    corrected.iter_mut().for_each(|v| *v *= tissue_factor);
    corrected
}

/// Bin counts and edges are echoed back, so the count is capped.
pub fn check_histogram_bins(bins: usize) -> Result<usize, ValidationError> {
    if bins == 0 {
        return Err(ValidationError::invalid(
            "histogram_bins",
            "must be greater than 0",
        ));
    }
    if bins > MAX_HISTOGRAM_BINS {
        return Err(ValidationError::invalid(
            "histogram_bins",
            format!("must be at most {}", MAX_HISTOGRAM_BINS),
        ));
    }
    Ok(bins)
}

/// Corrects a sample and computes its statistics, region metrics, normalized preview and histogram.
pub fn process_image_data(
    sample: &FluorescenceSample,
    options: &ProcessingOptions,
) -> Result<FluorescenceMetrics, ValidationError> {
    check_histogram_bins(options.histogram_bins)?;

    let background = sample
        .background
        .as_ref()
        .filter(|_| options.background_correction);
    let tissue_factor = tissue_correction_factor(options.tissue);

    let corrected = correct(&sample.intensity, background, tissue_factor);
    let summary = stats::summarize(&corrected).ok_or(ValidationError::EmptySample {
        field: "intensity",
    })?;

    let region_bg = background.map(region_background);
    let regions = sample
        .regions
        .iter()
        .filter_map(|(name, values)| {
            let corrected = correct(values, region_bg.as_ref(), tissue_factor);
            let region = stats::summarize(&corrected)?;
            let relative_intensity = if summary.mean != 0.0 {
                region.mean / summary.mean
            } else {
                0.0
            };
            Some((
                name.clone(),
                RegionMetrics {
                    pixel_count: region.count,
                    mean_intensity: region.mean,
                    max_intensity: region.max,
                    relative_intensity,
                },
            ))
        })
        .collect();

    let normalized_preview = stats::normalize(&corrected, options.normalization)
        .iter()
        .take(NORMALIZED_PREVIEW_LEN)
        .copied()
        .collect();

    Ok(FluorescenceMetrics {
        pixel_count: summary.count,
        mean_intensity: summary.mean,
        max_intensity: summary.max,
        min_intensity: summary.min,
        std_deviation: summary.std_dev,
        coefficient_of_variation: summary.coefficient_of_variation,
        histogram: stats::histogram(&corrected, options.histogram_bins),
        regions,
        normalization_method: options.normalization,
        normalized_preview,
        tissue_type: options.tissue,
        excitation_wavelength: options.excitation_nm,
        emission_wavelength: options.emission_nm,
    })
}

fn percent_change(before: f64, after: f64) -> f64 {
    if before != 0.0 {
        (after - before) / before * 100.0
    } else {
        0.0
    }
}

/// Derives the pre/post comparison. `None` unless both acquisitions are present.
pub fn compare_results(
    pre: Option<&FluorescenceMetrics>,
    post: Option<&FluorescenceMetrics>,
) -> Option<ComparisonResult> {
    let (pre, post) = (pre?, post?);

    let mean_intensity_change_pct = percent_change(pre.mean_intensity, post.mean_intensity);
    let max_intensity_change_pct = percent_change(pre.max_intensity, post.max_intensity);
    let photobleaching_ratio = if pre.mean_intensity != 0.0 {
        post.mean_intensity / pre.mean_intensity
    } else {
        1.0
    };

    let region_changes: BTreeMap<String, RegionChange> = pre
        .regions
        .iter()
        .filter_map(|(name, before)| {
            let after = post.regions.get(name)?;
            Some((
                name.clone(),
                RegionChange {
                    pre_mean_intensity: before.mean_intensity,
                    post_mean_intensity: after.mean_intensity,
                    intensity_change_pct: percent_change(before.mean_intensity, after.mean_intensity),
                },
            ))
        })
        .collect();

    let treatment_effect = calculate_treatment_effect_score(
        mean_intensity_change_pct,
        photobleaching_ratio,
        pre.tissue_type,
    );

    Some(ComparisonResult {
        mean_intensity_change_pct,
        max_intensity_change_pct,
        photobleaching_ratio,
        region_changes,
        treatment_effect,
    })
}

/// Scores photobleaching on a 0-10 scale; more bleaching scores higher.
///
/// A non-finite ratio is reconstructed from the mean intensity change.
pub fn calculate_treatment_effect_score(
    mean_intensity_change_pct: f64,
    photobleaching_ratio: f64,
    tissue: TissueType,
) -> TreatmentEffectScore {
    let ratio = if photobleaching_ratio.is_finite() {
        photobleaching_ratio
    } else {
        1.0 + mean_intensity_change_pct / 100.0
    };

    let raw = 10.0 * (1.0 - ratio) * score_tissue_factor(tissue);
    let score = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 10.0) };

    TreatmentEffectScore {
        score,
        interpretation: interpret_score(score),
    }
}

/// Bucket lower bounds are inclusive: 8.0 is Excellent, 7.999 is Good.
pub fn interpret_score(score: f64) -> Interpretation {
    INTERPRETATION_BUCKETS
        .iter()
        .find(|(lower, _)| score >= *lower)
        .map_or(Interpretation::Poor, |(_, interpretation)| *interpretation)
}

fn one_dp(value: f64) -> String {
    format!("{:.1}", round_dp(value, 1))
}

fn two_dp(value: f64) -> String {
    format!("{:.2}", round_dp(value, 2))
}

/// Builds the narrative report: uptake quality when only pre-treatment data exists,
/// treatment effect otherwise.
pub fn generate_analysis_report(
    pre: &FluorescenceMetrics,
    post: Option<&FluorescenceMetrics>,
    comparison: Option<&ComparisonResult>,
    tissue: TissueType,
) -> AnalysisReport {
    match (post, comparison) {
        (Some(post), Some(comparison)) => comparison_report(pre, post, comparison, tissue),
        _ => uptake_report(pre, tissue),
    }
}

fn uptake_report(pre: &FluorescenceMetrics, tissue: TissueType) -> AnalysisReport {
    let mut findings = Vec::new();
    let mut recommendations = Vec::new();

    if pre.mean_intensity > 100.0 {
        findings.push(format!(
            "High photosensitizer accumulation detected (mean intensity {}).",
            two_dp(pre.mean_intensity)
        ));
    } else if pre.mean_intensity < 30.0 {
        findings.push(format!(
            "Low photosensitizer accumulation detected (mean intensity {}).",
            two_dp(pre.mean_intensity)
        ));
        recommendations.push(
            "Consider extending the photosensitizer incubation period to improve uptake.".to_string(),
        );
    }

    if pre.coefficient_of_variation > 0.5 {
        findings.push(format!(
            "High heterogeneity in photosensitizer distribution (coefficient of variation {}).",
            two_dp(pre.coefficient_of_variation)
        ));
    }

    if recommendations.is_empty() {
        recommendations.push(
            "Acquire post-treatment fluorescence images to evaluate the treatment effect.".to_string(),
        );
    }

    AnalysisReport {
        summary: format!(
            "Pre-treatment fluorescence analysis of {} tissue: mean intensity {} over {} pixels.",
            tissue.display_name(),
            two_dp(pre.mean_intensity),
            pre.pixel_count
        ),
        findings,
        recommendations,
    }
}

fn comparison_report(
    pre: &FluorescenceMetrics,
    post: &FluorescenceMetrics,
    comparison: &ComparisonResult,
    tissue: TissueType,
) -> AnalysisReport {
    let effect = comparison.treatment_effect;
    let change = comparison.mean_intensity_change_pct;
    let mut findings = vec![format!(
        "Treatment effect score: {}/10 ({}).",
        one_dp(effect.score),
        effect.interpretation.as_str()
    )];

    if change < -50.0 {
        findings.push(format!(
            "Significant photobleaching observed ({}% decrease in mean intensity).",
            one_dp(-change)
        ));
    } else if change > 0.0 {
        findings.push(format!(
            "Mean fluorescence increased by {}% after treatment; verify acquisition settings.",
            one_dp(change)
        ));
    }

    for (name, region) in &comparison.region_changes {
        if region.intensity_change_pct < -70.0 {
            findings.push(format!(
                "Region '{}' shows excellent response ({}% change).",
                name,
                one_dp(region.intensity_change_pct)
            ));
        } else if region.intensity_change_pct > 0.0 {
            findings.push(format!(
                "Region '{}' shows an unusual increase in fluorescence (+{}%).",
                name,
                one_dp(region.intensity_change_pct)
            ));
        }
    }

    let recommendation = if effect.score < 4.0 {
        "Limited response detected. Consider retreatment or adjusting treatment parameters."
    } else if effect.score >= 8.0 {
        "Excellent response. Maintain current treatment parameters for subsequent sessions."
    } else {
        "Schedule standard follow-up to monitor treatment response."
    };

    AnalysisReport {
        summary: format!(
            "Mean fluorescence in {} tissue went from {} to {} after treatment (photobleaching ratio {:.3}): {} treatment effect.",
            tissue.display_name(),
            two_dp(pre.mean_intensity),
            two_dp(post.mean_intensity),
            round_dp(comparison.photobleaching_ratio, 3),
            effect.interpretation.as_str().to_lowercase()
        ),
        findings,
        recommendations: vec![recommendation.to_string()],
    }
}

fn options_from_request(
    request: &FluorescenceRequest,
    tissue: TissueType,
) -> Result<ProcessingOptions, ValidationError> {
    let histogram_bins = request.histogram_bins.unwrap_or(DEFAULT_HISTOGRAM_BINS);
    check_histogram_bins(histogram_bins)?;

    Ok(ProcessingOptions {
        tissue,
        excitation_nm: request.excitation_wavelength.unwrap_or(DEFAULT_EXCITATION_NM),
        emission_nm: request.emission_wavelength.unwrap_or(DEFAULT_EMISSION_NM),
        background_correction: request.background_correction.unwrap_or(true),
        normalization: request
            .normalization_method
            .as_deref()
            .map_or(NormalizationMethod::Max, NormalizationMethod::parse),
        histogram_bins,
    })
}

/// Validates a raw request, then processes, compares and reports.
pub fn analyze_fluorescence(
    request: &FluorescenceRequest,
) -> Result<FluorescenceResponse, ValidationError> {
    let tissue = request
        .tissue_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let (Some(pre_sample), Some(tissue)) = (request.pre_treatment_data.as_ref(), tissue) else {
        return Err(ValidationError::MissingParameters);
    };

    if pre_sample.intensity.is_empty() {
        return Err(ValidationError::EmptySample {
            field: "pre_treatment_data.intensity",
        });
    }
    if let Some(post) = &request.post_treatment_data {
        if post.intensity.is_empty() {
            return Err(ValidationError::EmptySample {
                field: "post_treatment_data.intensity",
            });
        }
    }

    let tissue = TissueType::parse(tissue);
    let options = options_from_request(request, tissue)?;

    let pre_treatment = process_image_data(pre_sample, &options)?;
    let post_treatment = request
        .post_treatment_data
        .as_ref()
        .map(|sample| process_image_data(sample, &options))
        .transpose()?;
    let comparison = compare_results(Some(&pre_treatment), post_treatment.as_ref());
    let report = generate_analysis_report(
        &pre_treatment,
        post_treatment.as_ref(),
        comparison.as_ref(),
        tissue,
    );

    Ok(FluorescenceResponse {
        pre_treatment,
        post_treatment,
        comparison,
        report,
    })
}
