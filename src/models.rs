//
// models.rs
// PDT-Tools-rs
//
// Defines serializable request and response structures for treatment dosimetry and fluorescence analysis.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stats::round_dp;

/// Photosensitizing agents with known absorption profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum Photosensitizer {
    PpIX,
    Photofrin,
    Verteporfin,
    MethyleneBlue,
    Other,
}

impl Photosensitizer {
    /// Unrecognized names resolve to `Other` instead of failing.
    pub fn parse(name: &str) -> Self {
        match name {
            "ppix" => Self::PpIX,
            "photofrin" => Self::Photofrin,
            "verteporfin" => Self::Verteporfin,
            "methylene_blue" => Self::MethyleneBlue,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PpIX => "ppix",
            Self::Photofrin => "photofrin",
            Self::Verteporfin => "verteporfin",
            Self::MethyleneBlue => "methylene_blue",
            Self::Other => "other",
        }
    }

    /// Human-readable name used in recommendation text.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PpIX => "PpIX",
            Self::Photofrin => "Photofrin",
            Self::Verteporfin => "Verteporfin",
            Self::MethyleneBlue => "methylene blue",
            Self::Other => "photosensitizer",
        }
    }
}

impl From<Photosensitizer> for &'static str {
    fn from(value: Photosensitizer) -> Self {
        value.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum TissueType {
    Skin,
    OralMucosa,
    Muscle,
    Brain,
    Liver,
    Other,
}

impl TissueType {
    /// Unrecognized names resolve to `Other` instead of failing.
    pub fn parse(name: &str) -> Self {
        match name {
            "skin" => Self::Skin,
            "oral_mucosa" => Self::OralMucosa,
            "muscle" => Self::Muscle,
            "brain" => Self::Brain,
            "liver" => Self::Liver,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skin => "skin",
            Self::OralMucosa => "oral_mucosa",
            Self::Muscle => "muscle",
            Self::Brain => "brain",
            Self::Liver => "liver",
            Self::Other => "other",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Skin => "skin",
            Self::OralMucosa => "oral mucosa",
            Self::Muscle => "muscle",
            Self::Brain => "brain",
            Self::Liver => "liver",
            Self::Other => "unspecified",
        }
    }
}

impl From<TissueType> for &'static str {
    fn from(value: TissueType) -> Self {
        value.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "&'static str")]
pub enum NormalizationMethod {
    Max,
    Mean,
    MinMax,
    /// Explicit "none" and any unrecognized method: values pass through unchanged.
    None,
}

impl NormalizationMethod {
    pub fn parse(name: &str) -> Self {
        match name {
            "max" => Self::Max,
            "mean" => Self::Mean,
            "minmax" => Self::MinMax,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Mean => "mean",
            Self::MinMax => "minmax",
            Self::None => "none",
        }
    }
}

impl From<NormalizationMethod> for &'static str {
    fn from(value: NormalizationMethod) -> Self {
        value.as_str()
    }
}

/// Body of `POST /api/treatment/calculate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreatmentRequest {
    #[serde(default)]
    pub photosensitizer: Option<String>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub photosensitizer_dose: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub wavelength: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub light_fluence: Option<f64>,
    #[serde(default)]
    pub tissue_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub treatment_area: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub patient_age: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub melanin_content: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub hemoglobin_content: Option<f64>,
    /// Power density in mW/cm².
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub irradiance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentParameters {
    pub penetration_depth: f64,
    pub effective_treatment_depth: f64,
    pub treatment_time: f64,
    pub activation_efficiency: f64,
    pub pdt_efficacy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_energy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyThresholds {
    pub max_safe_fluence: f64,
    pub max_safe_irradiance: f64,
    pub is_safe: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentResponse {
    pub treatment_parameters: TreatmentParameters,
    pub safety_thresholds: SafetyThresholds,
    pub recommendations: Vec<String>,
}

/// Background to subtract before analysis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Background {
    Uniform(f64),
    PerPixel(Vec<f64>),
}

/// One acquisition: raw intensities plus optional background and named regions.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FluorescenceSample {
    #[serde(default)]
    pub intensity: Vec<f64>,
    #[serde(default)]
    pub background: Option<Background>,
    #[serde(default)]
    pub regions: BTreeMap<String, Vec<f64>>,
}

/// Body of `POST /api/analysis/fluorescence`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FluorescenceRequest {
    #[serde(default)]
    pub pre_treatment_data: Option<FluorescenceSample>,
    #[serde(default)]
    pub post_treatment_data: Option<FluorescenceSample>,
    #[serde(default)]
    pub tissue_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub excitation_wavelength: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub emission_wavelength: Option<f64>,
    #[serde(default)]
    pub background_correction: Option<bool>,
    #[serde(default)]
    pub normalization_method: Option<String>,
    #[serde(default)]
    pub histogram_bins: Option<usize>,
}

/// Equal-width histogram; `bin_edges` has one more entry than `counts`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    #[serde(serialize_with = "rounded::vec_dp2")]
    pub bin_edges: Vec<f64>,
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionMetrics {
    pub pixel_count: usize,
    #[serde(serialize_with = "rounded::dp2")]
    pub mean_intensity: f64,
    #[serde(serialize_with = "rounded::dp2")]
    pub max_intensity: f64,
    #[serde(serialize_with = "rounded::dp2")]
    pub relative_intensity: f64,
}

/// Statistics for one corrected sample. Values are kept at full precision and rounded on output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FluorescenceMetrics {
    pub pixel_count: usize,
    #[serde(serialize_with = "rounded::dp2")]
    pub mean_intensity: f64,
    #[serde(serialize_with = "rounded::dp2")]
    pub max_intensity: f64,
    #[serde(serialize_with = "rounded::dp2")]
    pub min_intensity: f64,
    #[serde(serialize_with = "rounded::dp2")]
    pub std_deviation: f64,
    #[serde(serialize_with = "rounded::dp2")]
    pub coefficient_of_variation: f64,
    pub histogram: Histogram,
    pub regions: BTreeMap<String, RegionMetrics>,
    pub normalization_method: NormalizationMethod,
    #[serde(serialize_with = "rounded::vec_dp3")]
    pub normalized_preview: Vec<f64>,
    pub tissue_type: TissueType,
    pub excitation_wavelength: f64,
    pub emission_wavelength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionChange {
    #[serde(serialize_with = "rounded::dp2")]
    pub pre_mean_intensity: f64,
    #[serde(serialize_with = "rounded::dp2")]
    pub post_mean_intensity: f64,
    #[serde(serialize_with = "rounded::dp1")]
    pub intensity_change_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "&'static str")]
pub enum Interpretation {
    Excellent,
    Good,
    Moderate,
    Limited,
    Poor,
}

impl Interpretation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Limited => "Limited",
            Self::Poor => "Poor",
        }
    }
}

impl From<Interpretation> for &'static str {
    fn from(value: Interpretation) -> Self {
        value.as_str()
    }
}

/// Score in [0, 10]. The interpretation is bucketed on the exact score; one decimal is
/// only applied on output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreatmentEffectScore {
    #[serde(serialize_with = "rounded::dp1")]
    pub score: f64,
    pub interpretation: Interpretation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    #[serde(serialize_with = "rounded::dp1")]
    pub mean_intensity_change_pct: f64,
    #[serde(serialize_with = "rounded::dp1")]
    pub max_intensity_change_pct: f64,
    #[serde(serialize_with = "rounded::dp3")]
    pub photobleaching_ratio: f64,
    pub region_changes: BTreeMap<String, RegionChange>,
    pub treatment_effect: TreatmentEffectScore,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub summary: String,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FluorescenceResponse {
    pub pre_treatment: FluorescenceMetrics,
    pub post_treatment: Option<FluorescenceMetrics>,
    pub comparison: Option<ComparisonResult>,
    pub report: AnalysisReport,
}

/// Accept JSON numbers as well as numeric strings coming from HTML forms.
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    pub fn option_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = match Option::<NumberOrText>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(NumberOrText::Number(v)) => v,
            Some(NumberOrText::Text(text)) => {
                let trimmed = text.trim();
                // Blank form fields count as absent.
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<f64>()
                    .map_err(|_| D::Error::custom(format!("expected a number, found \"{text}\"")))?
            }
        };

        if !value.is_finite() {
            return Err(D::Error::custom("expected a finite number"));
        }
        Ok(Some(value))
    }
}

mod rounded {
    use serde::Serializer;

    use super::round_dp;

    pub fn dp1<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(round_dp(*value, 1))
    }

    pub fn dp2<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(round_dp(*value, 2))
    }

    pub fn dp3<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(round_dp(*value, 3))
    }

    #[allow(clippy::ptr_arg)]
    pub fn vec_dp2<S: Serializer>(values: &Vec<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| round_dp(*v, 2)))
    }

    #[allow(clippy::ptr_arg)]
    pub fn vec_dp3<S: Serializer>(values: &Vec<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| round_dp(*v, 3)))
    }
}
