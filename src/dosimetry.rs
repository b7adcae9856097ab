//
// dosimetry.rs
// PDT-Tools-rs
//
// Estimates photodynamic therapy parameters: light penetration, photosensitizer activation,
// predicted efficacy, safety thresholds, and rule-based recommendations.
//
// Thales Matheus Mendonça Santos - November 2025

use crate::error::ValidationError;
use crate::models::{
    Photosensitizer, SafetyThresholds, TissueType, TreatmentParameters, TreatmentRequest,
    TreatmentResponse,
};
use crate::stats::round_dp;

pub const DEFAULT_PATIENT_AGE: f64 = 50.0;
pub const DEFAULT_MELANIN_CONTENT: f64 = 0.5;
pub const DEFAULT_HEMOGLOBIN_CONTENT: f64 = 0.5;
/// mW/cm², used when the request does not state a power density.
pub const DEFAULT_IRRADIANCE: f64 = 100.0;

/// Ratio between effective treatment depth and 1/e penetration depth.
const EFFECTIVE_DEPTH_FACTOR: f64 = 2.3;
const ELDERLY_AGE_YEARS: f64 = 65.0;
const ELDERLY_FLUENCE_FACTOR: f64 = 0.8;

struct DepthBand {
    below_nm: f64,
    depth_mm: f64,
}

/// Evaluated top to bottom, first match wins.
const DEPTH_BANDS: &[DepthBand] = &[
    DepthBand { below_nm: 500.0, depth_mm: 0.5 },
    DepthBand { below_nm: 600.0, depth_mm: 1.5 },
    DepthBand { below_nm: 700.0, depth_mm: 3.0 },
    DepthBand { below_nm: 850.0, depth_mm: 4.0 },
];
const NEAR_INFRARED_DEPTH_MM: f64 = 5.0;

/// Inclusive wavelength ranges where hemoglobin absorbs strongly.
const HEMOGLOBIN_BANDS: &[(f64, f64)] = &[(400.0, 450.0), (500.0, 600.0)];

/// Linear efficiency falloff around an absorption maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsorptionPeak {
    pub center_nm: f64,
    pub half_window_nm: f64,
    pub peak_efficiency: f64,
    pub slope_per_nm: f64,
}

impl AbsorptionPeak {
    const fn new(center_nm: f64, half_window_nm: f64, peak_efficiency: f64, slope_per_nm: f64) -> Self {
        Self {
            center_nm,
            half_window_nm,
            peak_efficiency,
            slope_per_nm,
        }
    }

    fn efficiency_at(&self, wavelength_nm: f64) -> Option<f64> {
        let distance = (wavelength_nm - self.center_nm).abs();
        (distance <= self.half_window_nm).then(|| self.peak_efficiency - distance * self.slope_per_nm)
    }
}

const PPIX_PEAKS: &[AbsorptionPeak] = &[
    AbsorptionPeak::new(410.0, 10.0, 1.0, 0.02),
    AbsorptionPeak::new(632.0, 8.0, 0.8, 0.04),
];
const PHOTOFRIN_PEAKS: &[AbsorptionPeak] = &[AbsorptionPeak::new(630.0, 10.0, 0.9, 0.03)];
const VERTEPORFIN_PEAKS: &[AbsorptionPeak] = &[AbsorptionPeak::new(690.0, 10.0, 0.95, 0.03)];
const METHYLENE_BLUE_PEAKS: &[AbsorptionPeak] = &[AbsorptionPeak::new(665.0, 15.0, 0.9, 0.02)];

/// Efficiency outside every absorption window of a known photosensitizer.
const OFF_PEAK_EFFICIENCY: f64 = 0.1;
/// Flat efficiency assumed for an unrecognized photosensitizer.
const UNKNOWN_PHOTOSENSITIZER_EFFICIENCY: f64 = 0.5;
const MISSING_DOSE_FACTOR: f64 = 0.5;

pub fn absorption_peaks(photosensitizer: Photosensitizer) -> &'static [AbsorptionPeak] {
    match photosensitizer {
        Photosensitizer::PpIX => PPIX_PEAKS,
        Photosensitizer::Photofrin => PHOTOFRIN_PEAKS,
        Photosensitizer::Verteporfin => VERTEPORFIN_PEAKS,
        Photosensitizer::MethyleneBlue => METHYLENE_BLUE_PEAKS,
        Photosensitizer::Other => &[],
    }
}

/// Clinically used activation wavelength, if one is known.
pub fn optimal_wavelength(photosensitizer: Photosensitizer) -> Option<f64> {
    match photosensitizer {
        Photosensitizer::PpIX => Some(635.0),
        Photosensitizer::Photofrin => Some(630.0),
        Photosensitizer::Verteporfin => Some(690.0),
        Photosensitizer::MethyleneBlue => Some(665.0),
        Photosensitizer::Other => None,
    }
}

/// Reference dose in mg/kg for the dose-response sigmoid.
pub fn optimal_dose(photosensitizer: Photosensitizer) -> f64 {
    match photosensitizer {
        Photosensitizer::PpIX => 20.0,
        Photosensitizer::Photofrin => 2.0,
        Photosensitizer::Verteporfin => 0.15,
        Photosensitizer::MethyleneBlue => 1.0,
        Photosensitizer::Other => 1.0,
    }
}

fn depth_tissue_modifier(tissue: TissueType) -> f64 {
    match tissue {
        TissueType::Skin => 1.0,
        TissueType::OralMucosa => 1.3,
        TissueType::Muscle => 0.8,
        TissueType::Brain => 1.2,
        TissueType::Liver => 0.7,
        TissueType::Other => 1.0,
    }
}

fn efficacy_tissue_factor(tissue: TissueType) -> f64 {
    match tissue {
        TissueType::OralMucosa => 0.9,
        TissueType::Skin => 0.85,
        TissueType::Brain => 0.75,
        TissueType::Liver => 0.7,
        TissueType::Muscle => 0.6,
        TissueType::Other => 0.7,
    }
}

fn base_safe_fluence(tissue: TissueType) -> f64 {
    match tissue {
        TissueType::Skin => 200.0,
        TissueType::OralMucosa => 150.0,
        TissueType::Muscle => 100.0,
        TissueType::Brain => 50.0,
        TissueType::Liver => 120.0,
        TissueType::Other => 100.0,
    }
}

/// Light penetration (1/e depth) in millimetres.
pub fn calculate_penetration_depth(
    wavelength_nm: f64,
    tissue: TissueType,
    melanin: f64,
    hemoglobin: f64,
) -> f64 {
    let base = DEPTH_BANDS
        .iter()
        .find(|band| wavelength_nm < band.below_nm)
        .map_or(NEAR_INFRARED_DEPTH_MM, |band| band.depth_mm);

    let melanin = melanin.clamp(0.0, 1.0);
    let hemoglobin = hemoglobin.clamp(0.0, 1.0);

    let melanin_factor = 1.0 - melanin * (1.0 - (wavelength_nm / 1000.0).min(1.0));
    let in_hemoglobin_band = HEMOGLOBIN_BANDS
        .iter()
        .any(|&(low, high)| (low..=high).contains(&wavelength_nm));
    let hemoglobin_factor = if in_hemoglobin_band {
        1.0 - hemoglobin * 0.7
    } else {
        1.0 - hemoglobin * 0.3
    };

    base * depth_tissue_modifier(tissue) * melanin_factor * hemoglobin_factor
}

/// Fraction of delivered photons that activate the photosensitizer, in [0, 1].
pub fn calculate_activation_efficiency(photosensitizer: Photosensitizer, wavelength_nm: f64) -> f64 {
    if photosensitizer == Photosensitizer::Other {
        return UNKNOWN_PHOTOSENSITIZER_EFFICIENCY;
    }

    absorption_peaks(photosensitizer)
        .iter()
        .find_map(|peak| peak.efficiency_at(wavelength_nm))
        .unwrap_or(OFF_PEAK_EFFICIENCY)
        .clamp(0.0, 1.0)
}

/// Predicted treatment efficacy in [0, 1].
pub fn calculate_pdt_efficacy(
    photosensitizer: Photosensitizer,
    dose_mg_kg: Option<f64>,
    fluence: f64,
    activation_efficiency: f64,
    tissue: TissueType,
) -> f64 {
    let base = activation_efficiency * (1.0 - (-0.05 * fluence).exp());
    let dose_factor = match dose_mg_kg {
        Some(dose) => {
            let relative = dose / optimal_dose(photosensitizer);
            1.0 / (1.0 + (-5.0 * (relative - 0.7)).exp())
        }
        None => MISSING_DOSE_FACTOR,
    };

    (base * dose_factor * efficacy_tissue_factor(tissue)).clamp(0.0, 1.0)
}

/// J/cm²; reduced for patients older than 65.
pub fn calculate_max_safe_fluence(tissue: TissueType, age_years: f64) -> f64 {
    let age_factor = if age_years > ELDERLY_AGE_YEARS {
        ELDERLY_FLUENCE_FACTOR
    } else {
        1.0
    };
    base_safe_fluence(tissue) * age_factor
}

/// mW/cm².
pub fn calculate_max_safe_irradiance(tissue: TissueType) -> f64 {
    match tissue {
        TissueType::Skin => 150.0,
        TissueType::OralMucosa => 100.0,
        TissueType::Muscle => 100.0,
        TissueType::Brain => 50.0,
        TissueType::Liver => 80.0,
        TissueType::Other => 100.0,
    }
}

/// Minutes needed to deliver `fluence` (J/cm²) at `irradiance` (mW/cm²).
pub fn calculate_treatment_time(fluence: f64, irradiance_mw_cm2: f64) -> f64 {
    fluence / (irradiance_mw_cm2 / 1000.0) / 60.0
}

/// Everything the recommendation rules look at.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationInputs {
    pub photosensitizer: Photosensitizer,
    pub wavelength_nm: f64,
    pub fluence: f64,
    pub max_safe_fluence: f64,
    pub pdt_efficacy: f64,
    pub treatment_time_min: f64,
    pub penetration_depth_mm: f64,
}

/// Rules fire independently; output order follows rule order.
pub fn generate_recommendations(inputs: &RecommendationInputs) -> Vec<String> {
    let mut recommendations = Vec::new();

    if inputs.fluence < inputs.max_safe_fluence * 0.5 && inputs.pdt_efficacy < 0.7 {
        recommendations.push(format!(
            "Consider increasing light fluence to {:.1} J/cm² to improve treatment efficacy.",
            inputs.max_safe_fluence * 0.7
        ));
    }

    if inputs.fluence > inputs.max_safe_fluence * 0.9 {
        recommendations.push(format!(
            "Light fluence is near maximum safe threshold. Consider reducing to {:.1} J/cm².",
            inputs.max_safe_fluence * 0.8
        ));
    }

    if let Some(optimal) = optimal_wavelength(inputs.photosensitizer) {
        if (inputs.wavelength_nm - optimal).abs() > 10.0 {
            recommendations.push(format!(
                "Consider using {:.0} nm wavelength for optimal {} activation.",
                optimal,
                inputs.photosensitizer.display_name()
            ));
        }
    }

    if inputs.treatment_time_min > 30.0 {
        recommendations.push(
            "Treatment time exceeds 30 minutes. Consider using a higher power density if tissue tolerance allows."
                .to_string(),
        );
    }

    if inputs.penetration_depth_mm < 2.0 && inputs.wavelength_nm < 650.0 {
        recommendations.push(format!(
            "Penetration depth is shallow ({:.2} mm). Consider a longer wavelength for deeper lesions.",
            inputs.penetration_depth_mm
        ));
    }

    if inputs.pdt_efficacy < 0.5 {
        recommendations.push(
            "Predicted efficacy is low. Consider adjusting photosensitizer dose or light parameters."
                .to_string(),
        );
    } else if inputs.pdt_efficacy > 0.8 {
        recommendations.push("Predicted efficacy is high with the current parameters.".to_string());
    }

    if recommendations.is_empty() {
        recommendations.push(
            "Treatment parameters appear appropriate for the selected photosensitizer and tissue type."
                .to_string(),
        );
    }

    recommendations
}

/// Validated dosimetry inputs with defaults applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DosimetryInput {
    pub photosensitizer: Photosensitizer,
    pub wavelength_nm: f64,
    pub light_fluence: f64,
    pub dose_mg_kg: Option<f64>,
    pub tissue: TissueType,
    pub patient_age: f64,
    pub melanin: f64,
    pub hemoglobin: f64,
    pub irradiance: f64,
    pub treatment_area: Option<f64>,
}

impl DosimetryInput {
    pub fn from_request(request: &TreatmentRequest) -> Result<Self, ValidationError> {
        let photosensitizer = required_text(&request.photosensitizer);
        let tissue = required_text(&request.tissue_type);
        let (Some(photosensitizer), Some(wavelength), Some(fluence), Some(tissue)) =
            (photosensitizer, request.wavelength, request.light_fluence, tissue)
        else {
            return Err(ValidationError::MissingParameters);
        };

        let wavelength_nm = positive("wavelength", wavelength)?;
        let light_fluence = positive("light_fluence", fluence)?;
        let irradiance = match request.irradiance {
            Some(value) => positive("irradiance", value)?,
            None => DEFAULT_IRRADIANCE,
        };
        let treatment_area = request
            .treatment_area
            .map(|value| positive("treatment_area", value))
            .transpose()?;

        Ok(Self {
            photosensitizer: Photosensitizer::parse(photosensitizer),
            wavelength_nm,
            light_fluence,
            dose_mg_kg: request.photosensitizer_dose,
            tissue: TissueType::parse(tissue),
            patient_age: request.patient_age.unwrap_or(DEFAULT_PATIENT_AGE),
            melanin: request.melanin_content.unwrap_or(DEFAULT_MELANIN_CONTENT),
            hemoglobin: request.hemoglobin_content.unwrap_or(DEFAULT_HEMOGLOBIN_CONTENT),
            irradiance,
            treatment_area,
        })
    }
}

fn required_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn positive(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::invalid(field, "must be a positive number"))
    }
}

/// Runs the full dosimetry pipeline and rounds the response fields.
pub fn evaluate(input: &DosimetryInput) -> TreatmentResponse {
    let penetration_depth =
        calculate_penetration_depth(input.wavelength_nm, input.tissue, input.melanin, input.hemoglobin);
    let activation_efficiency =
        calculate_activation_efficiency(input.photosensitizer, input.wavelength_nm);
    let pdt_efficacy = calculate_pdt_efficacy(
        input.photosensitizer,
        input.dose_mg_kg,
        input.light_fluence,
        activation_efficiency,
        input.tissue,
    );
    let treatment_time = calculate_treatment_time(input.light_fluence, input.irradiance);
    let max_safe_fluence = calculate_max_safe_fluence(input.tissue, input.patient_age);
    let max_safe_irradiance = calculate_max_safe_irradiance(input.tissue);

    let recommendations = generate_recommendations(&RecommendationInputs {
        photosensitizer: input.photosensitizer,
        wavelength_nm: input.wavelength_nm,
        fluence: input.light_fluence,
        max_safe_fluence,
        pdt_efficacy,
        treatment_time_min: treatment_time,
        penetration_depth_mm: penetration_depth,
    });

    TreatmentResponse {
        treatment_parameters: TreatmentParameters {
            penetration_depth: round_dp(penetration_depth, 2),
            effective_treatment_depth: round_dp(penetration_depth * EFFECTIVE_DEPTH_FACTOR, 2),
            treatment_time: round_dp(treatment_time, 1),
            activation_efficiency: round_dp(activation_efficiency, 2),
            pdt_efficacy: round_dp(pdt_efficacy, 2),
            total_energy: input
                .treatment_area
                .map(|area| round_dp(input.light_fluence * area, 1)),
        },
        safety_thresholds: SafetyThresholds {
            max_safe_fluence: round_dp(max_safe_fluence, 1),
            max_safe_irradiance: round_dp(max_safe_irradiance, 1),
            is_safe: input.light_fluence <= max_safe_fluence,
        },
        recommendations,
    }
}

/// Validates a raw request and evaluates it.
pub fn calculate_treatment(request: &TreatmentRequest) -> Result<TreatmentResponse, ValidationError> {
    let input = DosimetryInput::from_request(request)?;
    Ok(evaluate(&input))
}
