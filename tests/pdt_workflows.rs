//
// pdt_workflows.rs
// PDT-Tools-rs
//
// Integration-style tests covering the HTTP contract of both calculators, reference dosing cases,
// and the numeric properties every response must satisfy.
//
// Thales Matheus Mendonça Santos - November 2025

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use pdt_tools::dosimetry;
use pdt_tools::fluorescence;
use pdt_tools::models::{
    FluorescenceRequest, FluorescenceSample, Photosensitizer, TissueType, TreatmentRequest,
};
use pdt_tools::stats;
use pdt_tools::web;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn post_raw(path: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(body.into())
        .expect("request");
    let response = web::router().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

async fn post_json(path: &str, body: Value) -> (StatusCode, Value) {
    post_raw(path, body.to_string()).await
}

const TREATMENT: &str = "/api/treatment/calculate";
const FLUORESCENCE: &str = "/api/analysis/fluorescence";

#[tokio::test]
async fn ppix_red_light_on_oral_mucosa_golden_values() {
    let (status, body) = post_json(
        TREATMENT,
        json!({
            "photosensitizer": "ppix",
            "wavelength": 635,
            "light_fluence": 100,
            "tissue_type": "oral_mucosa"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let params = &body["treatment_parameters"];
    assert_eq!(params["penetration_depth"], 2.71);
    assert_eq!(params["effective_treatment_depth"], 6.23);
    assert_eq!(params["treatment_time"], 16.7);
    assert_eq!(params["activation_efficiency"], 0.68);
    assert_eq!(params["pdt_efficacy"], 0.3);
    assert!(params.get("total_energy").is_none());

    let safety = &body["safety_thresholds"];
    assert_eq!(safety["max_safe_fluence"], 150.0);
    assert_eq!(safety["max_safe_irradiance"], 100.0);
    assert_eq!(safety["is_safe"], true);
    assert_eq!(body["recommendations"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn near_threshold_fluence_recommends_reduction() {
    let (status, body) = post_json(
        TREATMENT,
        json!({
            "photosensitizer": "ppix",
            "wavelength": 635,
            "light_fluence": 140,
            "tissue_type": "oral_mucosa"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let recommendations: Vec<&str> = body["recommendations"]
        .as_array()
        .expect("array")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(recommendations.contains(
        &"Light fluence is near maximum safe threshold. Consider reducing to 120.0 J/cm²."
    ));
}

#[tokio::test]
async fn strong_photobleaching_scores_excellent() {
    let (status, body) = post_json(
        FLUORESCENCE,
        json!({
            "pre_treatment_data": { "intensity": [100, 100, 100] },
            "post_treatment_data": { "intensity": [20, 20, 20] },
            "tissue_type": "oral_mucosa"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let comparison = &body["comparison"];
    assert_eq!(comparison["photobleaching_ratio"], 0.2);
    assert_eq!(comparison["mean_intensity_change_pct"], -80.0);
    assert_eq!(comparison["treatment_effect"]["score"], 9.6);
    assert_eq!(comparison["treatment_effect"]["interpretation"], "Excellent");
    assert_eq!(body["pre_treatment"]["mean_intensity"], 100.0);
    assert_eq!(body["pre_treatment"]["tissue_type"], "oral_mucosa");
    assert_eq!(body["pre_treatment"]["excitation_wavelength"], 405.0);
    assert_eq!(body["post_treatment"]["mean_intensity"], 20.0);
    assert_eq!(
        body["report"]["findings"][0],
        "Treatment effect score: 9.6/10 (Excellent)."
    );
}

#[tokio::test]
async fn missing_tissue_type_is_rejected() {
    let (status, body) = post_json(
        TREATMENT,
        json!({ "photosensitizer": "ppix", "wavelength": 635, "light_fluence": 100 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "msg": "Missing required parameters" }));

    let (status, body) = post_json(
        FLUORESCENCE,
        json!({ "pre_treatment_data": { "intensity": [1, 2, 3] } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "msg": "Missing required parameters" }));
}

#[tokio::test]
async fn pre_only_analysis_returns_null_comparison() {
    let (status, body) = post_json(
        FLUORESCENCE,
        json!({
            "pre_treatment_data": { "intensity": [10, 12, 14], "background": 2 },
            "tissue_type": "oral_mucosa",
            "normalization_method": "minmax",
            "histogram_bins": 4
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["post_treatment"].is_null());
    assert!(body["comparison"].is_null());
    assert_eq!(body["pre_treatment"]["histogram"]["counts"], json!([1, 0, 1, 1]));
    assert_eq!(body["pre_treatment"]["normalized_preview"], json!([0.0, 0.5, 1.0]));
    assert!(body["report"]["findings"][0]
        .as_str()
        .expect("finding")
        .starts_with("Low photosensitizer accumulation"));
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let (status, body) = post_json(
        TREATMENT,
        json!({
            "photosensitizer": "ppix",
            "wavelength": "red",
            "light_fluence": 100,
            "tissue_type": "skin"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["msg"]
        .as_str()
        .expect("msg")
        .starts_with("Invalid request body"));

    let (status, _) = post_raw(TREATMENT, "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_raw(FLUORESCENCE, "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Missing required parameters");
}

#[tokio::test]
async fn oversized_histogram_is_rejected() {
    let (status, body) = post_raw(
        FLUORESCENCE,
        r#"{"pre_treatment_data":{"intensity":[1,2,3]},"tissue_type":"skin","histogram_bins":18446744073709551615}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["msg"].as_str().expect("msg").contains("histogram_bins"));

    let (status, _) = post_json(
        FLUORESCENCE,
        json!({
            "pre_treatment_data": { "intensity": [1, 2, 3] },
            "tissue_type": "skin",
            "histogram_bins": fluorescence::MAX_HISTOGRAM_BINS + 1
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_endpoint_responds() {
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .expect("request");
    let response = web::router().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

fn treatment(photosensitizer: &str, wavelength: f64, fluence: f64, tissue: &str) -> TreatmentRequest {
    TreatmentRequest {
        photosensitizer: Some(photosensitizer.to_string()),
        wavelength: Some(wavelength),
        light_fluence: Some(fluence),
        tissue_type: Some(tissue.to_string()),
        ..Default::default()
    }
}

const PHOTOSENSITIZERS: [&str; 5] = ["ppix", "photofrin", "verteporfin", "methylene_blue", "unknown"];
const TISSUES: [&str; 6] = ["skin", "oral_mucosa", "muscle", "brain", "liver", "unknown"];

#[test]
fn treatment_output_is_deterministic() {
    let mut request = treatment("verteporfin", 689.0, 50.0, "skin");
    request.photosensitizer_dose = Some(0.15);
    request.patient_age = Some(72.0);
    let first = serde_json::to_string(&dosimetry::calculate_treatment(&request).expect("first"))
        .expect("json");
    let second = serde_json::to_string(&dosimetry::calculate_treatment(&request).expect("second"))
        .expect("json");
    assert_eq!(first, second);
}

#[test]
fn efficiencies_stay_in_unit_range_and_safety_flag_is_consistent() {
    for ps in PHOTOSENSITIZERS {
        for tissue in TISSUES {
            for wavelength in (380..=900).step_by(7) {
                for fluence in [1.0, 25.0, 100.0, 149.0, 150.0, 151.0, 500.0] {
                    let mut request = treatment(ps, f64::from(wavelength), fluence, tissue);
                    request.photosensitizer_dose = Some(1000.0);
                    let response = dosimetry::calculate_treatment(&request).expect("valid");
                    let params = &response.treatment_parameters;
                    assert!((0.0..=1.0).contains(&params.activation_efficiency));
                    assert!((0.0..=1.0).contains(&params.pdt_efficacy));
                    assert!(params.penetration_depth > 0.0);
                    assert!(!response.recommendations.is_empty());

                    let max = dosimetry::calculate_max_safe_fluence(TissueType::parse(tissue), 50.0);
                    assert_eq!(response.safety_thresholds.is_safe, fluence <= max);
                }
            }
        }
    }
}

#[test]
fn efficacy_never_decreases_with_fluence() {
    for ps in [
        Photosensitizer::PpIX,
        Photosensitizer::Photofrin,
        Photosensitizer::Verteporfin,
        Photosensitizer::MethyleneBlue,
        Photosensitizer::Other,
    ] {
        let efficiency = dosimetry::calculate_activation_efficiency(ps, 635.0);
        let mut previous = 0.0;
        for fluence in (0..400).map(f64::from) {
            let efficacy =
                dosimetry::calculate_pdt_efficacy(ps, Some(2.0), fluence, efficiency, TissueType::Brain);
            assert!(efficacy >= previous);
            previous = efficacy;
        }
    }
}

#[test]
fn treatment_effect_score_is_bounded_for_any_ratio() {
    for tissue in TISSUES.map(TissueType::parse) {
        for ratio in [0.0, 0.01, 0.2, 0.5, 0.99, 1.0, 1.5, 10.0, 1e9] {
            let score = fluorescence::calculate_treatment_effect_score(
                (ratio - 1.0) * 100.0,
                ratio,
                tissue,
            );
            assert!((0.0..=10.0).contains(&score.score));
        }
    }
}

#[test]
fn histogram_counts_match_sample_length() {
    let values: Vec<f64> = (0..997).map(|i| f64::from(i % 113) * 1.7 + 0.3).collect();
    for bins in [1, 2, 7, 20, 64, 500] {
        let hist = stats::histogram(&values, bins);
        assert_eq!(hist.counts.len(), bins);
        assert_eq!(hist.counts.iter().sum::<u64>(), values.len() as u64);
    }

    let request = FluorescenceRequest {
        pre_treatment_data: Some(FluorescenceSample {
            intensity: values.clone(),
            ..Default::default()
        }),
        tissue_type: Some("muscle".into()),
        histogram_bins: Some(33),
        ..Default::default()
    };
    let response = fluorescence::analyze_fluorescence(&request).expect("analysis");
    let hist = &response.pre_treatment.histogram;
    assert_eq!(hist.counts.len(), 33);
    assert_eq!(hist.bin_edges.len(), 34);
    assert_eq!(hist.counts.iter().sum::<u64>(), 997);
}

#[test]
fn background_never_produces_negative_intensity() {
    let request: FluorescenceRequest = serde_json::from_value(json!({
        "pre_treatment_data": {
            "intensity": [5, 50, 500],
            "background": [10, 10, 1000],
            "regions": { "edge": [1, 2] }
        },
        "tissue_type": "liver"
    }))
    .expect("request");
    let response = fluorescence::analyze_fluorescence(&request).expect("analysis");
    assert_eq!(response.pre_treatment.min_intensity, 0.0);
    // Per-pixel background length differs from the region, so the mean (340) is used.
    assert_eq!(response.pre_treatment.regions["edge"].max_intensity, 0.0);
}
