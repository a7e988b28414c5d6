//! Three-way reconciliation of depot loading, transporter delivery and
//! station receiving records, with volumes corrected to 15 °C.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;

/// Volume and density tolerance in percent
pub const VOLUME_TOLERANCE_PERCENT: f64 = 0.5;
pub const DENSITY_TOLERANCE_PERCENT: f64 = 0.5;
/// Degrees Celsius
pub const TEMPERATURE_TOLERANCE: f64 = 2.0;
pub const TIME_TOLERANCE_HOURS: f64 = 2.0;
pub const EXPECTED_TRANSIT_HOURS: i64 = 8;

const STANDARD_TEMP_C: f64 = 15.0;
const EXPANSION_COEFFICIENT: f64 = 0.00065;
const AUTO_RECONCILE_MIN_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepotLoadingRecord {
    #[validate(range(min = 0.001, message = "litres loaded must be positive"))]
    pub litres_loaded: f64,
    pub loading_temp: f64,
    #[serde(default)]
    pub product_type: String,
    pub loading_time: DateTime<Utc>,
    #[serde(default)]
    pub seal_numbers: Vec<String>,
    #[serde(default)]
    pub loading_doc_ref: String,
    #[serde(rename = "densityAt15C")]
    #[validate(range(min = 0.001, message = "density must be positive"))]
    pub density_at_15c: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_gravity: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransporterDeliveryRecord {
    #[validate(range(min = 0.001, message = "litres delivered must be positive"))]
    pub litres_delivered: f64,
    pub delivery_temp: f64,
    pub delivery_time: DateTime<Utc>,
    #[serde(default)]
    pub waybill_number: String,
    #[serde(default)]
    pub kilometers_run: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_taken: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QualityTestResults {
    pub density: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub octane_rating: Option<f64>,
    #[serde(default)]
    pub water_content: f64,
    #[serde(default)]
    pub sediment_content: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StationReceivingRecord {
    pub litres_received: f64,
    pub receiving_temp: f64,
    pub receiving_time: DateTime<Utc>,
    #[serde(default)]
    pub receiving_doc_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_test_results: Option<QualityTestResults>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThreeWayReconciliationRequest {
    #[validate(length(min = 1, message = "consignment id is required"))]
    pub consignment_id: String,
    #[validate]
    pub depot: DepotLoadingRecord,
    #[validate]
    pub transporter: TransporterDeliveryRecord,
    pub station: StationReceivingRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VarianceType {
    Volume,
    Temperature,
    Timing,
    Quality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Buckets how many tolerances a variance spans
    pub fn classify(variance: f64, tolerance: f64) -> Self {
        let ratio = variance / tolerance;
        if ratio <= 1.0 {
            Severity::Low
        } else if ratio <= 2.0 {
            Severity::Medium
        } else if ratio <= 5.0 {
            Severity::High
        } else {
            Severity::Critical
        }
    }

    fn confidence_penalty(self) -> f64 {
        match self {
            Severity::Critical => 0.3,
            Severity::High => 0.2,
            Severity::Medium => 0.1,
            Severity::Low => 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationVariance {
    #[serde(rename = "type")]
    pub variance_type: VarianceType,
    pub severity: Severity,
    pub description: String,
    pub quantified_impact: f64,
    pub expected_value: f64,
    pub actual_value: f64,
    pub tolerance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrective_action: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct CorrectionFactors {
    pub depot: f64,
    pub transporter: f64,
    pub station: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct TemperatureCorrectedVolumes {
    #[serde(rename = "depotAt15C")]
    pub depot_at_15c: f64,
    #[serde(rename = "transporterAt15C")]
    pub transporter_at_15c: f64,
    #[serde(rename = "stationAt15C")]
    pub station_at_15c: f64,
    #[serde(rename = "correctionFactors")]
    pub correction_factors: CorrectionFactors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    Matched,
    VarianceDetected,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoReconcileDecision {
    pub can_auto_reconcile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub consignment_id: String,
    pub status: ReconciliationStatus,
    pub reconciled_litres: f64,
    pub variance_percentage: f64,
    pub variances: Vec<ReconciliationVariance>,
    pub document_refs: Vec<String>,
    pub temperature_corrected_volumes: TemperatureCorrectedVolumes,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    pub auto_reconcile: AutoReconcileDecision,
}

/// Volume correction factor to 15 °C for a product at `temperature`
pub fn volume_correction_factor(temperature: f64) -> f64 {
    1.0 - EXPANSION_COEFFICIENT * (temperature - STANDARD_TEMP_C)
}

pub fn temperature_corrections(
    depot: &DepotLoadingRecord,
    transporter: &TransporterDeliveryRecord,
    station: &StationReceivingRecord,
) -> TemperatureCorrectedVolumes {
    let factors = CorrectionFactors {
        depot: volume_correction_factor(depot.loading_temp),
        transporter: volume_correction_factor(transporter.delivery_temp),
        station: volume_correction_factor(station.receiving_temp),
    };
    TemperatureCorrectedVolumes {
        depot_at_15c: depot.litres_loaded * factors.depot,
        transporter_at_15c: transporter.litres_delivered * factors.transporter,
        station_at_15c: station.litres_received * factors.station,
        correction_factors: factors,
    }
}

fn percent_of(variance: f64, base: f64) -> f64 {
    if base == 0.0 {
        0.0
    } else {
        variance / base * 100.0
    }
}

pub fn detect_variances(
    request: &ThreeWayReconciliationRequest,
    corrected: &TemperatureCorrectedVolumes,
) -> Vec<ReconciliationVariance> {
    let (depot, transporter, station) = (&request.depot, &request.transporter, &request.station);
    let mut variances = Vec::new();

    let legs = [
        (
            "Depot-Transporter",
            corrected.depot_at_15c,
            corrected.transporter_at_15c,
            "Possible loading error or spillage during transport",
            "Verify loading procedures and check for leaks",
        ),
        (
            "Transporter-Station",
            corrected.transporter_at_15c,
            corrected.station_at_15c,
            "Possible measurement error or ullage during unloading",
            "Verify tank calibration and unloading procedures",
        ),
    ];
    for (leg, expected, actual, cause, action) in legs {
        let variance = (expected - actual).abs();
        let percent = percent_of(variance, expected);
        if percent > VOLUME_TOLERANCE_PERCENT {
            variances.push(ReconciliationVariance {
                variance_type: VarianceType::Volume,
                severity: Severity::classify(percent, VOLUME_TOLERANCE_PERCENT),
                description: format!("{} volume variance: {:.2}%", leg, percent),
                quantified_impact: variance,
                expected_value: expected,
                actual_value: actual,
                tolerance: VOLUME_TOLERANCE_PERCENT,
                root_cause: Some(cause.to_string()),
                corrective_action: Some(action.to_string()),
            });
        }
    }

    let temp_change = (depot.loading_temp - transporter.delivery_temp).abs();
    if temp_change > TEMPERATURE_TOLERANCE {
        variances.push(ReconciliationVariance {
            variance_type: VarianceType::Temperature,
            severity: Severity::classify(temp_change, TEMPERATURE_TOLERANCE),
            description: format!("Temperature change during transport: {:.1}°C", temp_change),
            quantified_impact: temp_change,
            expected_value: depot.loading_temp,
            actual_value: transporter.delivery_temp,
            tolerance: TEMPERATURE_TOLERANCE,
            root_cause: None,
            corrective_action: None,
        });
    }

    // Loading times at the end of chrono's range keep their own timestamp
    let expected_arrival = depot
        .loading_time
        .checked_add_signed(Duration::hours(EXPECTED_TRANSIT_HOURS))
        .unwrap_or(depot.loading_time);
    let timing_hours =
        (transporter.delivery_time - expected_arrival).num_milliseconds().abs() as f64 / 3_600_000.0;
    if timing_hours > TIME_TOLERANCE_HOURS {
        variances.push(ReconciliationVariance {
            variance_type: VarianceType::Timing,
            severity: Severity::classify(timing_hours, TIME_TOLERANCE_HOURS),
            description: format!("Delivery timing variance: {:.1} hours difference", timing_hours),
            quantified_impact: timing_hours,
            expected_value: expected_arrival.timestamp_millis() as f64,
            actual_value: transporter.delivery_time.timestamp_millis() as f64,
            tolerance: TIME_TOLERANCE_HOURS,
            root_cause: None,
            corrective_action: None,
        });
    }

    if let Some(quality) = &station.quality_test_results {
        let variance = (depot.density_at_15c - quality.density).abs();
        let percent = percent_of(variance, depot.density_at_15c);
        if percent > DENSITY_TOLERANCE_PERCENT {
            variances.push(ReconciliationVariance {
                variance_type: VarianceType::Quality,
                severity: Severity::classify(percent, DENSITY_TOLERANCE_PERCENT),
                description: format!("Density variance: {:.2}%", percent),
                quantified_impact: variance,
                expected_value: depot.density_at_15c,
                actual_value: quality.density,
                tolerance: DENSITY_TOLERANCE_PERCENT,
                root_cause: None,
                corrective_action: None,
            });
        }
    }

    variances
}

fn has_severity(variances: &[ReconciliationVariance], severity: Severity) -> bool {
    variances.iter().any(|v| v.severity == severity)
}

/// Weighted average of the three corrected volumes. Any critical variance
/// shifts the weight onto the depot figure.
pub fn reconciled_volume(
    corrected: &TemperatureCorrectedVolumes,
    variances: &[ReconciliationVariance],
) -> f64 {
    let (depot, transporter, station) = if has_severity(variances, Severity::Critical) {
        (0.6, 0.2, 0.2)
    } else {
        (0.4, 0.3, 0.3)
    };
    corrected.depot_at_15c * depot
        + corrected.transporter_at_15c * transporter
        + corrected.station_at_15c * station
}

pub fn determine_status(
    variances: &[ReconciliationVariance],
    variance_percentage: f64,
) -> ReconciliationStatus {
    if has_severity(variances, Severity::Critical) {
        ReconciliationStatus::Failed
    } else if has_severity(variances, Severity::High) || variance_percentage > 2.0 {
        ReconciliationStatus::VarianceDetected
    } else {
        ReconciliationStatus::Matched
    }
}

pub fn confidence_score(
    variances: &[ReconciliationVariance],
    corrected: &TemperatureCorrectedVolumes,
) -> f64 {
    let mut score = 1.0 - variances.iter().map(|v| v.severity.confidence_penalty()).sum::<f64>();
    if (corrected.correction_factors.depot - 1.0).abs() > 0.05 {
        score -= 0.1;
    }
    score.clamp(0.0, 1.0)
}

fn recommendations(variances: &[ReconciliationVariance]) -> Vec<String> {
    let has_type = |t: VarianceType| variances.iter().any(|v| v.variance_type == t);
    let mut out: Vec<&str> = Vec::new();

    if has_type(VarianceType::Volume) {
        out.extend([
            "Review loading and unloading procedures",
            "Calibrate tank measurement systems",
            "Implement real-time volume monitoring",
        ]);
    }
    if has_type(VarianceType::Temperature) {
        out.extend([
            "Monitor temperature throughout transport chain",
            "Implement insulated transport where necessary",
        ]);
    }
    if has_type(VarianceType::Quality) {
        out.extend([
            "Implement quality sampling at each transfer point",
            "Review product handling procedures",
        ]);
    }
    if variances.is_empty() {
        out.push("Reconciliation passed - no action required");
    } else {
        out.extend([
            "Document all variances for trend analysis",
            "Implement corrective actions for recurring issues",
        ]);
    }
    out.into_iter().map(String::from).collect()
}

pub fn auto_reconcile_decision(
    variances: &[ReconciliationVariance],
    variance_percentage: f64,
    confidence: f64,
) -> AutoReconcileDecision {
    let high = variances.iter().filter(|v| v.severity >= Severity::High).count();
    if high == 0
        && variance_percentage <= VOLUME_TOLERANCE_PERCENT
        && confidence >= AUTO_RECONCILE_MIN_CONFIDENCE
    {
        AutoReconcileDecision {
            can_auto_reconcile: true,
            reason: None,
        }
    } else {
        AutoReconcileDecision {
            can_auto_reconcile: false,
            reason: Some(format!(
                "Manual review required: {} high-severity variances, {:.2}% total variance",
                high, variance_percentage
            )),
        }
    }
}

pub fn reconcile(request: &ThreeWayReconciliationRequest) -> Result<ReconciliationResult, ServiceError> {
    request.validate()?;

    let corrected = temperature_corrections(&request.depot, &request.transporter, &request.station);
    let variances = detect_variances(request, &corrected);
    let reconciled_litres = reconciled_volume(&corrected, &variances);
    let variance_percentage = percent_of(
        (request.depot.litres_loaded - reconciled_litres).abs(),
        request.depot.litres_loaded,
    );
    let status = determine_status(&variances, variance_percentage);
    let confidence = confidence_score(&variances, &corrected);

    info!(
        consignment_id = %request.consignment_id,
        ?status,
        variances = variances.len(),
        "three-way reconciliation complete"
    );

    Ok(ReconciliationResult {
        consignment_id: request.consignment_id.clone(),
        status,
        reconciled_litres,
        variance_percentage,
        document_refs: vec![
            request.depot.loading_doc_ref.clone(),
            request.transporter.waybill_number.clone(),
            request.station.receiving_doc_ref.clone(),
        ],
        temperature_corrected_volumes: corrected,
        recommendations: recommendations(&variances),
        auto_reconcile: auto_reconcile_decision(&variances, variance_percentage, confidence),
        confidence,
        variances,
    })
}
