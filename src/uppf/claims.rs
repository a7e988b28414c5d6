//! UPPF claim arithmetic and the checks run before a claim goes to NPA.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::gps::{haversine_m, trace_distance_km, GpsPoint};
use crate::entities::uppf_claim::Model as ClaimRecord;
use crate::errors::ServiceError;

pub use crate::entities::uppf_claim::UppfClaimStatus;

/// Litres either side of the depot figure before a volume is flagged
pub const VOLUME_TOLERANCE_LITRES: Decimal = dec!(50);
/// Share of the claimed km the GPS trace may differ by
pub const DISTANCE_TOLERANCE_RATIO: f64 = 0.1;
/// Claims submitted longer ago than this are flagged as aging
pub const AGING_ALERT_DAYS: i64 = 30;
/// Most recent submitted claims considered by the dashboard
pub const DASHBOARD_CLAIM_LIMIT: usize = 1000;

const STATIONARY_RADIUS_M: f64 = 100.0;
const STATIONARY_GAP_HOURS: i64 = 2;
const STATIONARY_LIMIT_HOURS: i64 = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCalculationRequest {
    #[validate(length(min = 1, message = "window id is required"))]
    pub window_id: String,
    #[validate(length(min = 1, message = "delivery id is required"))]
    pub delivery_id: String,
    #[validate(length(min = 1, message = "route id is required"))]
    pub route_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub km_actual: Decimal,
    /// Equalisation threshold for the route
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub km_threshold: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub tariff_per_litre_km: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub litres_moved: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub litres_loaded: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub litres_received: Option<Decimal>,
    #[serde(default)]
    pub gps_trace: Vec<GpsPoint>,
    #[serde(default)]
    pub evidence_links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuickReconciliation {
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub depot_loaded: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub station_received: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub claimed_moved: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub volume_variance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub claim_volume_variance: Decimal,
    pub gps_distance_km: Option<f64>,
    pub distance_variance_km: Option<f64>,
    pub has_variances: bool,
    pub variances: Vec<String>,
}

/// Depot load, station receipt and claimed litres compared with the
/// GPS distance when a trace is present.
pub fn quick_reconcile(request: &ClaimCalculationRequest) -> QuickReconciliation {
    let mut variances = Vec::new();
    let station_received = request.litres_received.unwrap_or(Decimal::ZERO);

    let volume_variance = request.litres_loaded.saturating_sub(station_received).abs();
    if volume_variance > VOLUME_TOLERANCE_LITRES {
        variances.push(format!(
            "Volume variance: {:.1}L exceeds tolerance of {}L",
            volume_variance, VOLUME_TOLERANCE_LITRES
        ));
    }

    let delivered = request.litres_received.unwrap_or(request.litres_loaded);
    let claim_volume_variance = request.litres_moved.saturating_sub(delivered).abs();
    if claim_volume_variance > VOLUME_TOLERANCE_LITRES {
        variances.push(format!(
            "Claimed litres ({}L) don't match delivery records",
            request.litres_moved.normalize()
        ));
    }

    let (mut gps_distance_km, mut distance_variance_km) = (None, None);
    if request.gps_trace.len() > 1 {
        let km_actual = request.km_actual.to_f64().unwrap_or_default();
        let gps_km = trace_distance_km(&request.gps_trace);
        let variance = (km_actual - gps_km).abs();
        if variance > km_actual * DISTANCE_TOLERANCE_RATIO {
            variances.push(format!(
                "Distance variance: GPS trace shows {:.1}km vs claimed {}km",
                gps_km,
                request.km_actual.normalize()
            ));
        }
        gps_distance_km = Some(gps_km);
        distance_variance_km = Some(variance);
    }

    QuickReconciliation {
        depot_loaded: request.litres_loaded,
        station_received,
        claimed_moved: request.litres_moved,
        volume_variance,
        claim_volume_variance,
        gps_distance_km,
        distance_variance_km,
        has_variances: !variances.is_empty(),
        variances,
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCalculation {
    pub claim_id: String,
    pub window_id: String,
    pub delivery_id: String,
    pub route_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub km_beyond_equalisation: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub litres_moved: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub tariff_per_litre_km: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub amount_due: Decimal,
    pub status: UppfClaimStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub reconciliation: QuickReconciliation,
    pub evidence_links: Vec<String>,
}

/// `UPPF-{window}-{last six digits of epoch ms}-{three random digits}`
pub fn generate_claim_id(window_id: &str, now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().rem_euclid(1_000_000);
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("UPPF-{}-{:06}-{:03}", window_id, millis, suffix)
}

/// Computes the claim for the km driven beyond the equalisation point.
///
/// The claim starts as ready to submit and drops to under review when the
/// quick reconciliation finds variances.
pub fn calculate_claim(
    request: &ClaimCalculationRequest,
    now: DateTime<Utc>,
) -> Result<ClaimCalculation, ServiceError> {
    request.validate()?;
    let inputs = [
        ("kmActual", request.km_actual),
        ("kmThreshold", request.km_threshold),
        ("tariffPerLitreKm", request.tariff_per_litre_km),
        ("litresMoved", request.litres_moved),
        ("litresLoaded", request.litres_loaded),
        ("litresReceived", request.litres_received.unwrap_or(Decimal::ZERO)),
    ];
    if let Some((name, _)) = inputs.iter().find(|(_, v)| v.is_sign_negative() && !v.is_zero()) {
        return Err(ServiceError::ValidationError(format!("{} must not be negative", name)));
    }

    let km_excess = (request.km_actual - request.km_threshold).max(Decimal::ZERO);
    if km_excess <= Decimal::ZERO {
        return Err(ServiceError::BadRequest(format!(
            "No UPPF claim applicable. Actual distance ({}km) does not exceed equalisation threshold ({}km)",
            request.km_actual.normalize(),
            request.km_threshold.normalize()
        )));
    }

    let amount_due = km_excess
        .checked_mul(request.litres_moved)
        .and_then(|amount| amount.checked_mul(request.tariff_per_litre_km))
        .ok_or_else(|| ServiceError::ValidationError("claim amount is too large to compute".to_string()))?;
    let reconciliation = quick_reconcile(request);

    let (status, notes) = if reconciliation.has_variances {
        warn!(
            route_id = %request.route_id,
            variances = reconciliation.variances.len(),
            "UPPF claim flagged for review"
        );
        (
            UppfClaimStatus::UnderReview,
            Some(format!("Variances detected: {}", reconciliation.variances.join(", "))),
        )
    } else {
        (UppfClaimStatus::ReadyToSubmit, None)
    };

    let claim_id = generate_claim_id(&request.window_id, now);
    info!(
        claim_id = %claim_id,
        "UPPF claim {}km x {}L x GHS{} = GHS{:.2}",
        km_excess.normalize(),
        request.litres_moved.normalize(),
        request.tariff_per_litre_km.normalize(),
        amount_due
    );

    Ok(ClaimCalculation {
        claim_id,
        window_id: request.window_id.clone(),
        delivery_id: request.delivery_id.clone(),
        route_id: request.route_id.clone(),
        km_beyond_equalisation: km_excess,
        litres_moved: request.litres_moved,
        tariff_per_litre_km: request.tariff_per_litre_km,
        amount_due,
        status,
        notes,
        reconciliation,
        evidence_links: request.evidence_links.clone(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteAnomalyRequest {
    #[serde(default)]
    pub route_id: String,
    #[serde(default)]
    pub gps_trace: Vec<GpsPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteAnomalyReport {
    pub has_anomalies: bool,
    pub anomalies: Vec<String>,
    pub confidence: f64,
    pub stationary_minutes: i64,
}

/// Flags traces that are too short to validate, or that stand still near
/// one spot for more than four hours in total.
pub fn detect_route_anomalies(trace: &[GpsPoint]) -> RouteAnomalyReport {
    if trace.len() < 2 {
        return RouteAnomalyReport {
            has_anomalies: true,
            anomalies: vec!["Insufficient GPS points for route validation".to_string()],
            confidence: 0.9,
            stationary_minutes: 0,
        };
    }

    let gap_limit = Duration::hours(STATIONARY_GAP_HOURS);
    let stationary = trace
        .windows(2)
        .filter_map(|pair| {
            let gap = match (pair[0].timestamp, pair[1].timestamp) {
                (Some(from), Some(to)) => to - from,
                _ => return None,
            };
            let close = haversine_m(&pair[0], &pair[1]) < STATIONARY_RADIUS_M;
            (close && gap > gap_limit).then_some(gap)
        })
        .fold(Duration::zero(), |total, gap| total.checked_add(&gap).unwrap_or(Duration::MAX));

    let mut anomalies = Vec::new();
    if stationary > Duration::hours(STATIONARY_LIMIT_HOURS) {
        anomalies.push("Excessive stationary time detected - possible unauthorized stops".to_string());
    }

    RouteAnomalyReport {
        has_anomalies: !anomalies.is_empty(),
        anomalies,
        confidence: 0.7,
        stationary_minutes: stationary.num_minutes(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NpaClaimLine {
    pub claim_id: String,
    pub window_id: String,
    pub route_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub km_beyond_equalisation: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub litres_moved: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub tariff_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub amount_due: Decimal,
}

/// Submission schedule in the layout NPA expects
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NpaSubmissionPackage {
    pub submission_reference: String,
    pub submission_date: DateTime<Utc>,
    pub window_id: String,
    pub total_claims: usize,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
    pub claims: Vec<NpaClaimLine>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSubmission {
    pub submitted_claims: Vec<String>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
    pub submission_reference: String,
    pub package: NpaSubmissionPackage,
}

/// Selects the window's ready-to-submit claims and builds the NPA package
pub fn prepare_batch_submission(
    window_id: &str,
    claims: &[ClaimRecord],
    now: DateTime<Utc>,
) -> Result<BatchSubmission, ServiceError> {
    let ready: Vec<&ClaimRecord> = claims
        .iter()
        .filter(|c| c.window_id == window_id)
        .filter(|c| c.status == UppfClaimStatus::ReadyToSubmit)
        .filter(|c| c.status.can_transition_to(UppfClaimStatus::Submitted))
        .collect();

    if ready.is_empty() {
        return Err(ServiceError::BadRequest(format!(
            "No claims ready to submit for window {}",
            window_id
        )));
    }

    let submission_reference = format!("UPPF-{}-{}", window_id, now.timestamp_millis());
    let lines: Vec<NpaClaimLine> = ready
        .iter()
        .map(|c| NpaClaimLine {
            claim_id: c.claim_number.clone(),
            window_id: c.window_id.clone(),
            route_id: c.route_id.clone(),
            km_beyond_equalisation: c.km_actual.saturating_sub(c.km_threshold).max(Decimal::ZERO),
            litres_moved: c.volume_litres,
            tariff_rate: c.tariff_per_litre_km,
            amount_due: c.claim_amount,
        })
        .collect();
    let total_amount = lines.iter().try_fold(Decimal::ZERO, |total, line| {
        total.checked_add(line.amount_due).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "claim total for window {} is too large to submit",
                window_id
            ))
        })
    })?;

    Ok(BatchSubmission {
        submitted_claims: lines.iter().map(|l| l.claim_id.clone()).collect(),
        total_amount,
        submission_reference: submission_reference.clone(),
        package: NpaSubmissionPackage {
            submission_reference,
            submission_date: now,
            window_id: window_id.to_string(),
            total_claims: lines.len(),
            total_amount,
            claims: lines,
        },
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_submitted: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_paid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_pending: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub short_pay_amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgingBuckets {
    pub under_30_days: u32,
    pub days_30_to_60: u32,
    pub days_60_to_90: u32,
    pub over_90_days: u32,
}

impl AgingBuckets {
    fn record(&mut self, days: i64) {
        match days {
            i64::MIN..=29 => self.under_30_days += 1,
            30..=59 => self.days_30_to_60 += 1,
            60..=89 => self.days_60_to_90 += 1,
            _ => self.over_90_days += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVariance {
    pub claim_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub expected: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub received: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub variance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgingAlert {
    pub claim_id: String,
    pub window_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub amount_due: Decimal,
    pub days_aging: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VarianceDashboard {
    pub summary: DashboardSummary,
    pub aging: AgingBuckets,
    pub payment_variances: Vec<PaymentVariance>,
    pub aging_alerts: Vec<AgingAlert>,
}

/// Expected versus paid UPPF over the most recent submitted claims
pub fn variance_dashboard(claims: &[ClaimRecord], now: DateTime<Utc>) -> VarianceDashboard {
    let mut submitted: Vec<(&ClaimRecord, DateTime<Utc>)> = claims
        .iter()
        .filter_map(|c| c.submitted_at.map(|at| (c, at)))
        .collect();
    submitted.sort_by(|a, b| b.1.cmp(&a.1));
    submitted.truncate(DASHBOARD_CLAIM_LIMIT);

    let mut dashboard = VarianceDashboard::default();
    for (claim, submitted_at) in submitted {
        let expected = claim.claim_amount;
        dashboard.summary.total_submitted = dashboard.summary.total_submitted.saturating_add(expected);

        if claim.status == UppfClaimStatus::Paid {
            let paid = claim.paid_amount;
            let settled = if paid.is_zero() { expected } else { paid };
            dashboard.summary.total_paid = dashboard.summary.total_paid.saturating_add(settled);

            if !paid.is_zero() && paid < expected {
                let shortfall = expected.saturating_sub(paid);
                dashboard.summary.short_pay_amount = dashboard.summary.short_pay_amount.saturating_add(shortfall);
                dashboard.payment_variances.push(PaymentVariance {
                    claim_id: claim.claim_number.clone(),
                    expected,
                    received: paid,
                    variance: shortfall,
                });
            }
            continue;
        }

        dashboard.summary.total_pending = dashboard.summary.total_pending.saturating_add(expected);
        let days = (now - submitted_at).num_days();
        dashboard.aging.record(days);

        if claim.status == UppfClaimStatus::Submitted && days > AGING_ALERT_DAYS {
            dashboard.aging_alerts.push(AgingAlert {
                claim_id: claim.claim_number.clone(),
                window_id: claim.window_id.clone(),
                amount_due: expected,
                days_aging: days,
            });
        }
    }
    dashboard
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap()
    }

    fn request() -> ClaimCalculationRequest {
        ClaimCalculationRequest {
            window_id: "2024W26".into(),
            delivery_id: "DEL-1001".into(),
            route_id: "TEMA-KUMASI".into(),
            km_actual: dec!(270),
            km_threshold: dec!(200),
            tariff_per_litre_km: dec!(0.0012),
            litres_moved: dec!(36000),
            litres_loaded: dec!(36000),
            litres_received: Some(dec!(35980)),
            ..Default::default()
        }
    }

    #[test]
    fn claim_amount_is_excess_km_times_litres_times_tariff() {
        let claim = calculate_claim(&request(), now()).unwrap();
        assert_eq!(claim.km_beyond_equalisation, dec!(70));
        assert_eq!(claim.amount_due, dec!(3024));
        assert_eq!(claim.status, UppfClaimStatus::ReadyToSubmit);
        assert!(claim.notes.is_none());
        assert!(claim.claim_id.starts_with("UPPF-2024W26-"));
    }

    #[test]
    fn no_claim_within_equalisation_distance() {
        let mut req = request();
        req.km_actual = dec!(200);
        let err = calculate_claim(&req, now()).unwrap_err();
        assert_matches!(err, ServiceError::BadRequest(msg) if msg.starts_with("No UPPF claim applicable"));
    }

    #[test]
    fn negative_inputs_are_rejected() {
        let mut req = request();
        req.litres_moved = dec!(-5);
        assert_matches!(calculate_claim(&req, now()), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn amount_past_decimal_range_is_a_validation_error() {
        let mut req = request();
        req.km_actual = dec!(1_000_000_000_000_000);
        req.km_threshold = dec!(0);
        req.litres_moved = dec!(10_000_000_000);
        req.litres_loaded = dec!(10_000_000_000);
        req.litres_received = Some(dec!(10_000_000_000));
        req.tariff_per_litre_km = dec!(10_000_000_000);
        assert_matches!(
            calculate_claim(&req, now()),
            Err(ServiceError::ValidationError(msg)) if msg == "claim amount is too large to compute"
        );
    }

    #[test]
    fn volume_shortfall_sends_claim_to_review() {
        let mut req = request();
        req.litres_received = Some(dec!(35900));
        let claim = calculate_claim(&req, now()).unwrap();

        assert_eq!(claim.status, UppfClaimStatus::UnderReview);
        assert_eq!(claim.reconciliation.volume_variance, dec!(100));
        assert_eq!(claim.reconciliation.variances.len(), 2);
        assert!(claim.notes.unwrap().starts_with("Variances detected: Volume variance: 100.0L"));
    }

    #[test]
    fn missing_receipt_counts_as_zero_received() {
        let mut req = request();
        req.litres_received = None;
        let recon = quick_reconcile(&req);
        assert_eq!(recon.station_received, Decimal::ZERO);
        assert_eq!(recon.volume_variance, dec!(36000));
        // claimed litres are compared with the loaded figure instead
        assert_eq!(recon.claim_volume_variance, Decimal::ZERO);
    }

    #[test]
    fn gps_distance_outside_ten_percent_is_flagged() {
        let mut req = request();
        req.km_actual = dec!(120);
        req.km_threshold = dec!(50);
        // roughly 111 km due north
        req.gps_trace = vec![GpsPoint::new(5.0, -1.0), GpsPoint::new(6.0, -1.0)];
        assert!(!quick_reconcile(&req).has_variances);

        req.km_actual = dec!(150);
        let recon = quick_reconcile(&req);
        assert!(recon.has_variances);
        assert!(recon.variances[0].starts_with("Distance variance: GPS trace shows 111.3km"));
    }

    #[test]
    fn claim_id_layout() {
        let id = generate_claim_id("W1", now());
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "UPPF");
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 3);
    }

    #[test]
    fn single_point_trace_is_anomalous() {
        let report = detect_route_anomalies(&[GpsPoint::new(5.6, -0.2)]);
        assert!(report.has_anomalies);
        assert_eq!(report.confidence, 0.9);
    }

    #[test]
    fn long_stops_near_one_spot_are_anomalous() {
        let start = now();
        let yard = GpsPoint::new(5.60, -0.20);
        let trace = vec![
            yard.at(start),
            yard.at(start + Duration::hours(3)),
            yard.at(start + Duration::hours(6)),
        ];
        let report = detect_route_anomalies(&trace);
        assert!(report.has_anomalies);
        assert_eq!(report.stationary_minutes, 360);
        assert_eq!(report.confidence, 0.7);
    }

    #[test]
    fn moving_truck_is_not_anomalous() {
        let start = now();
        let trace = vec![
            GpsPoint::new(5.60, -0.20).at(start),
            GpsPoint::new(5.90, -0.40).at(start + Duration::hours(3)),
            GpsPoint::new(6.20, -0.60).at(start + Duration::hours(6)),
        ];
        let report = detect_route_anomalies(&trace);
        assert!(!report.has_anomalies);
        assert_eq!(report.stationary_minutes, 0);
    }

    fn record(number: &str, status: UppfClaimStatus, amount: Decimal) -> ClaimRecord {
        ClaimRecord {
            claim_number: number.into(),
            window_id: "2024W26".into(),
            route_id: "TEMA-KUMASI".into(),
            km_actual: dec!(270),
            km_threshold: dec!(200),
            volume_litres: dec!(36000),
            tariff_per_litre_km: dec!(0.0012),
            claim_amount: amount,
            status,
            ..Default::default()
        }
    }

    #[test]
    fn batch_takes_only_ready_claims_of_the_window() {
        let mut other_window = record("C3", UppfClaimStatus::ReadyToSubmit, dec!(10));
        other_window.window_id = "2024W25".into();
        let claims = vec![
            record("C1", UppfClaimStatus::ReadyToSubmit, dec!(3024)),
            record("C2", UppfClaimStatus::Draft, dec!(500)),
            other_window,
            record("C4", UppfClaimStatus::ReadyToSubmit, dec!(1000.50)),
        ];

        let batch = prepare_batch_submission("2024W26", &claims, now()).unwrap();
        assert_eq!(batch.submitted_claims, vec!["C1", "C4"]);
        assert_eq!(batch.total_amount, dec!(4024.50));
        assert_eq!(
            batch.submission_reference,
            format!("UPPF-2024W26-{}", now().timestamp_millis())
        );
        assert_eq!(batch.package.total_claims, 2);
        assert_eq!(batch.package.claims[0].km_beyond_equalisation, dec!(70));
    }

    #[test]
    fn batch_total_past_decimal_range_is_rejected() {
        let claims = vec![
            record("C1", UppfClaimStatus::ReadyToSubmit, Decimal::MAX),
            record("C2", UppfClaimStatus::ReadyToSubmit, dec!(1)),
        ];
        assert_matches!(
            prepare_batch_submission("2024W26", &claims, now()),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn empty_batch_is_rejected() {
        let claims = vec![record("C2", UppfClaimStatus::Submitted, dec!(500))];
        let err = prepare_batch_submission("2024W26", &claims, now()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad request: No claims ready to submit for window 2024W26"
        );
    }

    #[test]
    fn dashboard_totals_short_pays_and_aging() {
        let submitted = |mut c: ClaimRecord, days: i64| {
            c.submitted_at = Some(now() - Duration::days(days));
            c
        };
        let mut short_paid = record("P1", UppfClaimStatus::Paid, dec!(1000));
        short_paid.paid_amount = dec!(900);
        let fully_paid = record("P2", UppfClaimStatus::Paid, dec!(400));

        let claims = vec![
            submitted(short_paid, 40),
            submitted(fully_paid, 50),
            submitted(record("S1", UppfClaimStatus::Submitted, dec!(200)), 10),
            submitted(record("S2", UppfClaimStatus::Submitted, dec!(300)), 45),
            submitted(record("R1", UppfClaimStatus::UnderReview, dec!(50)), 95),
            record("D1", UppfClaimStatus::Draft, dec!(9999)),
        ];

        let dashboard = variance_dashboard(&claims, now());
        assert_eq!(dashboard.summary.total_submitted, dec!(1950));
        assert_eq!(dashboard.summary.total_paid, dec!(1300));
        assert_eq!(dashboard.summary.total_pending, dec!(550));
        assert_eq!(dashboard.summary.short_pay_amount, dec!(100));
        assert_eq!(dashboard.payment_variances.len(), 1);
        assert_eq!(
            dashboard.aging,
            AgingBuckets {
                under_30_days: 1,
                days_30_to_60: 1,
                days_60_to_90: 0,
                over_90_days: 1,
            }
        );
        assert_eq!(dashboard.aging_alerts.len(), 1);
        assert_eq!(dashboard.aging_alerts[0].claim_id, "S2");
    }
}
