//! Unified Petroleum Price Fund claims: claim amounts, reconciliation
//! against delivery records, route checks and NPA batch submission.

pub mod claims;
pub mod gps;
pub mod reconciliation;

pub use claims::{
    calculate_claim, detect_route_anomalies, prepare_batch_submission, quick_reconcile,
    variance_dashboard, BatchSubmission, ClaimCalculation, ClaimCalculationRequest,
    NpaSubmissionPackage, QuickReconciliation, RouteAnomalyReport, RouteAnomalyRequest,
    UppfClaimStatus, VarianceDashboard,
};
pub use gps::{haversine_m, trace_distance_km, GpsPoint};
pub use reconciliation::{reconcile, ReconciliationResult, ThreeWayReconciliationRequest};
