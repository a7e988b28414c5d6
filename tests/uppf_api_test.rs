mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::TestApp;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn claim_request(litres_received: f64) -> Value {
    json!({
        "windowId": "2024W26",
        "deliveryId": "DEL-1001",
        "routeId": "TEMA-KUMASI",
        "kmActual": 270,
        "kmThreshold": 200,
        "tariffPerLitreKm": 0.0012,
        "litresMoved": 36000,
        "litresLoaded": 36000,
        "litresReceived": litres_received,
        "evidenceLinks": ["https://evidence.example/waybill/WB-1"]
    })
}

fn consignment(station_litres: f64) -> Value {
    json!({
        "consignmentId": "CN-2024-0701",
        "depot": {
            "litresLoaded": 5000.0,
            "loadingTemp": 15.0,
            "productType": "PMS",
            "loadingTime": "2024-07-01T06:00:00Z",
            "sealNumbers": ["SEAL001", "SEAL002"],
            "loadingDocRef": "DLR-001",
            "densityAt15C": 0.745
        },
        "transporter": {
            "litresDelivered": 4995.0,
            "deliveryTemp": 15.0,
            "deliveryTime": "2024-07-01T14:00:00Z",
            "waybillNumber": "WB-001",
            "kilometersRun": 270.0
        },
        "station": {
            "litresReceived": station_litres,
            "receivingTemp": 15.0,
            "receivingTime": "2024-07-01T15:00:00Z",
            "receivingDocRef": "SRR-001"
        }
    })
}

#[tokio::test]
async fn calculates_claim_beyond_equalisation_point() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(Method::POST, "/api/v1/uppf/claims/calculate", Some(claim_request(35980.0)))
        .await;

    assert_eq!(status, StatusCode::OK);
    let claim = &body["data"];
    assert!(claim["claimId"].as_str().unwrap().starts_with("UPPF-2024W26-"));
    assert_eq!(claim["kmBeyondEqualisation"], 70.0);
    assert_eq!(claim["amountDue"], 3024.0);
    assert_eq!(claim["status"], "ready_to_submit");
    assert_eq!(claim["reconciliation"]["hasVariances"], false);
}

#[tokio::test]
async fn short_delivery_sends_claim_to_review() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(Method::POST, "/api/v1/uppf/claims/calculate", Some(claim_request(35900.0)))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "under_review");
    assert!(body["data"]["notes"]
        .as_str()
        .unwrap()
        .starts_with("Variances detected: Volume variance: 100.0L"));
}

#[tokio::test]
async fn no_claim_within_equalisation_distance() {
    let app = TestApp::new().await;
    let mut request = claim_request(36000.0);
    request["kmActual"] = json!(150);

    let (status, body) = app
        .json(Method::POST, "/api/v1/uppf/claims/calculate", Some(request))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Bad request: No UPPF claim applicable. Actual distance (150km) does not exceed equalisation threshold (200km)"
    );
}

#[tokio::test]
async fn claim_amount_past_decimal_range_is_rejected() {
    let app = TestApp::new().await;
    let mut request = claim_request(1e10);
    request["kmActual"] = json!(1e15);
    request["kmThreshold"] = json!(0);
    request["litresMoved"] = json!(1e10);
    request["litresLoaded"] = json!(1e10);
    request["tariffPerLitreKm"] = json!(1e10);

    let (status, body) = app
        .json(Method::POST, "/api/v1/uppf/claims/calculate", Some(request))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation error: claim amount is too large to compute");
}

#[tokio::test]
async fn batch_submit_packages_ready_claims() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/claims"))
        .and(query_param("status", "ready_to_submit"))
        .and(query_param("windowId", "2024W26"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"claimNumber": "UPPF-2024W26-000001-001", "windowId": "2024W26", "routeId": "TEMA-KUMASI", "claimAmount": 3024, "status": "ready_to_submit"},
            {"claimNumber": "UPPF-2024W26-000002-002", "windowId": "2024W26", "routeId": "TEMA-TAMALE", "claimAmount": 1476.5, "status": "ready_to_submit"}
        ]})))
        .expect(1)
        .mount(&app.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/npa/submissions"))
        .and(body_partial_json(json!({"windowId": "2024W26", "totalClaims": 2, "totalAmount": 4500.5})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "npa-77", "status": "received"})))
        .expect(1)
        .mount(&app.upstream)
        .await;
    for claim in ["UPPF-2024W26-000001-001", "UPPF-2024W26-000002-002"] {
        Mock::given(method("POST"))
            .and(path(format!("/claims/{}/submit", claim)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "submitted"})))
            .expect(1)
            .mount(&app.upstream)
            .await;
    }

    let (status, body) = app
        .json(Method::POST, "/api/v1/uppf/claims/batch-submit/2024W26", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let outcome = &body["data"];
    assert_eq!(outcome["submittedClaims"].as_array().unwrap().len(), 2);
    assert_eq!(outcome["totalAmount"], 4500.5);
    assert!(outcome["submissionReference"]
        .as_str()
        .unwrap()
        .starts_with("UPPF-2024W26-"));
    assert_eq!(outcome["upstream"]["id"], "npa-77");
    assert!(outcome.get("unmarkedClaims").is_none());
}

#[tokio::test]
async fn resubmitting_a_window_sends_nothing_new_to_npa() {
    let app = TestApp::new().await;
    let ready = json!({"claimNumber": "C1", "windowId": "W1", "claimAmount": 3024, "status": "ready_to_submit"});
    Mock::given(method("GET"))
        .and(path("/claims"))
        .and(query_param("windowId", "W1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([ready])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&app.upstream)
        .await;
    // after the first batch the claim service reports C1 as submitted
    Mock::given(method("GET"))
        .and(path("/claims"))
        .and(query_param("windowId", "W1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"claimNumber": "C1", "windowId": "W1", "claimAmount": 3024, "status": "submitted"}
        ])))
        .mount(&app.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/claims/C1/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "submitted"})))
        .expect(1)
        .mount(&app.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/npa/submissions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "npa-1"})))
        .expect(1)
        .mount(&app.upstream)
        .await;

    let (first, _) = app
        .json(Method::POST, "/api/v1/uppf/claims/batch-submit/W1", None)
        .await;
    let (second, body) = app
        .json(Method::POST, "/api/v1/uppf/claims/batch-submit/W1", None)
        .await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Bad request: No claims ready to submit for window W1");

    let requests = app.upstream.received_requests().await.unwrap();
    let marked = requests
        .iter()
        .find(|r| r.url.path() == "/claims/C1/submit")
        .unwrap();
    let marker: Value = serde_json::from_slice(&marked.body).unwrap();
    assert!(marker["submissionReference"].as_str().unwrap().starts_with("UPPF-W1-"));
}

#[tokio::test]
async fn claim_transitions_are_forwarded() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/claims/c-42/reject"))
        .and(body_partial_json(json!({"reason": "Waybill missing"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "rejected"})))
        .expect(1)
        .mount(&app.upstream)
        .await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/uppf/claims/c-42/reject",
            Some(json!({"reason": "Waybill missing"})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "rejected");
}

#[tokio::test]
async fn dashboard_reports_short_pays_and_aging() {
    let app = TestApp::new().await;
    let now = Utc::now();
    Mock::given(method("GET"))
        .and(path("/claims"))
        .and(query_param("submitted", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "claimNumber": "C-PAID", "windowId": "2024W20", "claimAmount": 3024,
                "paidAmount": 3000, "status": "paid",
                "submittedAt": (now - Duration::days(50)).to_rfc3339()
            },
            {
                "claimNumber": "C-LATE", "windowId": "2024W22", "claimAmount": 500,
                "status": "submitted",
                "submittedAt": (now - Duration::days(45)).to_rfc3339()
            },
            {
                "claimNumber": "C-DRAFT", "windowId": "2024W26", "claimAmount": 900,
                "status": "draft"
            }
        ])))
        .mount(&app.upstream)
        .await;

    let (status, body) = app
        .json(Method::GET, "/api/v1/uppf/claims/dashboard", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let dashboard = &body["data"];
    assert_eq!(dashboard["summary"]["totalSubmitted"], 3524.0);
    assert_eq!(dashboard["summary"]["totalPaid"], 3000.0);
    assert_eq!(dashboard["summary"]["totalPending"], 500.0);
    assert_eq!(dashboard["summary"]["shortPayAmount"], 24.0);
    assert_eq!(dashboard["aging"]["days30To60"], 1);
    assert_eq!(dashboard["paymentVariances"][0]["claimId"], "C-PAID");
    assert_eq!(dashboard["agingAlerts"][0]["claimId"], "C-LATE");
    assert_eq!(dashboard["agingAlerts"][0]["daysAging"], 45);
}

#[tokio::test]
async fn three_way_reconciliation_matches_clean_consignment() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/uppf/reconciliation/three-way",
            Some(consignment(4990.0)),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let result = &body["data"];
    assert_eq!(result["consignmentId"], "CN-2024-0701");
    assert_eq!(result["status"], "MATCHED");
    assert_eq!(result["variances"].as_array().unwrap().len(), 0);
    assert_eq!(result["autoReconcile"]["canAutoReconcile"], true);
    assert_eq!(result["documentRefs"], json!(["DLR-001", "WB-001", "SRR-001"]));
}

#[tokio::test]
async fn three_way_reconciliation_flags_station_shortage() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/uppf/reconciliation/three-way",
            Some(consignment(4700.0)),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let result = &body["data"];
    assert_ne!(result["status"], "MATCHED");
    assert_eq!(result["variances"][0]["type"], "VOLUME");
    assert_eq!(result["autoReconcile"]["canAutoReconcile"], false);
}

#[tokio::test]
async fn route_anomalies_detect_long_stops() {
    let app = TestApp::new().await;
    let trace = json!({
        "routeId": "TEMA-KUMASI",
        "gpsTrace": [
            {"latitude": 5.6698, "longitude": -0.0166, "timestamp": "2024-07-01T06:00:00Z"},
            {"latitude": 5.6699, "longitude": -0.0166, "timestamp": "2024-07-01T11:00:00Z"},
            {"latitude": 6.6885, "longitude": -1.6244, "timestamp": "2024-07-01T15:00:00Z"}
        ]
    });

    let (status, body) = app
        .json(Method::POST, "/api/v1/uppf/routes/anomalies", Some(trace))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["hasAnomalies"], true);
    assert_eq!(body["data"]["stationaryMinutes"], 300);
    assert_eq!(
        body["data"]["anomalies"][0],
        "Excessive stationary time detected - possible unauthorized stops"
    );
}

#[tokio::test]
async fn single_gps_point_is_insufficient() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/uppf/routes/anomalies",
            Some(json!({"gpsTrace": [{"latitude": 5.6, "longitude": -0.1}]})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["anomalies"][0],
        "Insufficient GPS points for route validation"
    );
    assert_eq!(body["data"]["confidence"], 0.9);
}
