//! HTTP surface around the sync core: API-key guard, health check and the
//! per-record endpoints.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

mod common;
use common::{call, pull, test_app};

#[tokio::test]
async fn health_needs_no_key() {
    let (app, _) = test_app();
    let response = app
        .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn sync_routes_require_the_api_key() {
    let (app, state) = test_app();

    for (method, uri) in [
        (Method::GET, "/api/v1/sync/pull"),
        (Method::POST, "/api/v1/sync/push"),
        (Method::GET, "/api/v1/readings"),
        (Method::GET, "/api/v1/bills"),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method.clone())
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    }

    let response = app
        .oneshot(
            Request::get("/api/v1/sync/pull")
                .header("x-api-key", "wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Rejected before reaching the resolver: no user was created.
    assert!(state
        .store
        .find_user_by_email(&state.config.default_user_email)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn reading_crud() {
    let (app, _) = test_app();

    let (status, created) = call(
        &app,
        Method::POST,
        "/api/v1/readings",
        Some(json!({
            "date": "2023-08-01",
            "groundFloorReading": 1000,
            "firstFloorReading": 500,
            "notes": "Initial reading"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["totalConsumption"], 1500);
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/readings/{id}");

    let (status, fetched) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, patched) = call(
        &app,
        Method::PATCH,
        &uri,
        Some(json!({ "firstFloorReading": 650, "notes": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["groundFloorReading"], 1000);
    assert_eq!(patched["totalConsumption"], 1650);
    assert!(patched["notes"].is_null());
    assert_eq!(patched["createdAt"], created["createdAt"]);
    assert_ne!(patched["updatedAt"], created["updatedAt"]);

    // The edit is visible to sync clients.
    let res = pull(&app, created["updatedAt"].as_str()).await;
    assert_eq!(res["readings"][0]["id"], json!(id));

    let (status, body) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn readings_are_listed_newest_first() {
    let (app, _) = test_app();
    for date in ["2023-08-01", "2023-10-01", "2023-09-01"] {
        call(
            &app,
            Method::POST,
            "/api/v1/readings",
            Some(json!({ "date": date, "groundFloorReading": 1, "firstFloorReading": 1 })),
        )
        .await;
    }

    let (status, list) = call(&app, Method::GET, "/api/v1/readings", None).await;
    assert_eq!(status, StatusCode::OK);
    let dates: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2023-10-01", "2023-09-01", "2023-08-01"]);
}

#[tokio::test]
async fn bill_crud_and_payment_status() {
    let (app, _) = test_app();

    let (status, created) = call(
        &app,
        Method::POST,
        "/api/v1/bills",
        Some(json!({
            "billNumber": "BILL-2023-002",
            "billingPeriod": "2023-09",
            "dueDate": "2023-10-15",
            "amount": "180",
            "unitsConsumed": 350
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["amount"], "180.00");
    assert_eq!(created["isPaid"], false);
    let uri = format!("/api/v1/bills/{}", created["id"].as_str().unwrap());

    let (status, paid) = call(&app, Method::PATCH, &uri, Some(json!({ "paidDate": "2023-10-10" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["isPaid"], true);
    assert_eq!(paid["paidDate"], "2023-10-10");
    assert_eq!(paid["amount"], "180.00");

    let (status, unpaid) = call(&app, Method::PATCH, &uri, Some(json!({ "paidDate": null }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unpaid["isPaid"], false);

    let (status, body) = call(&app, Method::PATCH, &uri, Some(json!({ "dueDate": "soon" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().starts_with("dueDate"));

    let (status, _) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let (app, _) = test_app();
    let id = Uuid::new_v4();

    for uri in [format!("/api/v1/readings/{id}"), format!("/api/v1/bills/{id}")] {
        let (status, _) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, Method::PATCH, &uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
