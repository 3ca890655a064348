use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use keke_pool::api::rest::router;
use keke_pool::engine::coordinator::PoolSettings;
use keke_pool::engine::directory::VehicleDirectory;
use keke_pool::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> axum::Router {
    let state = AppState::new(
        VehicleDirectory::with_default_fleet(Utc::now()),
        PoolSettings::default(),
        1024,
    );
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn join_body(name: &str, lat: f64, lng: f64) -> Value {
    json!({
        "userName": name,
        "pickupLat": lat,
        "pickupLng": lng,
        "destinationName": "Main Library",
        "destinationLat": 6.8975,
        "destinationLng": 3.7198
    })
}

async fn join(app: &axum::Router, mut body: Value, pool_id: Option<&str>, vehicle_id: Option<u32>) -> Value {
    if let Some(pool_id) = pool_id {
        body["poolId"] = json!(pool_id);
    }
    if let Some(vehicle_id) = vehicle_id {
        body["vehicleId"] = json!(vehicle_id);
    }
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/kekepool/join", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

/// Creates a pool on `vehicle_id` and fills it with riders standing together.
async fn fill_pool(app: &axum::Router, vehicle_id: u32) -> (String, Value) {
    let first = join(app, join_body("Ada", 6.8930, 3.7200), None, Some(vehicle_id)).await;
    let pool_id = first["pool"]["id"].as_str().unwrap().to_string();

    let mut last = first;
    for (index, name) in ["Bola", "Chike", "Dayo"].into_iter().enumerate() {
        let offset = 0.0001 * (index as f64 + 1.0);
        last = join(app, join_body(name, 6.8930 + offset, 3.7200), Some(&pool_id), None).await;
    }
    (pool_id, last)
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["vehicles"]["total"], 6);
    assert_eq!(body["kekePools"]["total"], 0);
}

#[tokio::test]
async fn metrics_endpoint_reports_pool_operations() {
    let app = setup();
    join(&app, join_body("Ada", 6.8930, 3.7200), None, Some(1)).await;

    let response = app.oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("pool_operations_total"));
    assert!(body.contains("vehicles_reserved_for_pool 1"));
}

#[tokio::test]
async fn join_creates_pool_and_locks_vehicle() {
    let app = setup();
    let body = join(&app, join_body("Ada", 6.8930, 3.7200), None, Some(2)).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["pool"]["status"], "waiting");
    assert_eq!(body["pool"]["spotsLeft"], 3);
    assert_eq!(body["pool"]["vehicleId"], 2);
    assert!(body["riderId"].as_str().unwrap().starts_with("rider_"));
    assert!(body["reservation"].is_null());

    let vehicle = body_json(app.clone().oneshot(get_request("/api/vehicles/2")).await.unwrap()).await;
    assert_eq!(vehicle["reservedForPool"], true);
    assert_eq!(vehicle["poolId"], body["pool"]["id"]);

    let available = body_json(
        app.oneshot(get_request("/api/vehicles/available"))
            .await
            .unwrap(),
    )
    .await;
    assert!(available.as_array().unwrap().iter().all(|v| v["id"] != 2));
}

#[tokio::test]
async fn join_without_pool_or_vehicle_is_missing_field() {
    let app = setup();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/kekepool/join",
            join_body("Ada", 6.8930, 3.7200),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["kind"], "missing_field");
    assert_eq!(body["field"], "vehicleId");

    let health = body_json(app.oneshot(get_request("/api/health")).await.unwrap()).await;
    assert_eq!(health["kekePools"]["total"], 0);
}

#[tokio::test]
async fn join_missing_pickup_is_rejected() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/kekepool/join",
            json!({ "userName": "Ada", "destinationName": "Main Library", "vehicleId": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["field"], "pickupLat");
}

#[tokio::test]
async fn non_integer_vehicle_id_is_not_found() {
    let app = setup();
    let mut body = join_body("Ada", 6.8930, 3.7200);
    body["vehicleId"] = json!("2");

    let response = app
        .oneshot(json_request("POST", "/api/kekepool/join", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_reports_open_pool_for_destination() {
    let app = setup();
    let joined = join(&app, join_body("Ada", 6.8930, 3.7200), None, Some(1)).await;

    let response = app
        .clone()
        .oneshot(get_request("/api/kekepool/status?destination=Main%20Library"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["exists"], true);
    assert_eq!(body["group"]["id"], joined["pool"]["id"]);

    let other = body_json(
        app.clone()
            .oneshot(get_request("/api/kekepool/status?destination=Cafeteria"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(other["exists"], false);

    let missing = app
        .oneshot(get_request("/api/kekepool/status"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn second_rider_joins_open_pool_without_pool_id() {
    let app = setup();
    let first = join(&app, join_body("Ada", 6.8930, 3.7200), None, Some(1)).await;
    let second = join(&app, join_body("Bola", 6.8931, 3.7200), None, None).await;

    assert_eq!(second["pool"]["id"], first["pool"]["id"]);
    assert_eq!(second["pool"]["riders"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn fourth_rider_makes_pool_ready_with_reservation() {
    let app = setup();
    let (pool_id, last) = fill_pool(&app, 2).await;

    assert_eq!(last["pool"]["status"], "ready");
    assert_eq!(last["pool"]["spotsLeft"], 0);
    assert_eq!(last["pool"]["syncState"]["mode"], "group");
    assert!(last["pool"]["optimizedRoute"].is_object());

    let reservation = &last["reservation"];
    assert_eq!(reservation["status"], "ready");
    assert_eq!(reservation["kind"]["type"], "keke_pool");
    assert_eq!(reservation["kind"]["poolId"], pool_id.as_str());

    let reservation_id = reservation["id"].as_str().unwrap();
    let view = app
        .clone()
        .oneshot(get_request(&format!("/api/reservations/{reservation_id}")))
        .await
        .unwrap();
    assert_eq!(view.status(), StatusCode::OK);
    assert_eq!(body_json(view).await["isValid"], true);

    let fifth = app
        .oneshot(json_request(
            "POST",
            "/api/kekepool/join",
            json!({
                "poolId": pool_id,
                "userName": "Efe",
                "pickupLat": 6.8930,
                "pickupLng": 3.7200,
                "destinationName": "Main Library",
                "destinationLat": 6.8975,
                "destinationLng": 3.7198
            }),
        ))
        .await
        .unwrap();
    assert_eq!(fifth.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(fifth).await["kind"], "capacity_exceeded");
}

#[tokio::test]
async fn pool_locked_vehicle_rejects_solo_eta() {
    let app = setup();
    join(&app, join_body("Ada", 6.8930, 3.7200), None, Some(3)).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/rides/calculate-eta",
            json!({
                "pickupLat": 6.8930,
                "pickupLng": 3.7200,
                "destLat": 6.8975,
                "destLng": 3.7198,
                "vehicleId": 3
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["kind"], "invalid_state");
}

#[tokio::test]
async fn calculate_eta_for_free_vehicle() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/rides/calculate-eta",
            json!({
                "pickupLat": 6.8930,
                "pickupLng": 3.7200,
                "destLat": 6.8975,
                "destLng": 3.7198,
                "vehicleId": 1
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["pickupETA"].as_u64().unwrap() >= 2);
    assert!(body["tripETA"].as_u64().unwrap() >= 3);
    assert_eq!(
        body["totalETA"].as_u64().unwrap(),
        body["pickupETA"].as_u64().unwrap() + body["tripETA"].as_u64().unwrap()
    );
    assert_eq!(body["assignedVehicle"]["id"], 1);
}

#[tokio::test]
async fn start_is_idempotent_and_complete_ride_closes_pool() {
    let app = setup();
    let (pool_id, _) = fill_pool(&app, 4).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_empty(&format!("/api/kekepool/{pool_id}/start")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["pool"]["status"], "in_progress");
    }

    let completed = app
        .clone()
        .oneshot(post_empty("/api/vehicles/4/complete-ride"))
        .await
        .unwrap();
    assert_eq!(completed.status(), StatusCode::OK);
    let body = body_json(completed).await;
    assert_eq!(body["closedPool"], pool_id.as_str());
    assert_eq!(body["completedReservations"], 1);

    let gone = app
        .clone()
        .oneshot(get_request(&format!("/api/kekepool/{pool_id}")))
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let vehicle = body_json(app.oneshot(get_request("/api/vehicles/4")).await.unwrap()).await;
    assert_eq!(vehicle["reservedForPool"], false);
    assert_eq!(vehicle["available"], true);
    assert_eq!(vehicle["passengerCount"], 0);
}

#[tokio::test]
async fn start_waiting_pool_is_invalid_state() {
    let app = setup();
    let joined = join(&app, join_body("Ada", 6.8930, 3.7200), None, Some(1)).await;
    let pool_id = joined["pool"]["id"].as_str().unwrap();

    let response = app
        .oneshot(post_empty(&format!("/api/kekepool/{pool_id}/start")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn last_rider_leaving_deletes_pool() {
    let app = setup();
    let joined = join(&app, join_body("Ada", 6.8930, 3.7200), None, Some(5)).await;
    let pool_id = joined["pool"]["id"].as_str().unwrap().to_string();
    let rider_id = joined["riderId"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/kekepool/{pool_id}/leave"),
            json!({ "riderId": rider_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["outcome"], "deleted");
    assert_eq!(body["poolId"], pool_id.as_str());

    let gone = app
        .clone()
        .oneshot(get_request(&format!("/api/kekepool/{pool_id}")))
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let vehicle = body_json(app.oneshot(get_request("/api/vehicles/5")).await.unwrap()).await;
    assert_eq!(vehicle["reservedForPool"], false);
}

#[tokio::test]
async fn leaving_with_unknown_rider_is_not_found() {
    let app = setup();
    let joined = join(&app, join_body("Ada", 6.8930, 3.7200), None, Some(6)).await;
    let pool_id = joined["pool"]["id"].as_str().unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/kekepool/{pool_id}/leave"),
            json!({ "riderId": "rider_nobody" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_pool_id_is_not_found() {
    let app = setup();
    let response = app
        .oneshot(get_request("/api/kekepool/not-a-pool"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["kind"], "not_found");
}

#[tokio::test]
async fn reserve_and_release_solo_seat() {
    let app = setup();
    let reserved = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/vehicles/1/reserve",
            json!({
                "userName": "Tobi",
                "pickupLat": 6.8930,
                "pickupLng": 3.7200,
                "destLat": 6.8975,
                "destLng": 3.7198
            }),
        ))
        .await
        .unwrap();
    assert_eq!(reserved.status(), StatusCode::OK);
    let body = body_json(reserved).await;
    assert_eq!(body["passengerCount"], 1);
    assert_eq!(body["availableSeats"], 3);

    let reservation_id = body["reservationId"].as_str().unwrap();
    let view = body_json(
        app.clone()
            .oneshot(get_request(&format!("/api/reservations/{reservation_id}")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(view["kind"]["type"], "solo");
    assert_eq!(view["isValid"], true);

    let released = app
        .oneshot(post_empty("/api/vehicles/1/release"))
        .await
        .unwrap();
    assert_eq!(released.status(), StatusCode::OK);
    let body = body_json(released).await;
    assert_eq!(body["passengerCount"], 0);
    assert_eq!(body["available"], true);
}

#[tokio::test]
async fn nearby_requires_coordinates_and_sorts_by_distance() {
    let app = setup();
    let missing = app
        .clone()
        .oneshot(get_request("/api/vehicles/nearby?lat=6.89"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get_request("/api/vehicles/nearby?lat=6.89286&lng=3.72351&radius=5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let vehicles = body.as_array().unwrap();
    assert_eq!(vehicles.len(), 6);
    assert_eq!(vehicles[0]["id"], 3);
}

#[tokio::test]
async fn unknown_reservation_is_not_found() {
    let app = setup();
    let response = app
        .oneshot(get_request(
            "/api/reservations/00000000-0000-4000-8000-000000000000",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn solo_reserve_request(vehicle_id: u32) -> Request<Body> {
    json_request(
        "POST",
        &format!("/api/vehicles/{vehicle_id}/reserve"),
        json!({
            "userName": "Tobi",
            "pickupLat": 6.8930,
            "pickupLng": 3.7200,
            "destLat": 6.8975,
            "destLng": 3.7198
        }),
    )
}

#[tokio::test]
async fn started_pool_reservation_is_in_progress() {
    let app = setup();
    let (pool_id, last) = fill_pool(&app, 6).await;
    let reservation_id = last["reservation"]["id"].as_str().unwrap().to_string();

    let started = app
        .clone()
        .oneshot(post_empty(&format!("/api/kekepool/{pool_id}/start")))
        .await
        .unwrap();
    assert_eq!(started.status(), StatusCode::OK);

    let view = body_json(
        app.oneshot(get_request(&format!("/api/reservations/{reservation_id}")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(view["status"], "in_progress");
}

#[tokio::test]
async fn booking_made_after_complete_ride_stays_reserved() {
    let app = setup();
    let first = app.clone().oneshot(solo_reserve_request(2)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let completed = body_json(
        app.clone()
            .oneshot(post_empty("/api/vehicles/2/complete-ride"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(completed["completedReservations"], 1);

    let second = body_json(app.clone().oneshot(solo_reserve_request(2)).await.unwrap()).await;
    let reservation_id = second["reservationId"].as_str().unwrap();

    let view = body_json(
        app.oneshot(get_request(&format!("/api/reservations/{reservation_id}")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(view["status"], "reserved");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reserve_and_complete_ride_agree_on_seat_state() {
    let app = setup();

    for _ in 0..25 {
        let reset = app
            .clone()
            .oneshot(post_empty("/api/vehicles/5/complete-ride"))
            .await
            .unwrap();
        assert_eq!(reset.status(), StatusCode::OK);

        let reserve = tokio::spawn(app.clone().oneshot(solo_reserve_request(5)));
        let complete = tokio::spawn(app.clone().oneshot(post_empty("/api/vehicles/5/complete-ride")));
        let reserved = reserve.await.unwrap().unwrap();
        let completed = complete.await.unwrap().unwrap();
        assert_eq!(reserved.status(), StatusCode::OK);
        assert_eq!(completed.status(), StatusCode::OK);

        let reservation_id = body_json(reserved).await["reservationId"]
            .as_str()
            .unwrap()
            .to_string();
        let view = body_json(
            app.clone()
                .oneshot(get_request(&format!("/api/reservations/{reservation_id}")))
                .await
                .unwrap(),
        )
        .await;
        let vehicle = body_json(app.clone().oneshot(get_request("/api/vehicles/5")).await.unwrap()).await;

        match view["status"].as_str().unwrap() {
            "reserved" => assert_eq!(vehicle["passengerCount"], 1),
            "completed" => assert_eq!(vehicle["passengerCount"], 0),
            other => panic!("unexpected reservation status {other}"),
        }
    }
}
