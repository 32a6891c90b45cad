//! Integration tests for the compmon read API

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::{StubRemote, StubReply};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;

use compmon::services::{
    ClipTrigger, EngineTimeouts, HttpTransport, Scheduler, SchedulerConfig, UpdateCoordinator,
};
use compmon::{build_router, AppState};
use compmon_common::events::EventBus;

fn scripted_remote() -> StubRemote {
    let stub = StubRemote::new();
    stub.get(
        "/composition",
        StubReply::Json(
            200,
            json!({
                "name": {"value": "Show"},
                "layers": [{"id": 1, "name": {"value": "Main"}, "clips": []}],
                "layergroups": [
                    {"name": {"value": "Stage"}, "layers": [
                        {"id": 7, "name": {"value": "Video"}, "clips": []}
                    ]}
                ]
            }),
        ),
    );
    stub.get(
        "/composition/layers/by-id/1",
        StubReply::Json(
            200,
            json!({"active_clip": {"id": 11, "name": {"value": "Loop"}}, "clips": [{"id": 11, "name": {"value": "Loop"}}, null]}),
        ),
    );
    stub.get(
        "/composition/layers/by-id/7",
        StubReply::Json(
            200,
            json!({"bypassed": {"value": true}, "clips": [{"id": 41, "name": "Opener"}, {"id": 42}]}),
        ),
    );
    stub.get(
        "/composition/clips/by-id/42",
        StubReply::Json(200, json!({"name": {"value": "Intro"}})),
    );
    stub.post(
        "/composition/clips/by-id/42/connect",
        StubReply::Status(204),
    );
    stub
}

/// Test helper: router over a scheduler that has run `cycles` cycles
///
/// The scheduler is returned so the test can run more cycles.
async fn create_test_app(stub: &StubRemote, cycles: usize) -> (Router, Scheduler, EventBus) {
    let transport = Arc::new(HttpTransport::new(stub.start().await).unwrap());
    let event_bus = EventBus::new(100);

    let coordinator = UpdateCoordinator::new(transport.clone(), EngineTimeouts::default());
    let (mut scheduler, handle) = Scheduler::new(
        coordinator,
        SchedulerConfig {
            poll_interval: Duration::from_secs(60),
            rediscover_interval: None,
        },
        event_bus.clone(),
        CancellationToken::new(),
    );
    for _ in 0..cycles {
        scheduler.run_cycle().await;
    }

    let trigger = ClipTrigger::new(transport, Duration::from_secs(2));
    let app = build_router(AppState::new(handle, trigger, event_bus.clone()));
    (app, scheduler, event_bus)
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let stub = scripted_remote();
    let (app, mut scheduler, _) = create_test_app(&stub, 0).await;

    let (status, json) = send(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "starting");
    assert_eq!(json["module"], "compmon");
    assert!(!json["revision"].as_str().unwrap().is_empty());
    assert!(json.get("last_error").is_none());

    scheduler.run_cycle().await;
    let (_, json) = send(&app, "GET", "/health").await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_state_unavailable_before_first_cycle() {
    let stub = scripted_remote();
    let (app, _scheduler, _) = create_test_app(&stub, 0).await;

    let (status, json) = send(&app, "GET", "/state").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "UNAVAILABLE");

    let (status, _) = send(&app, "GET", "/clips").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_composition_lists_layers_in_order() {
    let stub = scripted_remote();
    let (app, _scheduler, _) = create_test_app(&stub, 1).await;

    let (status, json) = send(&app, "GET", "/composition").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({
            "name": "Show",
            "layers": [
                {"id": "1", "name": "Main"},
                {"id": "7", "name": "Stage - Video"}
            ]
        })
    );
}

#[tokio::test]
async fn test_layer_state() {
    let stub = scripted_remote();
    let (app, _scheduler, _) = create_test_app(&stub, 1).await;

    let (status, json) = send(&app, "GET", "/layers/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Main");
    assert_eq!(json["active_clip_id"], "11");
    assert_eq!(json["active_clip_name"], "Loop");
    assert_eq!(json["is_bypassed"], false);

    let (_, json) = send(&app, "GET", "/layers/7").await;
    assert_eq!(json["active_clip_name"], "Empty");
    assert_eq!(json["is_bypassed"], true);

    let (status, json) = send(&app, "GET", "/layers/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_state_and_clips() {
    let stub = scripted_remote();
    let (app, _scheduler, _) = create_test_app(&stub, 1).await;

    let (status, json) = send(&app, "GET", "/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["composition_name"], "Show");
    assert_eq!(json["layers"]["7"]["is_bypassed"], true);
    assert!(json["updated_at"].is_string());

    let (_, json) = send(&app, "GET", "/clips").await;
    let names: Vec<&str> = json["clips"]
        .as_array()
        .unwrap()
        .iter()
        .map(|slot| slot["clip_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Loop", "Opener", "Intro"]);

    let (status, json) = send(&app, "GET", "/layers/7/clips").await;
    assert_eq!(status, StatusCode::OK);
    let clips = json["clips"].as_array().unwrap();
    assert_eq!(clips.len(), 2);
    assert_eq!(clips[1]["column_index"], 2);
    assert_eq!(clips[1]["clip_id"], "42");
    assert_eq!(clips[1]["layer_name"], "Stage - Video");

    let (status, _) = send(&app, "GET", "/layers/99/clips").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clips_flag_the_active_slot() {
    let stub = scripted_remote();
    let (app, _scheduler, _) = create_test_app(&stub, 1).await;

    let (_, json) = send(&app, "GET", "/clips").await;
    let flags: Vec<(Value, bool)> = json["clips"]
        .as_array()
        .unwrap()
        .iter()
        .map(|slot| (slot["clip_id"].clone(), slot["is_active"].as_bool().unwrap()))
        .collect();
    assert_eq!(
        flags,
        vec![
            (json!("11"), true),
            (json!("41"), false),
            (json!("42"), false),
        ]
    );

    let (_, json) = send(&app, "GET", "/layers/1/clips").await;
    assert_eq!(json["clips"][0]["is_active"], true);

    let (_, json) = send(&app, "GET", "/layers/7/clips").await;
    assert!(json["clips"]
        .as_array()
        .unwrap()
        .iter()
        .all(|slot| slot["is_active"] == false));
}

#[tokio::test]
async fn test_failed_cycle_keeps_state_and_degrades_health() {
    let stub = scripted_remote();
    let (app, mut scheduler, _) = create_test_app(&stub, 1).await;
    let (_, before) = send(&app, "GET", "/state").await;

    stub.get(
        "/composition/layers/by-id/7",
        StubReply::Text(200, "{truncated".to_string()),
    );
    assert!(!scheduler.run_cycle().await);

    let (status, after) = send(&app, "GET", "/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["layers"], before["layers"]);
    assert_eq!(after["clip_slots"], before["clip_slots"]);
    assert!(after["last_error"].is_string());

    let (_, health) = send(&app, "GET", "/health").await;
    assert_eq!(health["status"], "degraded");
    assert!(health["last_error"].is_string());
}

#[tokio::test]
async fn test_trigger_clip() {
    let stub = scripted_remote();
    let (app, _scheduler, event_bus) = create_test_app(&stub, 1).await;
    let mut events = event_bus.subscribe();

    let (status, _) = send(&app, "POST", "/clips/42/trigger").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(stub.hit_count("POST", "/composition/clips/by-id/42/connect"), 1);
    assert_eq!(events.recv().await.unwrap().event_type(), "ClipTriggered");

    // Unscripted on the remote, so it answers 404
    let (status, json) = send(&app, "POST", "/clips/5/trigger").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "BAD_GATEWAY");
}

#[tokio::test]
async fn test_trigger_refreshes_layers_immediately() {
    let stub = scripted_remote();
    let (app, scheduler, event_bus) = create_test_app(&stub, 0).await;
    let mut events = event_bus.subscribe();
    let task = tokio::spawn(scheduler.run());

    wait_for_event(&mut events, "CycleCompleted").await;
    assert_eq!(stub.hit_count("GET", "/composition/layers/by-id/1"), 1);

    let (status, _) = send(&app, "POST", "/clips/42/trigger").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Poll interval is a minute, so only the refresh can run this cycle
    wait_for_event(&mut events, "CycleCompleted").await;
    assert_eq!(stub.hit_count("GET", "/composition/layers/by-id/1"), 2);

    task.abort();
}

async fn wait_for_event(
    events: &mut tokio::sync::broadcast::Receiver<compmon_common::events::CompmonEvent>,
    event_type: &str,
) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if events.recv().await.unwrap().event_type() == event_type {
                break;
            }
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_discover_is_accepted() {
    let stub = scripted_remote();
    let (app, _scheduler, _) = create_test_app(&stub, 1).await;

    let (status, json) = send(&app, "POST", "/discover").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["scheduled"], true);

    // Already pending: nothing consumes commands in this test
    let (status, json) = send(&app, "POST", "/discover").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["scheduled"], false);
}

#[tokio::test]
async fn test_sse_endpoint_connection() {
    let stub = scripted_remote();
    let (app, _scheduler, _) = create_test_app(&stub, 0).await;

    let response = app
        .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}
