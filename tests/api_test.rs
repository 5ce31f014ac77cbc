//! Integration tests for the HTTP API

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use media_gen_gateway::api::build_router;
use media_gen_gateway::config::Settings;
use media_gen_gateway::events::EventBroadcaster;
use media_gen_gateway::queue::task_queue::TaskQueue;
use media_gen_gateway::resource::ResourceKind;
use media_gen_gateway::version::VersionStore;
use media_gen_gateway::AppState;

struct TestApp {
    _root: TempDir,
    router: Router,
    state: AppState,
}

fn test_app() -> TestApp {
    let root = TempDir::new().unwrap();
    let settings = Arc::new(Settings::default());
    let broadcaster = Arc::new(EventBroadcaster::new(&settings.events));
    let queue = Arc::new(TaskQueue::new(broadcaster.clone()));
    let versions = Arc::new(VersionStore::new(root.path()));

    let state = AppState {
        settings,
        queue,
        versions,
        broadcaster,
    };
    TestApp {
        _root: root,
        router: build_router(state.clone()),
        state,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn create_body() -> Value {
    json!({ "project": "demo", "prompt": "a foggy harbor at dawn" })
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_task_queues_and_returns_id() {
    let app = test_app();

    let (status, body) = send(
        &app.router,
        post_json("/api/v1/tasks/storyboard/E1S01", create_body()),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
    assert_eq!(body["deduped"], false);
    assert!(body.get("existing_task_id").is_none());

    let task_id = body["task_id"].as_str().unwrap();
    let (status, body) = send(&app.router, get(&format!("/api/v1/tasks/{}", task_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["resource_id"], "E1S01");
    assert_eq!(body["task"]["task_type"], "storyboard");
    assert_eq!(body["task"]["source"], "webui");
}

#[tokio::test]
async fn test_duplicate_submission_is_deduped() {
    let app = test_app();

    let (_, first) = send(
        &app.router,
        post_json("/api/v1/tasks/storyboard/E1S01", create_body()),
    )
    .await;
    let (status, second) = send(
        &app.router,
        post_json("/api/v1/tasks/storyboard/E1S01", create_body()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["deduped"], true);
    assert_eq!(second["task_id"], first["task_id"]);
    assert_eq!(second["existing_task_id"], first["task_id"]);
}

#[tokio::test]
async fn test_create_task_validation() {
    let app = test_app();

    // Unknown task type.
    let (status, body) = send(
        &app.router,
        post_json("/api/v1/tasks/hologram/E1S01", create_body()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");

    // Missing prompt.
    let (status, _) = send(
        &app.router,
        post_json("/api/v1/tasks/storyboard/E1S01", json!({ "project": "demo" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Missing project.
    let (status, _) = send(
        &app.router,
        post_json(
            "/api/v1/tasks/storyboard/E1S01",
            json!({ "project": "", "prompt": "p" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_task_is_404() {
    let app = test_app();
    let (status, body) = send(&app.router, get("/api/v1/tasks/no-such-task")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "task_not_found");
}

#[tokio::test]
async fn test_list_tasks_filters_and_pages() {
    let app = test_app();
    for n in 0..3 {
        send(
            &app.router,
            post_json(
                &format!("/api/v1/tasks/storyboard/E1S{:02}", n),
                create_body(),
            ),
        )
        .await;
    }
    send(
        &app.router,
        post_json(
            "/api/v1/tasks/video/E1S00",
            json!({ "project": "other", "prompt": "clip" }),
        ),
    )
    .await;

    let (status, body) = send(&app.router, get("/api/v1/tasks?project=demo")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 50);

    let (_, body) = send(
        &app.router,
        get("/api/v1/tasks?project=demo&page=2&page_size=2"),
    )
    .await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app.router, get("/api/v1/tasks?task_type=video")).await;
    assert_eq!(body["total"], 1);

    let (_, body) = send(&app.router, get("/api/v1/tasks?status=succeeded")).await;
    assert_eq!(body["total"], 0);

    // A page far past the data is empty, never an error.
    let (status, body) = send(
        &app.router,
        get("/api/v1/tasks?page=18446744073709551615&page_size=500"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["items"].as_array().unwrap().len(), 0);

    // Invalid paging and filter values.
    let (status, _) = send(&app.router, get("/api/v1/tasks?page=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app.router, get("/api/v1/tasks?page_size=1000")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app.router, get("/api/v1/tasks?status=exploded")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_scope_by_project() {
    let app = test_app();
    send(
        &app.router,
        post_json("/api/v1/tasks/storyboard/E1S01", create_body()),
    )
    .await;
    send(
        &app.router,
        post_json(
            "/api/v1/tasks/storyboard/E1S01",
            json!({ "project": "other", "prompt": "p" }),
        ),
    )
    .await;

    let (status, body) = send(&app.router, get("/api/v1/tasks/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total"], 2);
    assert_eq!(body["stats"]["queued"], 2);

    let (_, body) = send(&app.router, get("/api/v1/tasks/stats?project=demo")).await;
    assert_eq!(body["stats"]["total"], 1);
}

#[tokio::test]
async fn test_version_history_endpoint() {
    let app = test_app();
    app.state
        .versions
        .add_version(
            "demo",
            ResourceKind::Storyboards,
            "E1S01",
            b"v1",
            "first",
            serde_json::Map::new(),
        )
        .await
        .unwrap();
    app.state
        .versions
        .add_version(
            "demo",
            ResourceKind::Storyboards,
            "E1S01",
            b"v2",
            "second",
            serde_json::Map::new(),
        )
        .await
        .unwrap();

    let (status, body) = send(
        &app.router,
        get("/api/v1/versions/storyboards/E1S01?project=demo"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_version"], 2);
    let versions = body["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["is_current"], false);
    assert_eq!(versions[1]["is_current"], true);
    assert_eq!(versions[1]["prompt"], "second");

    // project is mandatory.
    let (status, _) = send(&app.router, get("/api/v1/versions/storyboards/E1S01")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown resource type.
    let (status, _) = send(
        &app.router,
        get("/api/v1/versions/thumbnails/E1S01?project=demo"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_restore_endpoint() {
    let app = test_app();
    app.state
        .versions
        .add_version(
            "demo",
            ResourceKind::Storyboards,
            "E1S01",
            b"v1",
            "first",
            serde_json::Map::new(),
        )
        .await
        .unwrap();
    app.state
        .versions
        .add_version(
            "demo",
            ResourceKind::Storyboards,
            "E1S01",
            b"v2",
            "second",
            serde_json::Map::new(),
        )
        .await
        .unwrap();

    let (status, body) = send(
        &app.router,
        post_json(
            "/api/v1/versions/storyboards/E1S01/restore/1?project=demo",
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["restored_version"], 1);
    assert_eq!(body["new_current_version"], 3);
    assert_eq!(body["prompt"], "first");
    assert_eq!(body["file_path"], "storyboards/scene_E1S01.png");

    let (status, body) = send(
        &app.router,
        post_json(
            "/api/v1/versions/storyboards/E1S01/restore/99?project=demo",
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "version_not_found");
}
