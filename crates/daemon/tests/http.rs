mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::*;
use moviemanager::api;

async fn call(app: axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
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

#[tokio::test]
async fn test_health() {
    let h = Harness::new(FakeServices::default());
    let (status, body) = call(api::app(h.pipeline.clone()), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_process_movie_over_http() {
    let services = FakeServices {
        scripts: scripts([
            ("c1", ChunkScript::with_content("c1", 1)),
            ("c2", ChunkScript::with_content("c2", 1)),
        ]),
        final_response: answers(&["a detective story"]).into(),
        ..Default::default()
    };
    let h = Harness::new(services);
    let folder = h.folder(&["c1", "c2"]);

    let (status, body) = call(
        api::app(h.pipeline.clone()),
        post(
            "/api/movies",
            serde_json::json!({"title": "pilot", "custom_prompts": ["genre?"], "custom_retrievals": []}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_i64().unwrap();

    let (status, body) = call(
        api::app(h.pipeline.clone()),
        post(
            "/api/moviemanager",
            serde_json::json!({"movie_id": id, "folder_path": folder, "init": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETE");
    assert_eq!(body["answers"][0]["prompt"], "genre?");
    assert_eq!(body["answers"][0]["answer"], "a detective story");

    let (status, body) = call(api::app(h.pipeline.clone()), get(&format!("/api/movies/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "complete");
    assert_eq!(body["failed"], false);
    assert_eq!(body["summary_count"], 3);

    let (status, body) = call(
        api::app(h.pipeline.clone()),
        get(&format!("/api/movies/{}/summaries", id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["summary_text"], "summary of c1");
}

#[tokio::test]
async fn test_error_status_codes() {
    let h = Harness::new(FakeServices::default());
    let id = h.movie(&[], &[]);

    let (status, body) = call(
        api::app(h.pipeline.clone()),
        post(
            "/api/moviemanager",
            serde_json::json!({"movie_id": id, "folder_path": "/a", "video_path": "/b.mp4"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = call(
        api::app(h.pipeline.clone()),
        post(
            "/api/moviemanager",
            serde_json::json!({"movie_id": id + 1, "video_path": "/b.mp4"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The fake probe reports a zero duration.
    let (status, body) = call(
        api::app(h.pipeline.clone()),
        post("/api/moviemanager", serde_json::json!({"movie_id": id, "video_path": "/b.mp4"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("duration probe failed"));
}
