use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{TimeDelta, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use haul_core::testutil::{MockEngine, wait_for_terminal};
use haul_core::JobState;

use crate::integration::common::{
    TEST_ADMIN_TOKEN, TestApp, json_request, setup_test_app, setup_test_app_no_auth,
    setup_test_app_with_engine,
};

const COOKIE_FILE: &str = "# Netscape HTTP Cookie File\n\
.youtube.com\tTRUE\t/\tTRUE\t1999999999\tSID\tabc123\n";

async fn submit(app: &TestApp, url: &str) -> Uuid {
    let (status, json) = app
        .send(json_request(
            "POST",
            "/v1/downloads",
            serde_json::json!({ "url": url }),
        ))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "submit failed: {json}");
    json["job_id"].as_str().unwrap().parse().unwrap()
}

fn admin_put(uri: &str, token: Option<&str>, body: &'static str) -> Request<Body> {
    let mut builder = Request::put(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["downloads_dir"], "ok");
    assert_eq!(json["sweeper_running"], false);
    assert_eq!(json["current_files"], 0);
    assert_eq!(json["retention_hours"], 5);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/v1/downloads"].is_object());
    assert!(json["paths"]["/v1/downloads/{id}/file"].is_object());
}

#[tokio::test]
async fn submit_malformed_url_returns_400() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(json_request(
            "POST",
            "/v1/downloads",
            serde_json::json!({ "url": "not a url" }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");
    assert_eq!(app.state.orchestrator.list_jobs().await.unwrap().len(), 0);
}

#[tokio::test]
async fn submit_unknown_provider_returns_400_when_strict() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(json_request(
            "POST",
            "/v1/downloads",
            serde_json::json!({ "url": "https://example.com/unrelated" }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "unsupported_provider");
}

#[tokio::test]
async fn submit_unknown_provider_accepted_when_lenient() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(json_request(
            "POST",
            "/v1/downloads",
            serde_json::json!({ "url": "https://example.com/clip", "strict": false }),
        ))
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "initiated");
}

#[tokio::test]
async fn submit_unknown_quality_returns_400() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(json_request(
            "POST",
            "/v1/downloads",
            serde_json::json!({ "url": "https://vimeo.com/1", "quality": "8k" }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");
}

#[tokio::test]
async fn submit_poll_and_download() {
    let app = setup_test_app().await;

    let id = submit(&app, "https://www.youtube.com/watch?v=dQw4w9WgXcQ").await;
    let view = wait_for_terminal(&app.state.orchestrator, id).await;
    assert_eq!(view.state, JobState::Completed);

    let (status, json) = app
        .send(
            Request::get(format!("/v1/downloads/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "completed");
    assert_eq!(json["provider"], "youtube");
    assert_eq!(json["title"], "Test Clip");
    assert_eq!(json["duration_secs"], 42);
    assert!(json["error_category"].is_null());

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/v1/downloads/{id}/file"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\""));
    assert!(disposition.contains("Test_Clip.mp4"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"fake media bytes");
}

#[tokio::test]
async fn failed_download_reports_category_and_file_is_not_ready() {
    let app = setup_test_app_with_engine(MockEngine::always_failing("HTTP Error 404: Not Found"))
        .await;

    let id = submit(&app, "https://vimeo.com/76979871").await;
    wait_for_terminal(&app.state.orchestrator, id).await;

    let (status, json) = app
        .send(
            Request::get(format!("/v1/downloads/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "failed");
    assert_eq!(json["error_category"], "VIDEO_NOT_FOUND");
    assert!(json["suggestion"].is_string());
    assert!(json["title"].is_null());
    assert!(json.get("error_detail").is_none());

    let (status, json) = app
        .send(
            Request::get(format!("/v1/downloads/{id}/file"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "not_ready");
}

#[tokio::test]
async fn swept_artifact_returns_410() {
    let app = setup_test_app().await;

    let id = submit(&app, "https://vimeo.com/76979871").await;
    wait_for_terminal(&app.state.orchestrator, id).await;

    let report = app
        .state
        .sweeper
        .sweep_artifacts(Utc::now() + TimeDelta::hours(6))
        .await;
    assert_eq!(report.files_deleted, 1);

    let (status, json) = app
        .send(
            Request::get(format!("/v1/downloads/{id}/file"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(json["error"], "gone");

    let (_, json) = app
        .send(
            Request::get(format!("/v1/downloads/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(json["status"], "cleaned_up");
    assert!(json["filename"].is_null());
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(
            Request::get(format!("/v1/downloads/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn malformed_job_id_returns_400() {
    let app = setup_test_app().await;

    let (status, _) = app
        .send(
            Request::get("/v1/downloads/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_downloads_with_status_filter() {
    let app = setup_test_app().await;

    let first = submit(&app, "https://vimeo.com/1").await;
    let second = submit(&app, "https://vimeo.com/2").await;
    wait_for_terminal(&app.state.orchestrator, first).await;
    wait_for_terminal(&app.state.orchestrator, second).await;

    let (status, json) = app
        .send(Request::get("/v1/downloads").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);

    let (_, json) = app
        .send(
            Request::get("/v1/downloads?status=failed")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(json["total"], 0);

    let (status, json) = app
        .send(
            Request::get("/v1/downloads?status=bogus")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");
}

#[tokio::test]
async fn list_total_counts_all_matches_beyond_limit() {
    let app = setup_test_app().await;

    for n in 1..=3 {
        let id = submit(&app, &format!("https://vimeo.com/{n}")).await;
        wait_for_terminal(&app.state.orchestrator, id).await;
    }

    let (status, json) = app
        .send(
            Request::get("/v1/downloads?status=completed&limit=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["downloads"].as_array().unwrap().len(), 1);
    assert_eq!(json["total"], 3);
}

#[tokio::test]
async fn credential_upload_requires_token() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(admin_put("/v1/credentials/youtube", None, COOKIE_FILE))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");

    let (status, _) = app
        .send(admin_put(
            "/v1/credentials/youtube",
            Some("wrong-token"),
            COOKIE_FILE,
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_admin_token_returns_403() {
    let app = setup_test_app_no_auth().await;

    let (status, json) = app
        .send(admin_put(
            "/v1/credentials/youtube",
            Some("any-token"),
            COOKIE_FILE,
        ))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "forbidden");
}

#[tokio::test]
async fn credential_upload_installs_file() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(admin_put(
            "/v1/credentials/youtube",
            Some(TEST_ADMIN_TOKEN),
            COOKIE_FILE,
        ))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["provider"], "youtube");
    assert_eq!(json["file_name"], "youtube.com_cookies.txt");

    let installed = app.state.orchestrator.credentials().dir().join("youtube.com_cookies.txt");
    assert_eq!(std::fs::read_to_string(installed).unwrap(), COOKIE_FILE);
}

#[tokio::test]
async fn credential_upload_rejects_invalid_content() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(admin_put(
            "/v1/credentials/youtube",
            Some(TEST_ADMIN_TOKEN),
            "# only a comment\n",
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_credential");
}

#[tokio::test]
async fn credential_upload_rejects_unsupported_provider() {
    let app = setup_test_app().await;

    for provider in ["dailymotion", "myspace"] {
        let (status, json) = app
            .send(admin_put(
                &format!("/v1/credentials/{provider}"),
                Some(TEST_ADMIN_TOKEN),
                COOKIE_FILE,
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "provider {provider}");
        assert_eq!(json["error"], "unsupported_provider");
    }
}

#[tokio::test]
async fn cleanup_returns_report() {
    let app = setup_test_app().await;

    let id = submit(&app, "https://vimeo.com/1").await;
    wait_for_terminal(&app.state.orchestrator, id).await;

    let (status, json) = app
        .send(
            Request::post("/v1/cleanup")
                .header("authorization", format!("Bearer {TEST_ADMIN_TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    // Fresh artifact: nothing is old enough to delete.
    assert_eq!(json["files_deleted"], 0);
    assert_eq!(json["errors"], 0);

    let (_, json) = app
        .send(
            Request::get(format!("/v1/downloads/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(json["status"], "completed");
}
