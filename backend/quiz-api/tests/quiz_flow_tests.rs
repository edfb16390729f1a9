use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use screening_quiz_api::store::GraphStore;
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_quiz_routes_require_a_token() {
    let app = common::create_test_app().await;

    let (status, body) = app
        .send("GET", "/api/v1/quiz/ping", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app
        .send("GET", "/api/v1/quiz/ping", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_candidate_is_not_found() {
    let app = common::create_test_app().await;
    let token = common::token_for("0xfffff");

    let (status, body) = app
        .send("GET", "/api/v1/quiz/ping", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_full_quiz_flow_ends_with_sentinel() {
    let app = common::create_test_app().await;

    let (status, ping) = app
        .send("GET", "/api/v1/quiz/ping", Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ping["quiz_started"], false);

    let mut delivered = 0;
    loop {
        let (status, q) = app.next_question(false).await;
        assert_eq!(status, StatusCode::OK, "unexpected body {}", q);
        if q["uid"] == "END" {
            assert_eq!(q["score"], 15.0);
            break;
        }
        delivered += 1;
        assert_eq!(q["idx"], delivered);
        assert_eq!(q["num_qns"], 3);

        let uid = q["uid"].as_str().unwrap();
        let cuid = q["cuid"].as_str().unwrap();

        let (status, again) = app.next_question(true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["cuid"], cuid);

        let (status, res) = app.answer(cuid, &app.correct_options(uid)).await;
        assert_eq!(status, StatusCode::OK, "unexpected body {}", res);
        assert_eq!(res["correct"], true);
    }
    assert_eq!(delivered, 3);

    let candidate = app
        .store
        .node(app.seeded.candidate("demo"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(candidate.literal("complete"), Some("true"));
    assert_eq!(candidate.edges("candidate.question").len(), 3);

    let (status, ping) = app
        .send("GET", "/api/v1/quiz/ping", Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ping["completed"], true);
}

#[tokio::test]
async fn test_answer_errors_use_the_error_envelope() {
    let app = common::create_test_app().await;
    let (_, q) = app.next_question(false).await;
    let cuid = q["cuid"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/quiz/answer",
            Some(&app.token),
            Some("{not json".to_string()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "malformed_request");
    assert_eq!(body["status"], 400);

    let (status, body) = app.answer("", &[]).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failure");

    let (status, _) = app.answer(&cuid, &[]).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.answer(&cuid, &[]).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failure");
}

#[tokio::test]
async fn test_store_outage_is_reported_and_retryable() {
    let app = common::create_test_app().await;

    app.store.set_fail_mutations(true);
    let (status, body) = app.next_question(false).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "store_failure");

    app.store.set_fail_mutations(false);
    let (status, q) = app.next_question(false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(q["idx"], 1);
}

#[tokio::test]
async fn test_health_reports_store_backend() {
    let app = common::create_test_app().await;

    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dependencies"]["store"]["backend"], "memory");
}

#[tokio::test]
async fn test_metrics_require_basic_auth() {
    let app = common::create_test_app().await;

    let (status, _) = app.send("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_trace_id_is_echoed() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-trace-id", "trace-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-trace-id"], "trace-123");

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-trace-id"));
}
