use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::TimeDelta;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use screening_quiz_api::{
    config::{Config, StoreBackend},
    create_router,
    middlewares::auth::JwtService,
    services::{notification_service::LogNotifier, AppState},
    store::{
        seed::{QuizSeed, SeededQuiz},
        MemoryGraph,
    },
};

pub const JWT_SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryGraph>,
    pub seeded: SeededQuiz,
    pub token: String,
}

pub fn test_config() -> Config {
    Config {
        store_backend: StoreBackend::Memory,
        mongo_uri: "mongodb://localhost:27017".to_string(),
        mongo_database: "screening_test".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        quiz_duration_minutes: 60,
        default_threshold: -100.0,
        public_url: "http://localhost:2020".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        seed_file: None,
        smtp: None,
    }
}

pub fn token_for(candidate_id: &str) -> String {
    JwtService::new(JWT_SECRET)
        .generate_token(candidate_id, TimeDelta::hours(1))
        .unwrap()
}

pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemoryGraph::new());
    let seeded = QuizSeed::demo().apply(store.as_ref()).await.unwrap();
    let token = token_for(seeded.candidate("demo"));

    let app_state = Arc::new(AppState::with_store(
        test_config(),
        store.clone(),
        Arc::new(LogNotifier),
    ));

    TestApp {
        router: create_router(app_state),
        store,
        seeded,
        token,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn next_question(&self, repeat: bool) -> (StatusCode, Value) {
        let body = serde_json::json!({ "repeat": repeat }).to_string();
        self.send("POST", "/api/v1/quiz/question", Some(&self.token), Some(body))
            .await
    }

    pub async fn answer(&self, cuid: &str, option_ids: &[String]) -> (StatusCode, Value) {
        let body = serde_json::json!({ "cuid": cuid, "option_ids": option_ids }).to_string();
        self.send("POST", "/api/v1/quiz/answer", Some(&self.token), Some(body))
            .await
    }

    /// Option uids that answer the demo question correctly.
    pub fn correct_options(&self, question_uid: &str) -> Vec<String> {
        let key = self
            .seeded
            .questions
            .iter()
            .find(|(_, uid)| uid.as_str() == question_uid)
            .map(|(key, _)| key.as_str())
            .unwrap();
        let names: &[&str] = match key {
            "capital" => &["Paris"],
            "google" => &["Go programming language", "Angular"],
            _ => &["Pacific"],
        };
        names
            .iter()
            .map(|name| self.seeded.option(key, name).to_string())
            .collect()
    }
}
