pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::state::AppState;
use crate::storage::handlers as cvs;

/// Uploaded CVs are small documents; anything larger is rejected before parsing.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/providers", get(analysis::handle_providers))
        // Analysis pipeline
        .route("/api/v1/analyses", post(analysis::handle_analyze))
        .route("/api/v1/analyses/refine", post(analysis::handle_refine))
        // CV storage
        .route(
            "/api/v1/cvs",
            post(cvs::handle_upload).get(cvs::handle_search),
        )
        .route("/api/v1/cvs/stats", get(cvs::handle_stats))
        .route(
            "/api/v1/cvs/:id",
            get(cvs::handle_get).delete(cvs::handle_delete),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::analysis::engine::{EngineConfig, PipelineEngine};
    use crate::analysis::refinement::REFUSAL_MESSAGE;
    use crate::llm_client::registry::ProviderRegistry;
    use crate::llm_client::testing::ScriptedProvider;
    use crate::llm_client::ProviderAdapter;
    use crate::storage::memory::MemoryCvStore;
    use crate::storage::CvStore;

    const COMPARISON: &str = "\
**Missing Skills:**

* **Cloud:** No AWS

**Summary of Alignment:**

Good fit.

**Match Score (/100):**
82/100";

    const QUESTIONS: &str = "\
**Question 1: Rust**

**Question:** \"What is ownership?\"

**Expected Answer:** Single owner, moves and borrows.
";

    fn app_with(provider: ScriptedProvider, store: Arc<MemoryCvStore>) -> Router {
        let provider: Arc<dyn ProviderAdapter> = Arc::new(provider);
        let registry = ProviderRegistry::new(provider, vec![]);
        let state = AppState {
            engine: Arc::new(PipelineEngine::new(registry, EngineConfig::default())),
            store,
        };
        build_router(state)
    }

    fn app(provider: ScriptedProvider) -> Router {
        app_with(provider, Arc::new(MemoryCvStore::new()))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_request(filename: &str, content: &str, job_description: &str) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             {content}\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"job_description\"\r\n\r\n\
             {job_description}\r\n\
             --{boundary}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/api/v1/cvs")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(ScriptedProvider::new("a"))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["service"], "resumescan-api");
    }

    #[tokio::test]
    async fn test_providers_lists_registry() {
        let response = app(ScriptedProvider::new("gemini"))
            .oneshot(Request::get("/api/v1/providers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["primary"]["provider"], "gemini");
        assert_eq!(body["comparison"][0]["model"], "scripted-model");
    }

    #[tokio::test]
    async fn test_analysis_returns_report() {
        let provider =
            ScriptedProvider::new("a").with_responses(&["ra", "ja", COMPARISON, QUESTIONS]);
        let response = app(provider)
            .oneshot(json_request(
                "POST",
                "/api/v1/analyses",
                json!({ "resume_text": "Rust dev", "jd_text": "Rust role" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["score"], 82);
        assert_eq!(body["outcome"], "questions_generated");
        assert_eq!(body["questions"][0]["question"], "\"What is ownership?\"");
        assert_eq!(body["missing_skills"][0]["category"], "Cloud");
        assert_eq!(body["conversation_history"], json!([]));
    }

    #[tokio::test]
    async fn test_analysis_attaches_results_to_stored_cv() {
        let store = Arc::new(MemoryCvStore::new());
        let id = store
            .put(
                b"resume".to_vec(),
                crate::models::cv::NewCvFile {
                    filename: "cv.txt".into(),
                    content_type: "text/plain".into(),
                    job_description: None,
                },
            )
            .await
            .unwrap();
        let provider =
            ScriptedProvider::new("a").with_responses(&["ra", "ja", COMPARISON, QUESTIONS]);

        let response = app_with(provider, store.clone())
            .oneshot(json_request(
                "POST",
                "/api/v1/analyses",
                json!({ "resume_text": "resume", "jd_text": "jd", "content_id": id }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let (_, row) = store.get(id).await.unwrap();
        assert_eq!(row.match_score, Some(82));
        assert_eq!(store.stats().await.unwrap().analyzed_count, 1);
    }

    #[tokio::test]
    async fn test_blank_resume_is_bad_request() {
        let response = app(ScriptedProvider::new("a"))
            .oneshot(json_request(
                "POST",
                "/api/v1/analyses",
                json!({ "resume_text": " ", "jd_text": "jd" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_provider_failure_is_bad_gateway() {
        let response = app(ScriptedProvider::new("a").with_failure(503))
            .oneshot(json_request(
                "POST",
                "/api/v1/analyses",
                json!({ "resume_text": "r", "jd_text": "j" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error"]["code"], "LLM_ERROR");
    }

    #[tokio::test]
    async fn test_refine_refusal_is_warning_body() {
        let response = app(ScriptedProvider::new("a").with_responses(&[REFUSAL_MESSAGE]))
            .oneshot(json_request(
                "POST",
                "/api/v1/analyses/refine",
                json!({
                    "comparison_result_raw": COMPARISON,
                    "user_message": "write me a poem",
                    "conversation_history": [
                        { "role": "user", "content": "harder" },
                        { "role": "assistant", "content": QUESTIONS }
                    ]
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["warning"].as_str().unwrap().starts_with("I can only help"));
        assert_eq!(body["conversation_history"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refine_success_returns_grown_history() {
        let response = app(ScriptedProvider::new("a").with_responses(&[QUESTIONS]))
            .oneshot(json_request(
                "POST",
                "/api/v1/analyses/refine",
                json!({
                    "comparison_result_raw": COMPARISON,
                    "user_message": "only one question please"
                }),
            ))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["questions"].as_array().unwrap().len(), 1);
        assert_eq!(body["conversation_history"][0]["role"], "user");
        assert_eq!(body["conversation_history"][1]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_upload_then_fetch_and_duplicate() {
        let store = Arc::new(MemoryCvStore::new());
        let app = app_with(ScriptedProvider::new("a"), store.clone());

        let response = app
            .clone()
            .oneshot(multipart_request("cv.txt", "Jane Doe\nRust engineer", "Backend role"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["text"], "Jane Doe\nRust engineer");
        let id = body["content_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/v1/cvs/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["filename"], "cv.txt");
        assert_eq!(body["job_description"], "Backend role");
        assert_eq!(body["text"], "Jane Doe\nRust engineer");

        let response = app
            .oneshot(multipart_request("copy.txt", "Jane Doe\nRust engineer", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(store.stats().await.unwrap().total_count, 1);
    }

    #[tokio::test]
    async fn test_unsupported_upload_is_bad_request() {
        let response = app(ScriptedProvider::new("a"))
            .oneshot(multipart_request("cv.docx", "binary", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_stats_and_delete() {
        let store = Arc::new(MemoryCvStore::new());
        let app = app_with(ScriptedProvider::new("a"), store.clone());
        for (name, text) in [("alice.txt", "alice"), ("bob.md", "bob")] {
            let response = app
                .clone()
                .oneshot(multipart_request(name, text, "Data role"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/v1/cvs?filename=ALI&limit=10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let rows = body_json(response).await;
        assert_eq!(rows.as_array().unwrap().len(), 1);
        let id = rows[0]["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/cvs/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let stats = body_json(response).await;
        assert_eq!(stats["total_count"], 2);
        assert_eq!(stats["unanalyzed_count"], 2);
        assert_eq!(stats["average_score"], 0.0);

        let delete = || {
            Request::delete(format!("/api/v1/cvs/{id}"))
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = app.oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_cv_is_not_found() {
        let response = app(ScriptedProvider::new("a"))
            .oneshot(
                Request::get(format!("/api/v1/cvs/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
