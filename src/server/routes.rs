//! Axum route handlers for the well-scenario HTTP server.
//!
//! # Routes
//!
//! - `GET  /health`                             - liveness probe
//! - `GET  /api/profiles`                       - profile file names
//! - `GET  /api/profile/:filename`              - one profile file
//! - `GET  /api/metrics`                        - loaded metric catalog
//! - `POST /api/generate-scenario`              - run the pipeline and save the result
//! - `GET  /api/outputs`                        - saved runs, newest first
//! - `GET  /api/output/:filename`               - one saved run
//! - `GET  /api/output/:filename/download`      - saved run as an attachment
//! - `GET  /api/output/:filename/csv`           - saved run as CSV
//! - `POST /api/output/:filename/annotations`   - save human annotations

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::metrics::MetricKind;
use crate::pipeline::{GenerationRequest, Pipeline};
use crate::scenario::synthesizer::DEFAULT_TARGET_COUNT;
use crate::storage::{to_csv, HumanEdits, OutputStore, ProfileStore, RunMetadata, RunRecord};
use crate::utilities::config::Settings;
use crate::utilities::errors::StorageError;

type ApiError = (StatusCode, Json<Value>);

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub profiles: ProfileStore,
    pub outputs: OutputStore,
    /// Whether persona instructions are sanitized; recorded in run metadata.
    pub sanitize_mode: bool,
}

impl AppState {
    pub fn new(pipeline: Pipeline, profiles: ProfileStore, outputs: OutputStore, sanitize_mode: bool) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            profiles,
            outputs,
            sanitize_mode,
        }
    }

    /// Build the pipeline and stores from settings.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let pipeline = Pipeline::from_settings(settings)?;
        let profiles = ProfileStore::new(&settings.profiles_dir);
        let outputs = OutputStore::new(&settings.outputs_dir)?;
        Ok(Self::new(pipeline, profiles, outputs, settings.sanitize_mode))
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/profiles", get(list_profiles_handler))
        .route("/api/profile/:filename", get(get_profile_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/generate-scenario", post(generate_handler))
        .route("/api/outputs", get(list_outputs_handler))
        .route("/api/output/:filename", get(get_output_handler))
        .route("/api/output/:filename/download", get(download_output_handler))
        .route("/api/output/:filename/csv", get(csv_output_handler))
        .route("/api/output/:filename/annotations", post(save_annotations_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({"error": message.into()})))
}

fn storage_error(e: StorageError) -> ApiError {
    let status = match e {
        StorageError::NotFound { .. } => StatusCode::NOT_FOUND,
        StorageError::InvalidName { .. } => StatusCode::BAD_REQUEST,
        StorageError::Io(_) | StorageError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error(status, e.to_string())
}

/// Run synchronous store I/O on the blocking pool.
async fn blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result.map_err(storage_error),
        Err(e) => {
            log::error!("Storage task failed: {}", e);
            Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Storage task failed"))
        }
    }
}

/// `Content-Disposition` for a UTF-8 file name.
fn attachment(filename: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

/// GET /health - liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "well-scenario",
    }))
}

// ---------------------------------------------------------------------------
// Profiles and metrics
// ---------------------------------------------------------------------------

/// GET /api/profiles
async fn list_profiles_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let profiles = state.profiles.clone();
    let names = blocking(move || profiles.list()).await?;
    let profiles: Vec<Value> = names.iter().map(|name| json!({"name": name})).collect();
    Ok(Json(json!({ "profiles": profiles })))
}

/// GET /api/profile/:filename
async fn get_profile_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let profiles = state.profiles.clone();
    let profile = blocking(move || profiles.load_raw(&filename)).await?;
    Ok(Json(json!({ "profile": profile })))
}

/// GET /api/metrics
async fn metrics_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let catalog = state.pipeline.catalog();
    if catalog.is_empty() {
        return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Metric definitions are not loaded"));
    }
    Ok(Json(json!({ "metrics": catalog.as_ref() })))
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Body of `POST /api/generate-scenario`.
#[derive(Debug, Deserialize)]
struct GenerateScenarioBody {
    #[serde(default)]
    meeting_purpose: String,
    #[serde(default)]
    meeting_format: String,
    #[serde(default)]
    profile_filename: String,
    #[serde(default)]
    num_utterances: Option<usize>,
    #[serde(default)]
    focus_metrics: Option<Vec<String>>,
    #[serde(default)]
    target_ratio: Option<i64>,
}

/// POST /api/generate-scenario - synthesize, annotate and save one run.
async fn generate_handler(
    State(state): State<AppState>,
    Json(body): Json<GenerateScenarioBody>,
) -> Result<Json<Value>, ApiError> {
    if body.meeting_purpose.trim().is_empty() || body.meeting_format.trim().is_empty() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "meeting_purpose and meeting_format are required",
        ));
    }
    if body.profile_filename.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "profile_filename is required"));
    }

    let focus_metrics = body
        .focus_metrics
        .as_ref()
        .map(|names| {
            names
                .iter()
                .map(|name| name.parse::<MetricKind>())
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()
        .map_err(|e| error(StatusCode::BAD_REQUEST, e))?;

    let profiles = state.profiles.clone();
    let profile_filename = body.profile_filename.clone();
    let personas = blocking(move || profiles.load(&profile_filename)).await?;

    let request = GenerationRequest {
        personas,
        purpose: body.meeting_purpose.clone(),
        format: body.meeting_format.clone(),
        target_count: body.num_utterances.unwrap_or(DEFAULT_TARGET_COUNT),
        focus_metrics,
        // Out-of-range values are clamped by the synthesizer.
        target_ratio: body.target_ratio.map(|r| r.clamp(0, 100) as u8),
    };

    let output = state.pipeline.run(&request).await.map_err(|e| {
        log::error!("Scenario generation failed: {}", e);
        error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let metadata = RunMetadata {
        generated_at: Local::now().to_rfc3339(),
        meeting_purpose: body.meeting_purpose.clone(),
        meeting_format: body.meeting_format.clone(),
        num_utterances: output.annotated.len(),
        profile_filename: body.profile_filename.clone(),
        scenario_model: state.pipeline.scenario_model().to_string(),
        annotation_model: state.pipeline.annotation_model().to_string(),
        sanitize_mode: state.sanitize_mode,
        last_human_annotation: None,
        extra: Default::default(),
    };
    let record = RunRecord::new(metadata, output.annotated.clone());
    let outputs = state.outputs.clone();
    let profile_filename = body.profile_filename.clone();
    let saved_to = blocking(move || outputs.save(&record, &profile_filename)).await?;

    Ok(Json(json!({
        "success": true,
        "scenario": output.annotated,
        "metadata": {
            "meeting_purpose": body.meeting_purpose,
            "meeting_format": body.meeting_format,
            "num_utterances": output.annotated.len(),
            "profile_filename": body.profile_filename,
            "saved_to": saved_to,
        },
    })))
}

// ---------------------------------------------------------------------------
// Saved outputs
// ---------------------------------------------------------------------------

/// GET /api/outputs
async fn list_outputs_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let store = state.outputs.clone();
    let outputs = blocking(move || store.list()).await?;
    Ok(Json(json!({ "outputs": outputs })))
}

/// GET /api/output/:filename
async fn get_output_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<RunRecord>, ApiError> {
    let outputs = state.outputs.clone();
    let record = blocking(move || outputs.load(&filename)).await?;
    Ok(Json(record))
}

/// GET /api/output/:filename/download
async fn download_output_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let outputs = state.outputs.clone();
    let name = filename.clone();
    let bytes = blocking(move || Ok(std::fs::read(outputs.path_of(&name)?)?)).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&filename)),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/output/:filename/csv
async fn csv_output_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let outputs = state.outputs.clone();
    let name = filename.clone();
    let record = blocking(move || outputs.load(&name)).await?;
    let stem = filename.strip_suffix(".json").unwrap_or(&filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&format!("{}.csv", stem))),
        ],
        to_csv(&record),
    )
        .into_response())
}

/// Body of `POST /api/output/:filename/annotations`.
#[derive(Debug, Deserialize)]
struct AnnotationsBody {
    #[serde(default)]
    annotations: HumanEdits,
}

/// POST /api/output/:filename/annotations
async fn save_annotations_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Json(body): Json<AnnotationsBody>,
) -> Result<Json<Value>, ApiError> {
    let outputs = state.outputs.clone();
    let name = filename.clone();
    blocking(move || outputs.save_human_annotations(&name, &body.annotations)).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Human annotations saved",
        "saved_to": filename,
    })))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::annotation::MetricAnnotator;
    use crate::persona::PersonaFormatter;
    use crate::scenario::ScenarioSynthesizer;
    use crate::testing::{sample_catalog, scores_reply, utterance_list, ScriptedLLM, SAMPLE_PROFILES_JSON};

    struct Fixture {
        _dir: tempfile::TempDir,
        state: AppState,
        scenario_llm: Arc<ScriptedLLM>,
    }

    fn fixture(scenario_replies: usize, annotation_replies: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let profiles_dir = dir.path().join("profiles");
        std::fs::create_dir(&profiles_dir).unwrap();
        std::fs::write(profiles_dir.join("status_report.json"), SAMPLE_PROFILES_JSON).unwrap();

        let reply = json!({"scenario": utterance_list(2)}).to_string();
        let scenario_llm = ScriptedLLM::repeating(&reply, scenario_replies);
        let annotation_llm = ScriptedLLM::repeating(&scores_reply(8, 1, 0, 2), annotation_replies);
        let catalog = sample_catalog();
        let pipeline = Pipeline::new(
            ScenarioSynthesizer::new(scenario_llm.clone(), catalog.clone(), PersonaFormatter::default()),
            MetricAnnotator::new(annotation_llm, catalog).unwrap(),
        );
        let state = AppState::new(
            pipeline,
            ProfileStore::new(profiles_dir),
            OutputStore::new(dir.path().join("outputs")).unwrap(),
            true,
        );
        Fixture {
            _dir: dir,
            state,
            scenario_llm,
        }
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        (status, body.to_vec())
    }

    async fn get_json(state: &AppState, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = send(state, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_json(state: &AppState, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body) = send(state, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn generate_body() -> Value {
        json!({
            "meeting_purpose": "status report",
            "meeting_format": "progress meeting",
            "profile_filename": "status_report.json",
            "num_utterances": 2,
            "focus_metrics": ["deviation"],
            "target_ratio": 70
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let fx = fixture(0, 0);
        let (status, json) = get_json(&fx.state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::VERSION);
        assert_eq!(json["service"], "well-scenario");
    }

    #[tokio::test]
    async fn test_profiles_endpoints() {
        let fx = fixture(0, 0);
        let (status, json) = get_json(&fx.state, "/api/profiles").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["profiles"][0]["name"], "status_report.json");

        let (status, json) = get_json(&fx.state, "/api/profile/status_report.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["profile"][0]["id"], "前田課長");

        let (status, _) = get_json(&fx.state, "/api/profile/missing.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let fx = fixture(0, 0);
        let (status, json) = get_json(&fx.state, "/api/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["metrics"]["coercion"]["name"], "威圧度");
    }

    #[tokio::test]
    async fn test_generate_validation_errors() {
        let fx = fixture(0, 0);

        let mut body = generate_body();
        body["meeting_purpose"] = json!("");
        let (status, _) = post_json(&fx.state, "/api/generate-scenario", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut body = generate_body();
        body["profile_filename"] = json!("");
        let (status, _) = post_json(&fx.state, "/api/generate-scenario", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut body = generate_body();
        body["focus_metrics"] = json!(["toxicity"]);
        let (status, json) = post_json(&fx.state, "/api/generate-scenario", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("toxicity"));

        let mut body = generate_body();
        body["profile_filename"] = json!("missing.json");
        let (status, _) = post_json(&fx.state, "/api/generate-scenario", body).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert!(fx.scenario_llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_generate_pipeline_failure_is_500() {
        // No scripted replies: the scenario call fails.
        let fx = fixture(0, 0);
        let (status, json) = post_json(&fx.state, "/api/generate-scenario", generate_body()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("Generative service call failed"));
    }

    #[tokio::test]
    async fn test_generate_then_review_flow() {
        let fx = fixture(1, 2);
        let (status, json) = post_json(&fx.state, "/api/generate-scenario", generate_body()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["scenario"].as_array().unwrap().len(), 2);
        assert_eq!(json["scenario"][0]["metrics"]["coercion"]["score"], 8);
        let saved_to = json["metadata"]["saved_to"].as_str().unwrap().to_string();
        assert!(saved_to.ends_with("_status_report.json"));
        assert!(fx.scenario_llm.requests()[0].user.contains("70"));

        let (status, json) = get_json(&fx.state, "/api/outputs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outputs"][0]["filename"], saved_to.as_str());
        assert_eq!(json["outputs"][0]["num_utterances"], 2);

        let (status, json) = get_json(&fx.state, &format!("/api/output/{}", saved_to)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["metadata"]["sanitize_mode"], true);
        assert_eq!(json["metadata"]["scenario_model"], "scripted");

        let (status, json) = post_json(
            &fx.state,
            &format!("/api/output/{}/annotations", saved_to),
            json!({"annotations": {"1": {"bias": {"score": 5, "note": "one-sided"}}}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let request = Request::builder()
            .uri(format!("/api/output/{}/csv", saved_to))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&fx.state, request).await;
        assert_eq!(status, StatusCode::OK);
        let csv = String::from_utf8(body).unwrap();
        let lines: Vec<&str> = csv.trim_start_matches('\u{feff}').split("\r\n").collect();
        assert_eq!(lines[0], "Speaker,Content,威圧度,逸脱度,発言無効度,偏り度");
        assert_eq!(lines[2], "田中,発言2,,,,5");
    }

    #[tokio::test]
    async fn test_download_sets_attachment_headers() {
        let fx = fixture(1, 2);
        let (_, json) = post_json(&fx.state, "/api/generate-scenario", generate_body()).await;
        let saved_to = json["metadata"]["saved_to"].as_str().unwrap().to_string();

        let request = Request::builder()
            .uri(format!("/api/output/{}/download", saved_to))
            .body(Body::empty())
            .unwrap();
        let response = app_router(fx.state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename*=UTF-8''"));
        assert!(disposition.ends_with("_status_report.json"));
    }

    #[tokio::test]
    async fn test_blocking_maps_store_errors() {
        assert_eq!(blocking(|| Ok(3)).await.unwrap(), 3);

        let (status, Json(body)) = blocking(|| -> Result<(), StorageError> {
            Err(StorageError::NotFound {
                name: "gone.json".to_string(),
            })
        })
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("gone.json"));

        let (status, _) = blocking(|| -> Result<(), StorageError> { panic!("store crashed") })
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_missing_output_is_404() {
        let fx = fixture(0, 0);
        let (status, _) = get_json(&fx.state, "/api/output/nope.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = post_json(&fx.state, "/api/output/nope.json/annotations", json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
