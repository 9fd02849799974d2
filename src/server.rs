//! HTTP API for uploads and questions.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/upload` | Multipart upload (`file` part, `.pdf`/`.txt`); indexes then archives |
//! | `POST` | `/query` | `{"question": ...}` → `{"response": ...}` |
//! | `GET`  | `/files/{name}` | Download an archived original |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses use the shape:
//!
//! ```json
//! { "error": { "code": "validation_error", "message": "question must not be empty" } }
//! ```
//!
//! Codes mirror the [`QaError`] taxonomy: `validation_error` (400),
//! `processing_error` (422), `index_read_error` (409 when the index is
//! empty, 500 otherwise), `index_write_error` (500), and
//! `embedding_error` / `llm_error` / `storage_error` (502).
//!
//! All services are constructed once at startup and injected into handlers
//! through [`AppState`] — no ambient globals.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::QaError;
use crate::index::VectorIndex;
use crate::llm::LlmClient;
use crate::memory::ConversationMemory;
use crate::models::Document;
use crate::pipeline;
use crate::storage::S3Storage;
use crate::answer;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub index: Arc<VectorIndex>,
    pub llm: Arc<LlmClient>,
    /// Absent when `[storage]` is not configured; uploads then skip archival.
    pub storage: Option<Arc<S3Storage>>,
    /// One conversation per process; lives until shutdown.
    pub memory: Arc<Mutex<ConversationMemory>>,
}

/// Construct all services and serve until the process is terminated.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let index = VectorIndex::open(&config.db.path, config.embedding.clone()).await?;
    let llm = LlmClient::new(&config.llm).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let storage = match config.storage {
        Some(ref storage_config) => Some(Arc::new(
            S3Storage::new(storage_config).map_err(|e| anyhow::anyhow!(e.to_string()))?,
        )),
        None => {
            warn!("no [storage] configured; uploaded originals will not be archived");
            None
        }
    };

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config),
        index: Arc::new(index),
        llm: Arc::new(llm),
        storage,
        memory: Arc::new(Mutex::new(ConversationMemory::new())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/upload", post(handle_upload))
        .route("/query", post(handle_query))
        .route("/files/{name}", get(handle_get_file))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "validation_error".to_string(),
        message: message.into(),
    }
}

impl From<QaError> for AppError {
    fn from(err: QaError) -> Self {
        let status = match &err {
            QaError::Validation(_) => StatusCode::BAD_REQUEST,
            QaError::Processing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QaError::IndexWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // An empty index is caller-visible state, not a server fault.
            QaError::IndexRead(msg) if msg.contains("empty") => StatusCode::CONFLICT,
            QaError::IndexRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
            QaError::Embedding(_) | QaError::Llm(_) | QaError::Storage(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    document_id: String,
    filename: String,
    chunks: usize,
    archived: bool,
}

/// Indexing and archival are independent stages; a failure in either is
/// reported with its own error code and does not undo the other.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut doc: Option<Document> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(|f| f.to_string())
            .filter(|f| !f.is_empty())
            .ok_or_else(|| bad_request("no file selected"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read file part: {}", e)))?;

        doc = Some(Document::new(filename, bytes.to_vec())?);
        break;
    }

    let doc = doc.ok_or_else(|| bad_request("no file part in the request"))?;

    let summary = pipeline::ingest_document(&state.config, &state.index, &doc).await?;

    let archived = match state.storage {
        Some(ref storage) => {
            pipeline::archive_document(storage, &state.index, &doc, &summary.document_id)
                .await
                .map_err(|e| {
                    error!(document_id = %summary.document_id, %e, "archival failed after indexing");
                    AppError::from(e)
                })?;
            true
        }
        None => false,
    };

    Ok(Json(UploadResponse {
        document_id: summary.document_id,
        filename: summary.filename,
        chunks: summary.chunks,
        archived,
    }))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    question: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    response: String,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let question = request
        .question
        .ok_or_else(|| bad_request("no question provided"))?;

    // The memory lock is held across the LLM call, which serializes
    // concurrent queries — matching the single-conversation model.
    let mut memory = state.memory.lock().await;
    let reply = answer::answer(
        &question,
        &state.index,
        &mut memory,
        &state.llm,
        state.config.retrieval.top_k,
    )
    .await?;

    Ok(Json(QueryResponse { response: reply }))
}

// ============ GET /files/{name} ============

async fn handle_get_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let storage = state.storage.as_ref().ok_or_else(|| AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: "object storage is not configured".to_string(),
    })?;

    let key = storage.object_key(&name);
    let bytes = storage.get(&key).await?.ok_or_else(|| AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: format!("no archived file named '{}'", name),
    })?;

    let content_type = crate::models::DocumentKind::from_filename(&name)
        .map(pipeline::content_type)
        .unwrap_or("application/octet-stream");

    Ok(([("Content-Type", content_type)], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let err: AppError = QaError::validation("bad").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "validation_error");
    }

    #[test]
    fn empty_index_maps_to_409() {
        let err: AppError = QaError::IndexRead("index is empty".to_string()).into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: AppError = QaError::IndexRead("disk gone".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn collaborator_failures_map_to_502() {
        for err in [
            QaError::Llm("rate limited".to_string()),
            QaError::Embedding("down".to_string()),
            QaError::Storage("denied".to_string()),
        ] {
            let app_err: AppError = err.into();
            assert_eq!(app_err.status, StatusCode::BAD_GATEWAY);
        }
    }

    #[test]
    fn processing_maps_to_422() {
        let err: AppError = QaError::processing("corrupt pdf").into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, "processing_error");
    }
}
