//! API routes

pub mod documents;
pub mod query;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Document management
        .route("/documents", get(documents::list_documents))
        .route(
            "/documents",
            post(documents::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/documents/:id", get(documents::get_document))
        .route("/documents/:id", delete(documents::delete_document))
        // Query
        .route("/query", post(query::query))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "corpus-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Per-user document ingestion and retrieval with grounded, cited answers",
        "endpoints": {
            "POST /api/documents": "Upload a document (multipart: user_id, file); ingestion runs asynchronously",
            "GET /api/documents?user_id=": "List a user's documents",
            "GET /api/documents/:id?user_id=": "Ingestion status and failure reason",
            "DELETE /api/documents/:id?user_id=": "Delete a document and its vectors",
            "POST /api/query": "Ask a question over a user's documents"
        }
    }))
}
