//! Document upload, status, listing, and deletion

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::pipeline::IngestJob;
use crate::server::state::AppState;
use crate::types::{
    response::DocumentListResponse, Document, DocumentStatusResponse, MediaType, UploadResponse,
};

/// User scope for document operations, passed as a query parameter
#[derive(Debug, Deserialize)]
pub struct UserScope {
    pub user_id: String,
}

/// POST /api/documents - accept a file for asynchronous ingestion.
///
/// Returns immediately with the document id in `pending` state; poll
/// the status endpoint to watch ingestion progress.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut user_id: Option<String> = None;
    let mut file: Option<(String, Option<String>, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Config(format!("invalid multipart payload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "user_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::Config(format!("invalid user_id field: {}", e)))?;
                user_id = Some(value);
            }
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(|m| m.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::Config(format!("could not read file field: {}", e)))?;
                file = Some((filename, content_type, data));
            }
            _ => {}
        }
    }

    let user_id = user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::Config("missing user_id field".to_string()))?;
    let (filename, content_type, data) =
        file.ok_or_else(|| Error::Config("missing file field".to_string()))?;
    if data.is_empty() {
        return Err(Error::Config("uploaded file is empty".to_string()));
    }

    let media_type = MediaType::detect(content_type.as_deref(), &filename);
    if !media_type.is_supported() {
        return Err(Error::UnsupportedFormat(format!(
            "'{}' ({})",
            filename,
            content_type.as_deref().unwrap_or("no declared type")
        )));
    }

    let document = Document::new(user_id, filename, media_type);
    state.registry().create(document.clone())?;
    state
        .submit(IngestJob {
            document: document.clone(),
            data,
        })
        .await?;

    tracing::info!(
        "accepted document {} ({}) for user {}",
        document.id,
        document.filename,
        document.user_id
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            document_id: document.id,
            status: document.status,
        }),
    ))
}

/// GET /api/documents/:id - ingestion status and failure reason
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(scope): Query<UserScope>,
) -> Result<Json<DocumentStatusResponse>> {
    let document = state
        .registry()
        .get(&scope.user_id, &id)
        .ok_or(Error::DocumentNotFound(id))?;
    Ok(Json(DocumentStatusResponse::from(&document)))
}

/// GET /api/documents - list a user's documents
pub async fn list_documents(
    State(state): State<AppState>,
    Query(scope): Query<UserScope>,
) -> Json<DocumentListResponse> {
    let mut documents = state.registry().list(&scope.user_id);
    documents.sort_by_key(|d| d.created_at);

    let documents: Vec<DocumentStatusResponse> =
        documents.iter().map(DocumentStatusResponse::from).collect();
    Json(DocumentListResponse {
        total_count: documents.len(),
        documents,
    })
}

/// DELETE /api/documents/:id - delete a document and its vectors
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(scope): Query<UserScope>,
) -> Result<StatusCode> {
    state.pipeline().delete(&scope.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
