//! Query endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse};

/// POST /api/query - answer a question grounded in the user's documents.
///
/// "No grounding found" is a successful response with `grounded` false
/// and an empty citation list, not an error.
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();
    tracing::info!("query from {}: \"{}\"", request.user_id, request.question);

    let k = request.top_k.unwrap_or(state.config().retrieval.top_k);
    let max_context_chars = request
        .max_context_chars
        .unwrap_or(state.config().llm.max_context_chars);

    let retrieved = state
        .retriever()
        .retrieve(
            &request.user_id,
            &request.question,
            k,
            request.document_filter.as_deref(),
        )
        .await?;

    let answer = state
        .composer()
        .compose(&request.question, &retrieved, max_context_chars)
        .await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "query answered in {}ms ({} citations, grounded: {})",
        processing_time_ms,
        answer.citations.len(),
        answer.grounded
    );

    Ok(Json(QueryResponse {
        answer: answer.answer,
        citations: answer.citations,
        grounded: answer.grounded,
        processing_time_ms,
    }))
}
