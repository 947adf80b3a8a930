use crate::error::Result;
use crate::model::{CodeResponse, IdResponse};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use tracing::debug;
use wormhole_generator::GeneratedCode;

/// Runs the generator off the async workers: it may sleep while waiting for
/// the clock.
async fn generate(state: &AppState) -> Result<GeneratedCode> {
    let generator = state.generator();
    let generated = tokio::task::spawn_blocking(move || generator.generate()).await??;
    debug!(id = generated.id, code = %generated.short_code, "allocated id");
    Ok(generated)
}

pub async fn new_id_handler(State(state): State<AppState>) -> Result<Json<IdResponse>> {
    let generated = generate(&state).await?;
    Ok(Json(IdResponse { id: generated.id }))
}

pub async fn new_code_handler(State(state): State<AppState>) -> Result<Json<CodeResponse>> {
    let generated = generate(&state).await?;
    Ok(Json(CodeResponse {
        id: generated.id,
        short_code: generated.short_code.to_string(),
    }))
}
