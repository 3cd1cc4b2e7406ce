use axum::{
    extract::{Path, State},
    response::Json,
};

use super::{ApiResponse, AppState};
use crate::models::SourceKind;
use crate::sync::{ClassOutcome, CoordinatorReport};
use crate::utils::error::AppError;

/// Runs every source class. Class failures are reported in the body; an empty
/// catalog or source list fails the request before any class starts.
pub async fn trigger_sync(State(state): State<AppState>) -> Result<Json<ApiResponse<CoordinatorReport>>, AppError> {
    tracing::info!("Sync triggered for all source classes");
    let report = state.coordinator.run_all().await?;

    tracing::info!(
        total_listings = report.total_listings(),
        errors = report.errors.len(),
        "Sync finished"
    );
    Ok(Json(ApiResponse::success(report)))
}

pub async fn trigger_class_sync(
    State(state): State<AppState>,
    Path(class): Path<String>,
) -> Result<Json<ApiResponse<ClassOutcome>>, AppError> {
    let kind = SourceKind::parse(&class).ok_or_else(|| AppError::NotFound {
        resource: format!("Source class '{}'", class),
    })?;

    tracing::info!(class = %kind, "Sync triggered for one source class");
    let report = state.coordinator.run_class(kind).await?;
    Ok(Json(ApiResponse::success(ClassOutcome::from(report))))
}
