//! Achievement read and on-demand reconciliation

use axum::{extract::State, Json};

use super::identity::CurrentUser;
use crate::error::ApiResult;
use crate::reconciler::{AchievementView, ReconcileOutcome};
use crate::AppState;

/// GET /api/achievements
///
/// Earned records from the ledger plus freshly computed progress for every
/// badge. Read-only: nothing is awarded here.
pub async fn get_achievements(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<AchievementView>> {
    Ok(Json(state.reconciler.view(&user_id).await?))
}

/// POST /api/achievements/reconcile
pub async fn reconcile_now(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<ReconcileOutcome>> {
    Ok(Json(state.reconciler.reconcile(&user_id).await?))
}
