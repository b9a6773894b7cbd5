// rest/routes/stats.rs — Gamification state: stats view and admin recompute.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rest::{auth::AuthedUser, require_admin, require_owner};
use crate::AppContext;

/// Current stats: XP, derived level + progress-within-level, streak, badges.
pub async fn get_stats(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, crate::error::Error> {
    require_owner(&caller, &id)?;
    let stats = ctx.gamification.stats(&id).await?;
    Ok(Json(json!({ "stats": stats })))
}

/// Administrative cleanup: recompute the badge set from scratch and replace
/// the stored one — purges badges dropped or renamed in the catalog. Not a
/// variant of the award path.
pub async fn recompute_badges(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, Response> {
    require_admin(&caller)?;
    let badges = ctx
        .gamification
        .recompute_badges(&id)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(json!({ "badges": badges })))
}
