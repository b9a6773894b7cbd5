// rest/routes/users.rs — Account lookup and deletion.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::error::Error;
use crate::rest::{auth::AuthedUser, require_owner};
use crate::AppContext;

pub async fn get_user(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, Error> {
    require_owner(&caller, &id)?;
    let user = ctx.storage.get_user(&id).await?.ok_or(Error::NotFound("user"))?;
    Ok(Json(json!({
        "id": user.id,
        "email": user.email,
        "display_name": user.display_name,
        "role": user.role,
        "created_at": user.created_at,
    })))
}

/// Delete an account. Stats, badges, goals, completions, assessments,
/// feedback, and tokens go with it (FK cascade).
pub async fn delete_user(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, Error> {
    require_owner(&caller, &id)?;
    if !ctx.storage.delete_user(&id).await? {
        return Err(Error::NotFound("user"));
    }
    info!(user_id = %id, "account deleted");
    Ok(Json(json!({ "deleted": true })))
}
