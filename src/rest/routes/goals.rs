// rest/routes/goals.rs — User-defined goal CRUD.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Error;
use crate::rest::{auth::AuthedUser, require_owner};
use crate::storage::GoalRow;
use crate::AppContext;

fn goal_json(g: &GoalRow) -> Value {
    json!({
        "id": g.id,
        "user_id": g.user_id,
        "title": g.title,
        "target": g.target,
        "progress": g.progress,
        "deadline": g.deadline,
        "completed": g.completed,
        "created_at": g.created_at,
        "updated_at": g.updated_at,
    })
}

pub async fn list_goals(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, Error> {
    require_owner(&caller, &id)?;
    let goals = ctx.goals.list(&id).await?;
    let list: Vec<Value> = goals.iter().map(goal_json).collect();
    Ok(Json(json!({ "goals": list })))
}

#[derive(Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    pub target: f64,
    /// Optional deadline, RFC-3339 or plain date.
    pub deadline: Option<String>,
}

pub async fn create_goal(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path(id): Path<String>,
    Json(body): Json<CreateGoalRequest>,
) -> Result<Json<Value>, Error> {
    require_owner(&caller, &id)?;
    let goal = ctx
        .goals
        .create(&id, &body.title, body.target, body.deadline.as_deref())
        .await?;
    Ok(Json(goal_json(&goal)))
}

#[derive(Deserialize, Default)]
pub struct UpdateProgressRequest {
    /// Amount to add to progress; defaults to 1.
    pub increment: Option<f64>,
}

pub async fn update_progress(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path((id, goal_id)): Path<(String, String)>,
    body: Option<Json<UpdateProgressRequest>>,
) -> Result<Json<Value>, Error> {
    require_owner(&caller, &id)?;
    let increment = body.and_then(|Json(b)| b.increment);
    let goal = ctx.goals.update_progress(&id, &goal_id, increment).await?;
    Ok(Json(goal_json(&goal)))
}

pub async fn delete_goal(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path((id, goal_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error> {
    require_owner(&caller, &id)?;
    ctx.goals.delete(&id, &goal_id).await?;
    Ok(Json(json!({ "deleted": true })))
}
