// rest/routes/scenarios.rs — Scenario catalog and completion.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Error;
use crate::rest::{auth::AuthedUser, require_admin};
use crate::storage::ScenarioRow;
use crate::AppContext;

fn scenario_json(s: &ScenarioRow) -> Value {
    json!({
        "id": s.id,
        "title": s.title,
        "description": s.description,
        "category": s.category,
        "difficulty": s.difficulty,
        "xp_reward": s.xp_reward,
        "created_at": s.created_at,
    })
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
}

pub async fn list_scenarios(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, Error> {
    let scenarios = ctx.storage.list_scenarios(query.category.as_deref()).await?;
    let list: Vec<Value> = scenarios.iter().map(scenario_json).collect();
    Ok(Json(json!({ "scenarios": list })))
}

pub async fn get_scenario(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, Error> {
    let scenario = ctx
        .storage
        .get_scenario(&id)
        .await?
        .ok_or(Error::NotFound("scenario"))?;
    Ok(Json(scenario_json(&scenario)))
}

#[derive(Deserialize)]
pub struct CreateScenarioRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Option<String>,
    pub xp_reward: Option<i64>,
}

pub async fn create_scenario(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Json(body): Json<CreateScenarioRequest>,
) -> Result<Json<Value>, Response> {
    require_admin(&caller)?;
    if body.title.trim().is_empty() {
        return Err(Error::invalid("scenario title must not be empty").into_response());
    }
    if body.xp_reward.is_some_and(|xp| xp < 0) {
        return Err(Error::invalid("xp_reward must be non-negative").into_response());
    }
    let scenario = ctx
        .storage
        .create_scenario(
            body.title.trim(),
            body.description.trim(),
            body.category.trim(),
            body.difficulty.as_deref().unwrap_or("medium"),
            body.xp_reward,
        )
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(scenario_json(&scenario)))
}

/// Complete a scenario as the calling user: records the completion and runs
/// the full gamification update (XP, level, streak, badges) in one award.
pub async fn complete_scenario(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, Error> {
    let stats = ctx.gamification.complete_scenario(&caller.id, &id).await?;
    Ok(Json(json!({ "stats": stats })))
}
