// rest/routes/feedback.rs — Peer feedback on scenarios.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Error;
use crate::rest::auth::AuthedUser;
use crate::storage::FeedbackRow;
use crate::AppContext;

fn feedback_json(f: &FeedbackRow) -> Value {
    json!({
        "id": f.id,
        "scenario_id": f.scenario_id,
        "author_id": f.author_id,
        "body": f.body,
        "rating": f.rating,
        "created_at": f.created_at,
    })
}

#[derive(Deserialize)]
pub struct CreateFeedbackRequest {
    pub body: String,
    pub rating: i64,
}

pub async fn create_feedback(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path(scenario_id): Path<String>,
    Json(body): Json<CreateFeedbackRequest>,
) -> Result<Json<Value>, Error> {
    if body.body.trim().is_empty() {
        return Err(Error::invalid("feedback body must not be empty"));
    }
    if !(1..=5).contains(&body.rating) {
        return Err(Error::invalid(format!(
            "rating must be between 1 and 5, got {}",
            body.rating
        )));
    }
    ctx.storage
        .get_scenario(&scenario_id)
        .await?
        .ok_or(Error::NotFound("scenario"))?;

    let feedback = ctx
        .storage
        .create_feedback(&scenario_id, &caller.id, body.body.trim(), body.rating)
        .await?;
    Ok(Json(feedback_json(&feedback)))
}

pub async fn list_feedback(
    State(ctx): State<Arc<AppContext>>,
    Path(scenario_id): Path<String>,
) -> Result<Json<Value>, Error> {
    ctx.storage
        .get_scenario(&scenario_id)
        .await?
        .ok_or(Error::NotFound("scenario"))?;
    let feedback = ctx.storage.list_feedback(&scenario_id).await?;
    let list: Vec<Value> = feedback.iter().map(feedback_json).collect();
    Ok(Json(json!({ "feedback": list })))
}
