// rest/routes/assessments.rs — Self-assessment submission and history.
//
// Submitting an assessment is an XP-earning event: the row is created first,
// then the gamification updater runs one award for the configured amount.

use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Error;
use crate::rest::auth::AuthedUser;
use crate::storage::AssessmentRow;
use crate::AppContext;

fn assessment_json(a: &AssessmentRow) -> Value {
    json!({
        "id": a.id,
        "user_id": a.user_id,
        "scenario_id": a.scenario_id,
        "rating": a.rating,
        "reflection": a.reflection,
        "created_at": a.created_at,
    })
}

#[derive(Deserialize)]
pub struct SubmitAssessmentRequest {
    pub scenario_id: Option<String>,
    /// Self-rating on a 1–5 scale.
    pub rating: i64,
    pub reflection: Option<String>,
}

pub async fn submit_assessment(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Json(body): Json<SubmitAssessmentRequest>,
) -> Result<Json<Value>, Error> {
    if !(1..=5).contains(&body.rating) {
        return Err(Error::invalid(format!(
            "rating must be between 1 and 5, got {}",
            body.rating
        )));
    }
    if let Some(scenario_id) = &body.scenario_id {
        ctx.storage
            .get_scenario(scenario_id)
            .await?
            .ok_or(Error::NotFound("scenario"))?;
    }

    let assessment = ctx
        .storage
        .create_assessment(
            &caller.id,
            body.scenario_id.as_deref(),
            body.rating,
            body.reflection.as_deref().unwrap_or("").trim(),
        )
        .await?;
    let stats = ctx
        .gamification
        .award(&caller.id, ctx.gamification.assessment_xp as i64)
        .await?;

    Ok(Json(json!({
        "assessment": assessment_json(&assessment),
        "stats": stats,
    })))
}

pub async fn list_assessments(
    State(ctx): State<Arc<AppContext>>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
) -> Result<Json<Value>, Error> {
    let assessments = ctx.storage.list_assessments(&caller.id).await?;
    let list: Vec<Value> = assessments.iter().map(assessment_json).collect();
    Ok(Json(json!({ "assessments": list })))
}
