// rest/routes/auth.rs — Registration and login (token issuance).

use axum::{extract::State, http::StatusCode, Json};
use axum::response::{IntoResponse, Response};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Error;
use crate::rest::auth::{generate_salt, generate_token, hash_password, token_digest};
use crate::storage::UserRow;
use crate::AppContext;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn user_json(u: &UserRow) -> Value {
    json!({
        "id": u.id,
        "email": u.email,
        "display_name": u.display_name,
        "role": u.role,
        "created_at": u.created_at,
    })
}

async fn issue_token(ctx: &AppContext, user_id: &str) -> Result<String, Error> {
    let token = generate_token();
    let ttl_days = ctx.hot.read().await.token_ttl_days;
    let expires_at = (Utc::now() + Duration::days(ttl_days as i64)).to_rfc3339();
    ctx.storage
        .insert_token(&token_digest(&token), user_id, &expires_at)
        .await?;
    Ok(token)
}

pub async fn register(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<Value>, Error> {
    let email = body.email.trim().to_ascii_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::invalid("a valid email address is required"));
    }
    if body.display_name.trim().is_empty() {
        return Err(Error::invalid("display name must not be empty"));
    }
    if body.password.len() < 8 {
        return Err(Error::invalid("password must be at least 8 characters"));
    }
    if ctx.storage.get_user_by_email(&email).await?.is_some() {
        return Err(Error::invalid("email already registered"));
    }

    let salt = generate_salt();
    let hash = hash_password(&body.password, &salt);
    let user = ctx
        .storage
        .create_user(&email, body.display_name.trim(), &hash, &salt)
        .await?;
    let token = issue_token(&ctx, &user.id).await?;

    Ok(Json(json!({ "user": user_json(&user), "token": token })))
}

pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, Response> {
    let email = body.email.trim().to_ascii_lowercase();
    let user = ctx
        .storage
        .get_user_by_email(&email)
        .await
        .map_err(IntoResponse::into_response)?;

    // Same response for unknown email and wrong password.
    let rejected = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid credentials" })),
        )
            .into_response()
    };

    let Some(user) = user else { return Err(rejected()) };
    if hash_password(&body.password, &user.password_salt) != user.password_hash {
        return Err(rejected());
    }

    let token = issue_token(&ctx, &user.id)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(json!({ "user": user_json(&user), "token": token })))
}
