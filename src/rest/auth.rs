// rest/auth.rs — Bearer-token authentication for the REST API.
//
// Tokens are opaque 32-byte random values issued at register/login. Only the
// SHA-256 hex digest is persisted, so a leaked database cannot be replayed
// as live credentials. Passwords are stored as salted SHA-256 digests with a
// per-user random salt.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use rand_core::{OsRng, RngCore};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::storage::UserRow;
use crate::AppContext;

/// Authenticated caller, inserted into request extensions by [`require_auth`].
#[derive(Clone)]
pub struct AuthedUser(pub Arc<UserRow>);

/// Generate a fresh opaque token (64 hex chars).
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Lowercase hex SHA-256 digest — the only form a token is stored in.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn unauthorized(msg: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": msg })),
    )
        .into_response()
}

/// Middleware: validate `Authorization: Bearer <token>` and attach the owner
/// to the request. Expired and unknown tokens both map to 401.
pub async fn require_auth(
    State(ctx): State<Arc<AppContext>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return unauthorized("missing bearer token");
    };

    match ctx.storage.lookup_token(&token_digest(token)).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(AuthedUser(Arc::new(user)));
            next.run(req).await
        }
        Ok(None) => unauthorized("invalid or expired token"),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(token_digest("abc"), token_digest("abc"));
        assert_ne!(token_digest("abc"), token_digest("abd"));
    }

    #[test]
    fn salted_passwords_differ() {
        let salt_a = generate_salt();
        let salt_b = generate_salt();
        assert_ne!(
            hash_password("hunter2", &salt_a),
            hash_password("hunter2", &salt_b)
        );
    }
}
