use axum::{
    body::Body,
    extract::{Query, State},
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use chrono::{DateTime, Utc};
use db::models::user::{UpsertUser, User};
use serde::Deserialize;
use services::services::auth::TokenError;
use tracing::warn;

use crate::{DeploymentImpl, error::ApiError};

/// The verified caller, inserted by [`require_session`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: User,
    pub access_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

fn is_websocket_upgrade(req: &Request<Body>) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Browsers cannot set headers on a WebSocket handshake, so upgrades may pass
/// the token as `?access_token=`.
fn access_token(req: &Request<Body>) -> Option<String> {
    if let Some(Authorization(bearer)) = req.headers().typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_owned());
    }
    if !is_websocket_upgrade(req) {
        return None;
    }
    Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(query)| query.access_token)
}

pub async fn require_session(
    State(deployment): State<DeploymentImpl>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = access_token(&req) else {
        return ApiError::Token(TokenError::Missing).into_response();
    };

    let identity = match deployment.jwt().verify(&token) {
        Ok(identity) => identity,
        Err(error) => {
            warn!(%error, "failed to verify access token");
            return ApiError::Token(error).into_response();
        }
    };

    // The identity service owns profiles; keep the local copy current.
    let user = match User::upsert(
        &deployment.db().pool,
        &UpsertUser {
            id: identity.user_id,
            email: identity.email,
            display_name: identity.display_name,
        },
    )
    .await
    {
        Ok(user) => user,
        Err(error) => {
            warn!(?error, user_id = %identity.user_id, "failed to load user");
            return ApiError::Database(error).into_response();
        }
    };

    req.extensions_mut().insert(RequestContext {
        user,
        access_token_expires_at: identity.expires_at,
    });

    next.run(req).await
}
