use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use cadabra_config::{AuthConfig, HealthConfig, Role};
use secrecy::ExposeSecret;

use crate::error::ApiError;

/// Caller identified by its bearer token
#[derive(Debug, Clone)]
pub struct Principal {
    pub name: String,
    pub role: Role,
}

/// Configured tokens, looked up by value
#[derive(Clone)]
pub struct TokenTable {
    tokens: Arc<HashMap<String, Principal>>,
    public_paths: Arc<[String]>,
}

impl TokenTable {
    /// Build the table from the auth section; an enabled health check path is always public
    pub fn from_config(config: &AuthConfig, health: &HealthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|t| {
                (
                    t.token.expose_secret().to_owned(),
                    Principal {
                        name: t.name.clone(),
                        role: t.role,
                    },
                )
            })
            .collect();

        let mut public_paths = config.public_paths.clone();
        if health.enabled && !public_paths.contains(&health.path) {
            public_paths.push(health.path.clone());
        }

        Self {
            tokens: Arc::new(tokens),
            public_paths: public_paths.into(),
        }
    }

    fn lookup(&self, token: &str) -> Option<&Principal> {
        self.tokens.get(token)
    }

    fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// Authenticate requests via bearer token
///
/// Public paths pass through untouched. Any other request must carry a
/// configured token; the matching [`Principal`] is attached to the request.
pub async fn auth_middleware(tokens: TokenTable, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    if tokens.is_public(&path) {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        tracing::warn!(%path, "missing bearer token");
        return ApiError::Unauthorized("missing bearer token").into_response();
    };

    let Some(principal) = tokens.lookup(token).cloned() else {
        tracing::warn!(%path, "unknown bearer token");
        return ApiError::Unauthorized("invalid bearer token").into_response();
    };

    tracing::debug!(token = %principal.name, role = principal.role.as_str(), %path, "request authenticated");
    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Attach an all-access principal when authentication is disabled
pub async fn open_access_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(Principal {
        name: "anonymous".to_owned(),
        role: Role::Staff,
    });
    next.run(request).await
}

/// Reject principals whose role does not grant `required`
pub async fn require_role(required: Role, request: Request, next: Next) -> Response {
    let Some(principal) = request.extensions().get::<Principal>() else {
        return ApiError::Unauthorized("missing bearer token").into_response();
    };

    if !principal.role.grants(required) {
        tracing::warn!(
            token = %principal.name,
            role = principal.role.as_str(),
            required = required.as_str(),
            "token role not allowed"
        );
        return ApiError::Forbidden.into_response();
    }

    next.run(request).await
}
