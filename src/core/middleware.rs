use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use log::debug;
use std::sync::Arc;

use crate::auth::{authenticate, bearer_token, CurrentUser};
use crate::core::shared::state::AppState;

/// Paths reachable without a session.
pub fn is_public_path(path: &str) -> bool {
    !path.starts_with("/api/")
        || path.starts_with("/api/auth/")
        || path == "/api/invitations/accept"
}

/// Resolves the bearer session into a `CurrentUser` extension.
///
/// With `AUTH_REQUIRED` on, protected paths without a valid session get 401.
/// With it off, a valid token is still attached so role checks can use it.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let enforce = state.config.auth.required && !is_public_path(&path);

    if !enforce && bearer_token(req.headers()).is_none() {
        return next.run(req).await;
    }

    match authenticate(&state, req.headers()).await {
        Ok(user) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        Err(e) if enforce => {
            debug!("Rejected unauthenticated request to {path}");
            e.into_response()
        }
        Err(_) => next.run(req).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/health"));
        assert!(is_public_path("/webhook/whatsapp"));
        assert!(is_public_path("/api/auth/login"));
        assert!(is_public_path("/api/invitations/accept"));
        assert!(!is_public_path("/api/contacts"));
        assert!(!is_public_path("/api/invitations"));
        assert!(!is_public_path("/api/auth"));
    }
}
