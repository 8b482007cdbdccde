//! Password login with opaque bearer sessions.
//!
//! Tokens are random and returned once; only their sha256 is persisted.

pub mod password;
pub mod tokens;
pub mod types;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::state::AppState;
use crate::core::shared::validation::ValidatedJson;
use crate::core::storage::StoreError;

pub use types::*;

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(handle_register))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/logout", post(handle_logout))
        .route("/api/auth/me", get(handle_me))
}

/// Reads `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves the session behind a bearer token. Unknown and expired tokens are
/// both `Unauthorized`.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> CrmResult<User> {
    let token = bearer_token(headers).ok_or(CrmError::Unauthorized)?;
    let session = match state
        .store
        .find_session(&tokens::hash_token(token))
        .await
    {
        Ok(session) => session,
        Err(StoreError::NotFound(_)) => return Err(CrmError::Unauthorized),
        Err(e) => return Err(e.into()),
    };

    if session.is_expired(Utc::now()) {
        if let Err(e) = state.store.delete_session(&session.token_hash).await {
            warn!("Failed to drop expired session {}: {e}", session.id);
        }
        return Err(CrmError::Unauthorized);
    }

    match state.store.get_user(session.user_id).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound(_)) => Err(CrmError::Unauthorized),
        Err(e) => Err(e.into()),
    }
}

/// Opens a session for `user` and returns the one-time token.
pub async fn start_session(state: &AppState, user: User) -> CrmResult<AuthResponse> {
    let token = tokens::generate_token();
    let now = Utc::now();
    let session = Session {
        id: Uuid::new_v4(),
        user_id: user.id,
        token_hash: tokens::hash_token(&token),
        expires_at: now + Duration::hours(state.config.auth.session_ttl_hours),
        created_at: now,
    };
    let session = state.store.create_session(session).await?;
    Ok(AuthResponse {
        token,
        expires_at: session.expires_at,
        user,
    })
}

/// Fails with a field error when the address already belongs to a user.
pub async fn ensure_email_available(state: &AppState, email: &str) -> CrmResult<()> {
    match state.store.find_user_by_email(email).await {
        Ok(_) => Err(CrmError::invalid("email", "is already registered")),
        Err(StoreError::NotFound(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> CrmResult<(StatusCode, Json<AuthResponse>)> {
    let email = req.email.unwrap_or_default().trim().to_lowercase();
    ensure_email_available(&state, &email).await?;

    let role = if state.store.count_users().await? == 0 {
        UserRole::Admin
    } else {
        UserRole::Member
    };

    let hash = password::hash_password(&req.password.unwrap_or_default())?;
    let user = User::new(&email, &req.name.unwrap_or_default(), role, hash);
    let user = state.store.create_user(user).await?;
    info!("Registered user {} as {}", user.email, user.role);

    let response = start_session(&state, user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> CrmResult<Json<AuthResponse>> {
    let email = req.email.unwrap_or_default().trim().to_lowercase();
    let user = match state.store.find_user_by_email(&email).await {
        Ok(user) => user,
        Err(StoreError::NotFound(_)) => return Err(CrmError::Unauthorized),
        Err(e) => return Err(e.into()),
    };

    if !password::verify_password(&req.password.unwrap_or_default(), &user.password_hash)? {
        warn!("Failed login for {email}");
        return Err(CrmError::Unauthorized);
    }

    Ok(Json(start_session(&state, user).await?))
}

pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> CrmResult<StatusCode> {
    let token = bearer_token(&headers).ok_or(CrmError::Unauthorized)?;
    match state.store.delete_session(&tokens::hash_token(token)).await {
        Ok(()) | Err(StoreError::NotFound(_)) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into()),
    }
}

pub async fn handle_me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> CrmResult<Json<User>> {
    Ok(Json(authenticate(&state, &headers).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_role_parse_and_permissions() {
        assert_eq!("Manager".parse::<UserRole>(), Ok(UserRole::Manager));
        assert!("owner".parse::<UserRole>().is_err());
        assert!(UserRole::Admin.can_manage_team());
        assert!(!UserRole::Viewer.can_manage_team());
    }

    #[test]
    fn test_roles_grant_only_downward() {
        assert!(UserRole::Admin.can_grant(UserRole::Admin));
        assert!(UserRole::Manager.can_grant(UserRole::Manager));
        assert!(UserRole::Manager.can_grant(UserRole::Viewer));
        assert!(!UserRole::Manager.can_grant(UserRole::Admin));
        assert!(!UserRole::Member.can_grant(UserRole::Viewer));
    }

    #[test]
    fn test_user_serialization_hides_hash() {
        let user = User::new(" Ana@Example.com ", "Ana", UserRole::Admin, "secret".into());
        assert_eq!(user.email, "ana@example.com");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "admin");
    }
}
