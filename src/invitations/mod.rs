//! Team invitations: an admin or manager invites an email address with a role,
//! the invitee accepts with the token and becomes a user.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{self, password, tokens, AuthResponse, CurrentUser, User, UserRole};
use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::state::AppState;
use crate::core::shared::validation::{clean_optional, Path, Query, ValidatedJson};
use crate::core::storage::StoreError;

pub const MAX_EXPIRY_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Revoked,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "revoked" => Ok(Self::Revoked),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown invitation status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub token: String,
    pub status: InvitationStatus,
    pub invited_by: Option<Uuid>,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Pending invitations past their expiry read as expired.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.status == InvitationStatus::Pending && self.is_expired(now) {
            InvitationStatus::Expired
        } else {
            self.status
        }
    }

    fn refreshed(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    #[validate(
        required(message = "is required"),
        email(message = "must be a valid email address")
    )]
    pub email: Option<String>,
    pub role: Option<UserRole>,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub message: Option<String>,
    #[validate(range(min = 1, max = 30, message = "must be between 1 and 30"))]
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitationRequest {
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "is required")
    )]
    pub token: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 100, message = "must be between 1 and 100 characters")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 8, max = 128, message = "must be between 8 and 128 characters")
    )]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvitationsQuery {
    pub status: Option<InvitationStatus>,
}

/// Returned once on creation; the token is not readable afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInvitation {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub token: String,
}

pub fn configure_invitation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/invitations",
            get(handle_list_invitations).post(handle_create_invitation),
        )
        .route("/api/invitations/:id", delete(handle_revoke_invitation))
        .route("/api/invitations/accept", post(handle_accept_invitation))
}

fn require_team_manager(user: Option<&CurrentUser>) -> CrmResult<Option<&User>> {
    match user {
        Some(CurrentUser(user)) if !user.role.can_manage_team() => Err(CrmError::Forbidden(
            "only admins and managers can manage invitations".into(),
        )),
        Some(CurrentUser(user)) => Ok(Some(user)),
        // Auth disabled.
        None => Ok(None),
    }
}

pub async fn handle_list_invitations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListInvitationsQuery>,
) -> CrmResult<Json<Vec<Invitation>>> {
    let now = Utc::now();
    let invitations = state
        .store
        .list_invitations()
        .await?
        .into_iter()
        .map(|inv| inv.refreshed(now))
        .filter(|inv| query.status.map_or(true, |s| inv.status == s))
        .collect();
    Ok(Json(invitations))
}

pub async fn handle_create_invitation(
    State(state): State<Arc<AppState>>,
    current: Option<Extension<CurrentUser>>,
    ValidatedJson(req): ValidatedJson<CreateInvitationRequest>,
) -> CrmResult<(StatusCode, Json<CreatedInvitation>)> {
    let inviter = require_team_manager(current.as_ref().map(|Extension(u)| u))?;
    let role = req.role.unwrap_or_default();
    if let Some(inviter) = inviter {
        if !inviter.role.can_grant(role) {
            return Err(CrmError::Forbidden(format!(
                "a {} cannot invite a {role}",
                inviter.role
            )));
        }
    }
    let email = req.email.unwrap_or_default().trim().to_lowercase();
    auth::ensure_email_available(&state, &email).await?;

    let now = Utc::now();
    let already_pending = state
        .store
        .list_invitations()
        .await?
        .iter()
        .any(|inv| inv.email == email && inv.effective_status(now) == InvitationStatus::Pending);
    if already_pending {
        return Err(CrmError::invalid(
            "email",
            "an invitation is already pending for this address",
        ));
    }

    let days = req
        .expires_in_days
        .unwrap_or(state.config.auth.invitation_expiry_days)
        .clamp(1, MAX_EXPIRY_DAYS);
    let token = tokens::generate_token();
    let invitation = Invitation {
        id: Uuid::new_v4(),
        email,
        role,
        token: token.clone(),
        status: InvitationStatus::Pending,
        invited_by: inviter.map(|u| u.id),
        message: clean_optional(req.message),
        expires_at: now + Duration::days(days),
        accepted_at: None,
        created_at: now,
        updated_at: now,
    };
    let invitation = state.store.create_invitation(invitation).await?;
    info!(
        "Invited {} as {} (expires {})",
        invitation.email, invitation.role, invitation.expires_at
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedInvitation { invitation, token }),
    ))
}

pub async fn handle_revoke_invitation(
    State(state): State<Arc<AppState>>,
    current: Option<Extension<CurrentUser>>,
    Path(id): Path<Uuid>,
) -> CrmResult<StatusCode> {
    require_team_manager(current.as_ref().map(|Extension(u)| u))?;

    let mut invitation = state.store.get_invitation(id).await?;
    if invitation.effective_status(Utc::now()) != InvitationStatus::Pending {
        return Err(CrmError::invalid(
            "status",
            "only pending invitations can be revoked",
        ));
    }

    invitation.status = InvitationStatus::Revoked;
    invitation.updated_at = Utc::now();
    state.store.update_invitation(invitation).await?;
    info!("Revoked invitation {id}");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_accept_invitation(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<AcceptInvitationRequest>,
) -> CrmResult<(StatusCode, Json<AuthResponse>)> {
    let token = req.token.unwrap_or_default();
    let mut invitation = match state.store.find_invitation_by_token(token.trim()).await {
        Ok(invitation) => invitation,
        Err(StoreError::NotFound(_)) => {
            return Err(CrmError::invalid("token", "invitation not found"))
        }
        Err(e) => return Err(e.into()),
    };

    let now = Utc::now();
    match invitation.effective_status(now) {
        InvitationStatus::Pending => {}
        InvitationStatus::Expired => {
            if invitation.status == InvitationStatus::Pending {
                invitation.status = InvitationStatus::Expired;
                invitation.updated_at = now;
                if let Err(e) = state.store.update_invitation(invitation).await {
                    warn!("Failed to mark invitation expired: {e}");
                }
            }
            return Err(CrmError::invalid("token", "invitation has expired"));
        }
        status => {
            return Err(CrmError::invalid(
                "token",
                format!("invitation is {status}"),
            ))
        }
    }

    auth::ensure_email_available(&state, &invitation.email).await?;

    let hash = password::hash_password(&req.password.unwrap_or_default())?;
    let user = User::new(
        &invitation.email,
        &req.name.unwrap_or_default(),
        invitation.role,
        hash,
    );
    let user = state.store.create_user(user).await?;

    invitation.status = InvitationStatus::Accepted;
    invitation.accepted_at = Some(now);
    invitation.updated_at = now;
    state.store.update_invitation(invitation).await?;
    info!("{} joined as {}", user.email, user.role);

    let response = auth::start_session(&state, user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
