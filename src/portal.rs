//! Portal access: grant, revoke, toggle, and the computed status.
//!
//! Every operation reports a structured [`ActionResult`] instead of raising.
//! Known failure conditions carry their own message via [`PortalError`];
//! unexpected store errors are logged server-side and surface as a generic
//! message, never as serialized internals.

use serde::Serialize;

use crate::db::{CreateUserInput, Database, Partner, User, UserKind};
use crate::invite::InviteConfig;

/// Portal access status of a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortalAccess {
    Active,
    Revoked,
    None,
}

/// Structured result of a grant / revoke / toggle operation.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub success: bool,
    pub portal_access: PortalAccess,
    pub partner_id: i64,
    pub message: String,
}

/// Known failure conditions of the portal operations.
#[derive(Debug)]
pub enum PortalError {
    PartnerNotFound(i64),
    MissingEmail,
    /// The login belongs to an existing internal user.
    InternalUser(String),
    /// An active portal account already exists for this login.
    AlreadyActive(String),
    /// No user account exists for the partner's email.
    NoUser(String),
    /// Reactivating would re-point the account to a different partner.
    PartnerChange {
        from_id: i64,
        from_name: String,
        to_id: i64,
        to_name: String,
    },
    ConfirmationRequired,
    /// The status did not flip to the expected value after the action.
    ToggleMismatch,
    /// Unexpected store or token error; detail stays server-side.
    Internal,
}

impl PortalError {
    fn message(&self) -> String {
        match self {
            PortalError::PartnerNotFound(id) => format!("No partner found with the id: {}.", id),
            PortalError::MissingEmail => {
                "This partner does not have an email address.".to_string()
            }
            PortalError::InternalUser(login) => {
                format!("A user with the email of {} is an existing internal user", login)
            }
            PortalError::AlreadyActive(login) => {
                format!("An account with the email {} already has portal access.", login)
            }
            PortalError::NoUser(email) => format!("No portal user found with email: {}", email),
            PortalError::PartnerChange {
                from_id,
                from_name,
                to_id,
                to_name,
            } => format!(
                "This action will change the linked partner from {} ({}) to {} ({}).",
                from_id, from_name, to_id, to_name
            ),
            PortalError::ConfirmationRequired => {
                "Confirmation required before changing portal access.".to_string()
            }
            PortalError::ToggleMismatch => {
                "Portal access did not change to the expected state.".to_string()
            }
            PortalError::Internal => "Internal error".to_string(),
        }
    }
}

impl std::fmt::Display for PortalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for PortalError {}

impl From<sqlx::Error> for PortalError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "Portal store error");
        PortalError::Internal
    }
}

/// Portal access operations over the partner and user stores.
#[derive(Clone)]
pub struct PortalService {
    db: Database,
    invites: InviteConfig,
    /// Origin used to build claim URLs, e.g. `http://localhost:7291`.
    origin: String,
}

impl PortalService {
    pub fn new(db: Database, invites: InviteConfig, origin: String) -> Self {
        Self { db, invites, origin }
    }

    /// Compute the portal access status of a partner.
    pub async fn status(&self, partner: &Partner) -> Result<PortalAccess, sqlx::Error> {
        if let Some(user) = self
            .db
            .users()
            .find_active_portal_for_partner(partner.id)
            .await?
        {
            debug_assert!(user.active);
            return Ok(PortalAccess::Active);
        }

        if let Some(email) = partner.email.as_deref() {
            if let Some(user) = self.db.users().get_by_login_any(email).await? {
                if !user.active {
                    return Ok(PortalAccess::Revoked);
                }
                if user.kind == UserKind::Portal {
                    return Ok(PortalAccess::Active);
                }
            }
        }

        Ok(PortalAccess::None)
    }

    /// The revocation note stored on the user account behind a partner.
    pub async fn revoke_note(&self, partner: &Partner) -> Result<Option<String>, sqlx::Error> {
        let Some(email) = partner.email.as_deref() else {
            return Ok(None);
        };
        Ok(self
            .db
            .users()
            .get_by_login_any(email)
            .await?
            .and_then(|u| u.portal_revoke_note))
    }

    /// Write the revocation note through to the user account, if one exists.
    pub async fn set_revoke_note(
        &self,
        partner: &Partner,
        note: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let Some(email) = partner.email.as_deref() else {
            return Ok(false);
        };
        let Some(user) = self.db.users().get_by_login_any(email).await? else {
            return Ok(false);
        };
        self.db.users().set_revoke_note(user.id, note).await
    }

    /// Grant portal access to a partner.
    ///
    /// Creates a portal user for the partner's email (or reactivates an
    /// inactive one) and issues an invite link for setting a password. An
    /// existing internal account with that login is refused outright.
    pub async fn grant(&self, partner_id: i64, allow_change_partner: bool) -> ActionResult {
        match self.try_grant(partner_id, allow_change_partner).await {
            Ok(result) => result,
            Err(e) => self.failure(partner_id, e).await,
        }
    }

    async fn try_grant(
        &self,
        partner_id: i64,
        allow_change_partner: bool,
    ) -> Result<ActionResult, PortalError> {
        let partner = self
            .db
            .partners()
            .get_by_id(partner_id)
            .await?
            .ok_or(PortalError::PartnerNotFound(partner_id))?;

        let email = partner
            .email
            .clone()
            .ok_or(PortalError::MissingEmail)?;

        // Revoked accounts must be found too, hence the any-state lookup.
        let existing = self.db.users().get_by_login_any(&email).await?;

        match existing {
            Some(user) if !user.is_share() => Err(PortalError::InternalUser(user.login)),
            None => {
                let user_id = self
                    .db
                    .users()
                    .create(CreateUserInput {
                        login: &email,
                        kind: UserKind::Portal,
                        partner_id: Some(partner.id),
                    })
                    .await?;
                let url = self.issue_invite(user_id, &email)?;
                tracing::info!(partner = partner.id, login = %email, claim_url = %url, "Portal access granted");
                Ok(ActionResult {
                    success: true,
                    portal_access: PortalAccess::Active,
                    partner_id: partner.id,
                    message: format!(
                        "Portal access granted to email: {}. Invite link issued.",
                        email
                    ),
                })
            }
            Some(user) if !user.active => {
                // Reactivation re-points partner_id; refuse a silent re-link.
                if user.partner_id != Some(partner.id) && !allow_change_partner {
                    let (from_id, from_name) = match user.partner_id {
                        Some(id) => {
                            let name = self
                                .db
                                .partners()
                                .get_by_id(id)
                                .await?
                                .map(|p| p.name)
                                .unwrap_or_default();
                            (id, name)
                        }
                        None => (0, String::new()),
                    };
                    return Err(PortalError::PartnerChange {
                        from_id,
                        from_name,
                        to_id: partner.id,
                        to_name: partner.name.clone(),
                    });
                }

                self.db.users().set_active(user.id, true).await?;
                self.db.users().set_kind(user.id, UserKind::Portal).await?;
                self.db.users().set_partner(user.id, partner.id).await?;
                let url = self.issue_invite(user.id, &email)?;
                tracing::info!(partner = partner.id, login = %email, claim_url = %url, "Portal access reactivated");
                Ok(ActionResult {
                    success: true,
                    portal_access: PortalAccess::Active,
                    partner_id: partner.id,
                    message: format!(
                        "Portal access reactivated for email: {}. Invite link issued.",
                        email
                    ),
                })
            }
            Some(user) => Err(PortalError::AlreadyActive(user.login)),
        }
    }

    /// Revoke portal access: deactivate the account and move it to the
    /// public group, storing the revocation note.
    pub async fn revoke(&self, partner_id: i64, note: Option<&str>) -> ActionResult {
        match self.try_revoke(partner_id, note).await {
            Ok(result) => result,
            Err(e) => self.failure(partner_id, e).await,
        }
    }

    async fn try_revoke(
        &self,
        partner_id: i64,
        note: Option<&str>,
    ) -> Result<ActionResult, PortalError> {
        let partner = self
            .db
            .partners()
            .get_by_id(partner_id)
            .await?
            .ok_or(PortalError::PartnerNotFound(partner_id))?;

        let email = partner
            .email
            .clone()
            .ok_or(PortalError::MissingEmail)?;

        let user = self
            .db
            .users()
            .get_by_login_any(&email)
            .await?
            .ok_or_else(|| PortalError::NoUser(email.clone()))?;

        self.db.users().set_active(user.id, false).await?;
        self.db.users().set_kind(user.id, UserKind::Public).await?;
        if note.is_some() {
            self.db.users().set_revoke_note(user.id, note).await?;
        }

        tracing::info!(partner = partner.id, login = %email, "Portal access revoked");
        Ok(ActionResult {
            success: true,
            portal_access: PortalAccess::Revoked,
            partner_id: partner.id,
            message: format!(
                "Portal access revoked for email: {}. User deactivated and moved to public group.",
                email
            ),
        })
    }

    /// Flip the partner's portal access, verify the flip took effect, and
    /// post an audit line to the partner chatter (and its parent's).
    pub async fn toggle(
        &self,
        actor: &User,
        partner_id: i64,
        confirmed: bool,
        note: Option<&str>,
    ) -> ActionResult {
        match self.try_toggle(actor, partner_id, confirmed, note).await {
            Ok(result) => result,
            Err(e) => self.failure(partner_id, e).await,
        }
    }

    async fn try_toggle(
        &self,
        actor: &User,
        partner_id: i64,
        confirmed: bool,
        note: Option<&str>,
    ) -> Result<ActionResult, PortalError> {
        let partner = self
            .db
            .partners()
            .get_by_id(partner_id)
            .await?
            .ok_or(PortalError::PartnerNotFound(partner_id))?;

        if partner.email.is_none() {
            return Err(PortalError::MissingEmail);
        }

        if !confirmed {
            return Err(PortalError::ConfirmationRequired);
        }

        let currently_active = self.status(&partner).await? == PortalAccess::Active;

        let result = if currently_active {
            self.revoke(partner.id, note).await
        } else {
            self.grant(partner.id, false).await
        };

        let after = self.status(&partner).await?;
        let flipped = (after == PortalAccess::Active) == !currently_active;
        if !result.success {
            return Ok(ActionResult {
                portal_access: after,
                ..result
            });
        }
        if !flipped {
            return Err(PortalError::ToggleMismatch);
        }

        let audit = if after == PortalAccess::Active {
            format!("Portal access has been granted by {}.", actor.login)
        } else {
            format!(
                "Portal access has been revoked by {}. Revocation reason: {}",
                actor.login,
                note.unwrap_or("")
            )
        };
        self.db
            .messages()
            .create(partner.id, actor.id, &audit)
            .await?;
        if let Some(parent_id) = partner.parent_id {
            let parent_note = format!("For partner {}: {}", partner.name, audit);
            self.db
                .messages()
                .create(parent_id, actor.id, &parent_note)
                .await?;
        }

        Ok(ActionResult {
            portal_access: after,
            ..result
        })
    }

    fn issue_invite(&self, user_id: i64, login: &str) -> Result<String, PortalError> {
        let token = self.invites.generate(user_id, login).map_err(|e| {
            tracing::error!(error = %e, "Failed to issue invite token");
            PortalError::Internal
        })?;
        Ok(self.invites.claim_url(&self.origin, &token.token))
    }

    /// Build the structured failure shape, with a best-effort status so the
    /// caller still sees the current state.
    async fn failure(&self, partner_id: i64, error: PortalError) -> ActionResult {
        let portal_access = match self.db.partners().get_by_id(partner_id).await {
            Ok(Some(partner)) => self.status(&partner).await.unwrap_or(PortalAccess::None),
            _ => PortalAccess::None,
        };
        ActionResult {
            success: false,
            portal_access,
            partner_id,
            message: error.message(),
        }
    }
}
