mod admin;
mod attachments;
mod auth;
mod error;
mod impersonate;
mod partners;
mod portal;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::impersonate::ImpersonationController;
use crate::invite::InviteConfig;
use crate::portal::PortalService;
use crate::rate_limit::RateLimitConfig;
use crate::storage::FileStore;

/// Everything the routers need, built once in `create_app`.
pub struct ApiContext {
    pub db: Database,
    pub invites: InviteConfig,
    pub portal: PortalService,
    pub controller: ImpersonationController,
    pub files: FileStore,
    pub secure_cookies: bool,
    pub web_root: String,
}

/// Create the API router mounted under `/api`.
pub fn create_api_router(ctx: &ApiContext) -> Router {
    let rate_limit = Arc::new(RateLimitConfig::new());

    let auth_state = auth::AuthState {
        db: ctx.db.clone(),
        invites: ctx.invites.clone(),
        secure_cookies: ctx.secure_cookies,
        rate_limit,
    };

    let partners_state = partners::PartnersState {
        db: ctx.db.clone(),
        portal: ctx.portal.clone(),
        secure_cookies: ctx.secure_cookies,
    };

    let portal_state = portal::PortalState {
        db: ctx.db.clone(),
        portal: ctx.portal.clone(),
        secure_cookies: ctx.secure_cookies,
    };

    let attachments_state = attachments::AttachmentsState {
        db: ctx.db.clone(),
        files: ctx.files.clone(),
        secure_cookies: ctx.secure_cookies,
    };

    let admin_state = admin::AdminState {
        db: ctx.db.clone(),
        secure_cookies: ctx.secure_cookies,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/partners", partners::router(partners_state))
        .nest("/portal", portal::router(portal_state))
        .nest("/attachments", attachments::router(attachments_state))
        .nest("/admin", admin::router(admin_state))
        .nest("/switch", impersonate::api_router(impersonate_state(ctx)))
}

/// Create the browser-facing impersonation routes mounted at the root.
pub fn create_web_router(ctx: &ApiContext) -> Router {
    impersonate::web_router(impersonate_state(ctx))
}

fn impersonate_state(ctx: &ApiContext) -> impersonate::ImpersonateState {
    impersonate::ImpersonateState {
        db: ctx.db.clone(),
        controller: ctx.controller.clone(),
        secure_cookies: ctx.secure_cookies,
        web_root: ctx.web_root.clone(),
    }
}
