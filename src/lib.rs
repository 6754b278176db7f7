pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod console;
pub mod db;
pub mod impersonate;
pub mod invite;
pub mod notify;
pub mod portal;
pub mod rate_limit;
pub mod seed;
pub mod storage;

use api::{ApiContext, create_api_router, create_web_router};
use axum::Router;
use db::Database;
use impersonate::ImpersonationController;
use invite::InviteConfig;
use portal::PortalService;
use std::net::SocketAddr;
use std::path::PathBuf;
use storage::{FileStore, FileStoreConfig};
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing invite tokens
    pub invite_secret: Vec<u8>,
    /// Public origin used to build invite claim URLs (e.g. "http://localhost:7291")
    pub origin: String,
    /// Redirect target after impersonation transitions
    pub web_root: String,
    /// Whether to set the Secure flag on cookies
    pub secure_cookies: bool,
    /// Directory holding attachment bytes
    pub filestore_root: PathBuf,
    /// Filestore fallback behavior
    pub filestore: FileStoreConfig,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let invites = InviteConfig::new(&config.invite_secret);

    let ctx = ApiContext {
        db: config.db.clone(),
        invites: invites.clone(),
        portal: PortalService::new(config.db.clone(), invites, config.origin.clone()),
        controller: ImpersonationController::new(config.db.clone()),
        files: FileStore::new(config.filestore_root.clone(), config.filestore),
        secure_cookies: config.secure_cookies,
        web_root: config.web_root.clone(),
    };

    Router::new()
        .nest("/api", create_api_router(&ctx))
        .merge(create_web_router(&ctx))
}

/// Run cleanup tasks and spawn the background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
