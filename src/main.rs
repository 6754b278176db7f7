use clap::Parser;
use frontdesk::cli::{
    Args, build_config, handle_create_admin, handle_seed, init_logging, load_invite_secret,
    open_database, validate_origin,
};
use frontdesk::{init_cleanup, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(invite_secret) = load_invite_secret(args.invite_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if args.create_admin {
        handle_create_admin(&db).await;
    }

    if let Some(seed_path) = &args.seed {
        handle_seed(&db, seed_path, &args.skip_import_ids).await;
    }

    let Some(origin) = validate_origin(&args.origin) else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to read local address");
        std::process::exit(1);
    });

    // In test mode, update the origin to include the actual port when using port 0
    #[cfg(feature = "test-mode")]
    let origin = test_mode::maybe_update_origin(origin, args.port, local_addr.port());

    let config = build_config(&args, db.clone(), origin, invite_secret);

    init_cleanup(&db).await;

    info!(address = %local_addr, "Listening");

    #[cfg(feature = "test-mode")]
    println!("FRONTDESK_READY port={}", local_addr.port());

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

#[cfg(feature = "test-mode")]
mod test_mode {
    use url::Url;

    /// Update the origin to include the actual port when using port 0 with localhost.
    pub fn maybe_update_origin(mut origin: Url, requested_port: u16, actual_port: u16) -> Url {
        if requested_port == 0 && origin.host_str() == Some("localhost") && origin.port().is_none()
        {
            origin.set_port(Some(actual_port)).ok();
        }
        origin
    }
}
