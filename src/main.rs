use std::net::SocketAddr;

use clap::Parser;
use moviegate::cli::{
    Args, build_auth_config, build_config, handle_create_admin, init_logging, load_secret,
    open_database, open_store, take_admin_password,
};
use moviegate::config::AuthConfig;
use moviegate::create_app;
use tracing::{error, info, warn};

/// Username and password for `--create-admin`.
type AdminAccount = (String, String);

fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    // Secrets are read and cleared from the environment while the process
    // is still single-threaded; the runtime is built afterwards.
    let Some(jwt_secret) = load_secret(
        "JWT_SECRET",
        args.jwt_secret_file.as_deref(),
        "--jwt-secret-file",
    ) else {
        std::process::exit(1);
    };

    let Some(refresh_secret) = load_secret(
        "REFRESH_SECRET",
        args.refresh_secret_file.as_deref(),
        "--refresh-secret-file",
    ) else {
        std::process::exit(1);
    };

    let admin: Option<AdminAccount> = match args.create_admin.clone() {
        Some(username) => match take_admin_password() {
            Some(password) => Some((username, password)),
            None => std::process::exit(1),
        },
        None => None,
    };

    let auth = build_auth_config(&args, jwt_secret, refresh_secret);
    if let Err(e) = auth.validate() {
        error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start the async runtime");
            std::process::exit(1);
        }
    };

    runtime.block_on(serve(args, auth, admin));
}

async fn serve(args: Args, auth: AuthConfig, admin: Option<AdminAccount>) {
    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if let Some((username, password)) = admin {
        handle_create_admin(&db, &username, password).await;
    }

    match db.users().has_admin().await {
        Ok(false) => warn!("No admin account exists. Create one with --create-admin"),
        Ok(true) => {}
        Err(e) => error!(error = %e, "Failed to check for admin accounts"),
    }

    let Some(store) = open_store(args.redis_url.as_deref(), &args.redis_prefix).await else {
        std::process::exit(1);
    };

    let config = build_config(db, store, auth, args.login_per_minute);
    let app = match create_app(&config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => error!(error = %e, "Failed to read local address"),
    }

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
