use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

use dealsync_api::config::AutomationConfig;
use dealsync_api::handlers;
use dealsync_api::helpers::hubspot_oauth::HubSpotOAuthClient;
use dealsync_api::jobs::{run_automation, spawn_startup_run};

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy"
    }))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Reconcile HubSpot deals for recently created contacts", long_about = None)]
struct Args {
    /// Config file (defaults to <config dir>/dealsync/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long)]
    log_file_path: Option<String>,

    /// Serve the OAuth callback and run one automation pass on startup
    #[arg(long)]
    serve: bool,
}

fn init_tracing(log_file_path: Option<&str>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(log_path) = log_file_path {
        let log_path = std::path::Path::new(log_path);
        let file_appender = tracing_appender::rolling::never(
            log_path.parent().unwrap_or(std::path::Path::new(".")),
            log_path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("dealsync.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        std::mem::forget(guard);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_writer(std::io::stdout),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

async fn serve(config: AutomationConfig) -> anyhow::Result<()> {
    let oauth_client = Arc::new(
        HubSpotOAuthClient::new(&config.oauth).context("Failed to initialize OAuth client")?,
    );

    let host = config.server.host.clone();
    let port = config.server.port;

    spawn_startup_run(config);

    tracing::info!("Listening for OAuth callbacks on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(oauth_client.clone()))
            .service(health)
            .route(
                "/oauth/install",
                web::get().to(handlers::oauth::initiate_hubspot_oauth),
            )
            .route(
                "/oauth/callback",
                web::get().to(handlers::oauth::hubspot_oauth_callback),
            )
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file_path.as_deref());

    let (config, config_path) =
        AutomationConfig::load(args.config).context("Failed to load config")?;
    tracing::info!("Loaded config from {:?}", config_path);

    if args.serve {
        return serve(config).await;
    }

    let outcome = run_automation(&config).await?;
    outcome.log();
    Ok(())
}
