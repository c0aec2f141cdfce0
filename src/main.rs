use anyhow::Context;
use clap::Parser;
use pdf_render_service::metrics::install_prometheus_recorder;
use pdf_render_service::{
    build_router, docs, load_config, load_dotenv, serve, setup_logging, shutdown_signal, AppState,
    ChromeLauncher, Cli, Commands, RenderService,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before parsing, so `.env` values feed the clap `env` fallbacks.
    let dotenv = load_dotenv();
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting pdf-render-service v{}", env!("CARGO_PKG_VERSION"));
    match dotenv {
        Ok(Some(path)) => info!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    let config = load_config(&args)
        .await
        .context("failed to load configuration")?;

    if args.command == Some(Commands::Validate) {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let prometheus =
        install_prometheus_recorder().context("failed to install metrics recorder")?;

    let launcher = Arc::new(ChromeLauncher::new(config.clone()));
    let service = Arc::new(RenderService::new(config.clone(), launcher));
    let state = AppState::new(config.clone(), service).with_metrics(prometheus);
    let router = build_router(state);

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr()))?;

    info!("Server running on port {}", config.port);
    info!("API docs available at {}{}", config.server_url(), docs::DOCS_PATH);

    serve(listener, router, config.shutdown_grace, shutdown_signal())
        .await
        .context("server error")?;

    info!("pdf-render-service stopped");
    Ok(())
}
