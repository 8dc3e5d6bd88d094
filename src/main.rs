use anyhow::Context;
use clap::Parser;
use symposium::api::{create_router, AppState};
use symposium::registration::{AuthChange, RegistrationConfig};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[clap(long, default_value = "config.toml")]
    config: String,

    /// Overrides `bind` from the config file
    #[clap(long)]
    bind: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = RegistrationConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config))?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    config.check().context("incomplete configuration")?;

    // Exported while the process is still single threaded
    if let Some((key, path)) = config.service_account_env() {
        std::env::set_var(key, path);
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?
        .block_on(serve(config))
}

async fn serve(config: RegistrationConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config).context("building application state")?;

    // Admin session audit trail
    let mut auth_changes = state.auth.on_auth_change();
    tokio::spawn(async move {
        loop {
            match auth_changes.recv().await {
                Ok(AuthChange::SignedIn(user)) => {
                    info!("Admin signed in: {}", user.email.as_deref().unwrap_or(&user.uid))
                }
                Ok(AuthChange::SignedOut(user)) => {
                    info!("Admin signed out: {}", user.email.as_deref().unwrap_or(&user.uid))
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} auth change notifications", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = create_router(state);
    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!("Symposium server listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("server failed")?;

    Ok(())
}
