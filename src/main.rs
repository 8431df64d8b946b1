mod config;

use chat_relay::{AppState, build_router, client::create_hyper_client};
use clap::Parser as _;
use config::Config;
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

#[tokio::main]
#[instrument]
pub async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Config::parse()).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Validates the configuration, then binds and serves until the listener fails.
///
/// Settings are checked before the listener is bound, so a missing credential
/// never opens the port.
async fn run(config: Config) -> anyhow::Result<()> {
    let settings = config.relay_settings()?;
    info!("Starting chat relay with config: {:?}", config);

    let http_client =
        create_hyper_client(config.pool_max_idle_per_host, config.pool_idle_timeout());
    let app_state = AppState::with_client(settings, http_client);
    let router = build_router(app_state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Chat relay listening on http://{}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn missing_key_fails_before_binding() {
        // Occupy a port: if `run` tried to bind it, the error would be about the address.
        let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port().to_string();

        let mut config = Config::try_parse_from(["chat-relay", "--port", port.as_str()]).unwrap();
        config.openai_api_key = None;

        let err = run(config).await.unwrap_err();
        assert!(
            err.to_string().contains("OPENAI_API_KEY"),
            "unexpected error: {err:#}"
        );
    }

    #[tokio::test]
    async fn occupied_port_is_reported_after_validation() {
        let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port().to_string();

        let config = Config::try_parse_from([
            "chat-relay",
            "--openai-api-key",
            "sk-test",
            "--port",
            port.as_str(),
        ])
        .unwrap();

        let err = run(config).await.unwrap_err();
        assert!(!err.to_string().contains("OPENAI_API_KEY"));
    }
}
