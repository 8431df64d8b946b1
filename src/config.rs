//! Configuration parsing and validation for the relay server
//!
//! Every option can be given as a flag or through its environment variable, so
//! hosted deployments only need to set `OPENAI_API_KEY` (and usually `PORT`).
use anyhow::anyhow;
use chat_relay::{RelaySettings, auth::ApiKey, upstream::UpstreamShape};
use clap::Parser;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The key sent to the upstream as a bearer token. Required.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<ApiKey>,

    /// The port on which the relay will listen.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 8787)]
    pub port: u16,

    /// Base URL of the upstream API; the endpoint path is resolved against it.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1/")]
    pub upstream_url: Url,

    /// Which upstream endpoint and payload shape to use.
    #[arg(long, env = "RELAY_UPSTREAM_SHAPE", value_enum, default_value_t = UpstreamShape::Completions)]
    pub upstream_shape: UpstreamShape,

    /// Model used when a request doesn't name one. Defaults per upstream shape.
    #[arg(long, env = "RELAY_DEFAULT_MODEL")]
    pub default_model: Option<String>,

    /// How long (in seconds) to wait for the upstream before answering 504.
    #[arg(long, env = "RELAY_UPSTREAM_TIMEOUT_SECS", default_value_t = 60)]
    pub upstream_timeout_secs: u64,

    /// Largest upstream response body (in bytes) the relay will buffer.
    #[arg(long, env = "RELAY_MAX_UPSTREAM_BODY_BYTES", default_value_t = chat_relay::DEFAULT_MAX_UPSTREAM_BODY_BYTES)]
    pub max_upstream_body_bytes: usize,

    /// Maximum number of upstream calls in flight. Unbounded when unset.
    #[arg(long, env = "RELAY_MAX_CONCURRENT_UPSTREAM")]
    pub max_concurrent_upstream: Option<usize>,

    /// Include the untouched upstream payload as `raw` in successful responses.
    #[arg(long, env = "RELAY_INCLUDE_RAW")]
    pub include_raw: bool,

    /// Maximum number of idle HTTP connections to keep alive per upstream host.
    #[arg(long, env = "RELAY_POOL_MAX_IDLE_PER_HOST", default_value_t = 100)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle HTTP connections alive.
    #[arg(long, env = "RELAY_POOL_IDLE_TIMEOUT_SECS", default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

impl Config {
    /// Checks the configuration and turns it into the settings the relay runs with.
    pub fn relay_settings(&self) -> Result<RelaySettings, anyhow::Error> {
        let api_key = self
            .openai_api_key
            .clone()
            .filter(|key| !key.is_blank())
            .ok_or_else(|| anyhow!("Missing OPENAI_API_KEY env var"))?;

        if self.upstream_timeout_secs == 0 {
            return Err(anyhow!("Upstream timeout must be at least one second"));
        }
        if self.max_upstream_body_bytes == 0 {
            return Err(anyhow!("Max upstream body size must be positive"));
        }
        if self.max_concurrent_upstream == Some(0) {
            return Err(anyhow!(
                "Max concurrent upstream calls must be positive when set"
            ));
        }

        let settings = RelaySettings::builder()
            .api_key(api_key)
            .upstream_url(self.upstream_url.clone())
            .shape(self.upstream_shape)
            .maybe_default_model(self.default_model.clone())
            .upstream_timeout(Duration::from_secs(self.upstream_timeout_secs))
            .max_upstream_body_bytes(self.max_upstream_body_bytes)
            .maybe_max_concurrent_upstream(self.max_concurrent_upstream)
            .include_raw(self.include_raw)
            .build();

        settings.endpoint().map_err(|e| {
            anyhow!(
                "Upstream URL '{}' cannot be used as a base: {}",
                self.upstream_url,
                e
            )
        })?;

        Ok(settings)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }
}
