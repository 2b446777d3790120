use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod cache;
mod config;
mod error;
mod media;
mod parser;
mod platform;
mod provider;
mod rate_limit;
mod resolver;
#[cfg(test)]
mod test_util;
mod util;

pub use error::{Error, Result};
pub use util::W;

use crate::{
  api::AppState, config::Config, platform::Platform,
  rate_limit::RateLimiter, resolver::Resolver,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let config = Config::from_env().context("failed to read configuration")?;

  let client = util::provider_client(config.provider_timeout)?;
  let resolver = Resolver::from_config(&config, &client);
  for platform in [Platform::Instagram, Platform::TikTok] {
    let ids = resolver.registry().ids(platform);
    if ids.is_empty() {
      warn!(%platform, "no providers configured");
    }
    info!(%platform, providers = ?ids, "provider chain");
  }

  let state = AppState {
    resolver: Arc::new(resolver),
    limiter: Arc::new(RateLimiter::new(
      config.rate_limit_max,
      config.rate_limit_window,
    )),
    relay_client: util::relay_client(config.provider_timeout)?,
  };

  let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
  info!("listening on {addr}");

  axum::Server::bind(&addr)
    .serve(api::router(state).into_make_service())
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

async fn shutdown_signal() {
  if let Err(err) = tokio::signal::ctrl_c().await {
    warn!("failed to listen for ctrl-c: {err}");
    std::future::pending::<()>().await;
  }
  info!("shutting down");
}
