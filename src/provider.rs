mod direct;
mod html_proxy;
mod rapidapi;
mod snapsave;
mod tikwm;

use std::{fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use tracing::warn;

use crate::{
  config::Config,
  media::{Extraction, ExtractionAttempt, MediaRequest},
  platform::Platform,
  Error, Result,
};

pub use direct::DirectPage;
pub use html_proxy::HtmlProxy;
pub use rapidapi::{RapidApi, RapidApiSchema};
pub use snapsave::Snapsave;
pub use tikwm::Tikwm;

#[async_trait]
pub trait Provider: Send + Sync {
  fn id(&self) -> &str;

  async fn extract(&self, request: &MediaRequest) -> Result<Extraction>;

  // never fails: provider errors become a failed attempt.
  async fn attempt(&self, request: &MediaRequest) -> ExtractionAttempt {
    match self.extract(request).await {
      Ok(extraction) => ExtractionAttempt::succeeded(self.id(), extraction),
      Err(err) => ExtractionAttempt::failed(self.id(), &err),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
  Direct,
  AllOrigins,
  Snapinsta,
  Snapsave,
  Tikwm,
  RapidApiInstagram,
  RapidApiTikTok,
}

impl ProviderKind {
  pub const ALL: [ProviderKind; 7] = [
    ProviderKind::Direct,
    ProviderKind::AllOrigins,
    ProviderKind::Snapinsta,
    ProviderKind::Snapsave,
    ProviderKind::Tikwm,
    ProviderKind::RapidApiInstagram,
    ProviderKind::RapidApiTikTok,
  ];

  pub fn id(&self) -> &'static str {
    match self {
      ProviderKind::Direct => "direct",
      ProviderKind::AllOrigins => "allorigins",
      ProviderKind::Snapinsta => "snapinsta",
      ProviderKind::Snapsave => "snapsave",
      ProviderKind::Tikwm => "tikwm",
      ProviderKind::RapidApiInstagram => "rapidapi-instagram",
      ProviderKind::RapidApiTikTok => "rapidapi-tiktok",
    }
  }

  /// `None` when the provider needs configuration that is absent.
  pub fn build(
    self,
    config: &Config,
    client: &reqwest::Client,
  ) -> Option<Arc<dyn Provider>> {
    let endpoints = &config.endpoints;
    let client = client.clone();

    let provider: Arc<dyn Provider> = match self {
      ProviderKind::Direct => Arc::new(DirectPage::new(client)),
      ProviderKind::AllOrigins => Arc::new(HtmlProxy::new(
        self.id(),
        &endpoints.allorigins,
        client,
      )),
      ProviderKind::Snapinsta => Arc::new(HtmlProxy::new(
        self.id(),
        &endpoints.snapinsta,
        client,
      )),
      ProviderKind::Snapsave => {
        Arc::new(Snapsave::new(&endpoints.snapsave, client))
      }
      ProviderKind::Tikwm => Arc::new(Tikwm::new(&endpoints.tikwm, client)),
      ProviderKind::RapidApiInstagram | ProviderKind::RapidApiTikTok => {
        let key = config.rapidapi_key.as_deref()?;
        let (schema, host) = match self {
          ProviderKind::RapidApiInstagram => (
            RapidApiSchema::InstagramMedia,
            &endpoints.rapidapi_instagram_host,
          ),
          _ => (
            RapidApiSchema::TikTokNoWatermark,
            &endpoints.rapidapi_tiktok_host,
          ),
        };
        Arc::new(RapidApi::new(self.id(), schema, host, key, client))
      }
    };

    Some(provider)
  }
}

impl fmt::Display for ProviderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.id())
  }
}

impl FromStr for ProviderKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let id = s.trim().to_ascii_lowercase();
    ProviderKind::ALL
      .into_iter()
      .find(|kind| kind.id() == id)
      .ok_or_else(|| Error::Config(format!("unknown provider `{}`", s.trim())))
  }
}

/// Ordered provider lists, one per platform.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
  instagram: Vec<Arc<dyn Provider>>,
  tiktok: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
  pub fn new(
    instagram: Vec<Arc<dyn Provider>>,
    tiktok: Vec<Arc<dyn Provider>>,
  ) -> Self {
    Self { instagram, tiktok }
  }

  pub fn from_config(config: &Config, client: &reqwest::Client) -> Self {
    let build = |kinds: &[ProviderKind], platform: Platform| {
      kinds
        .iter()
        .filter_map(|kind| {
          let provider = kind.build(config, client);
          if provider.is_none() {
            warn!(
              provider = %kind,
              %platform,
              "skipping provider, RAPIDAPI_KEY not set"
            );
          }
          provider
        })
        .collect::<Vec<_>>()
    };

    Self::new(
      build(config.instagram_providers.as_slice(), Platform::Instagram),
      build(config.tiktok_providers.as_slice(), Platform::TikTok),
    )
  }

  pub fn providers(&self, platform: Platform) -> &[Arc<dyn Provider>] {
    match platform {
      Platform::Instagram => &self.instagram,
      Platform::TikTok => &self.tiktok,
      Platform::Unknown => &[],
    }
  }

  pub fn ids(&self, platform: Platform) -> Vec<&str> {
    self.providers(platform).iter().map(|p| p.id()).collect()
  }
}

/// Send `request` and return the body, failing on non-2xx statuses.
pub(crate) async fn fetch_text(
  provider: &str,
  request: reqwest::RequestBuilder,
) -> Result<String> {
  let resp = request.send().await?;
  let status = resp.status();
  if !status.is_success() {
    let reason = format!("upstream returned {status}");
    return Err(Error::provider(provider, reason));
  }

  Ok(resp.text().await?)
}

#[cfg(test)]
mod test {
  use std::collections::HashMap;

  use super::*;

  fn config(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
  }

  #[test]
  fn test_provider_kind_from_str() {
    for kind in ProviderKind::ALL {
      assert_eq!(kind.id().parse::<ProviderKind>().unwrap(), kind);
    }
    assert_eq!(" TikWM ".parse::<ProviderKind>().unwrap(), ProviderKind::Tikwm);
    assert!(matches!("nope".parse::<ProviderKind>(), Err(Error::Config(_))));
  }

  #[test]
  fn test_registry_skips_rapidapi_without_key() {
    let client = reqwest::Client::new();
    let registry = ProviderRegistry::from_config(&config(&[]), &client);

    assert_eq!(
      registry.ids(Platform::Instagram),
      vec!["direct", "allorigins", "snapinsta", "snapsave"]
    );
    assert_eq!(
      registry.ids(Platform::TikTok),
      vec!["direct", "tikwm", "allorigins"]
    );
    assert!(registry.providers(Platform::Unknown).is_empty());
  }

  #[test]
  fn test_registry_order_from_config() {
    let client = reqwest::Client::new();
    let config = config(&[
      ("RAPIDAPI_KEY", "secret"),
      ("TIKTOK_PROVIDERS", "rapidapi-tiktok, tikwm"),
      ("INSTAGRAM_PROVIDERS", "snapsave,direct"),
    ]);
    let registry = ProviderRegistry::from_config(&config, &client);

    assert_eq!(
      registry.ids(Platform::TikTok),
      vec!["rapidapi-tiktok", "tikwm"]
    );
    assert_eq!(registry.ids(Platform::Instagram), vec!["snapsave", "direct"]);
  }
}
