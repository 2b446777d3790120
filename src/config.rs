use std::{str::FromStr, time::Duration};

use crate::{provider::ProviderKind, Error, Result};

const DEFAULT_PORT: u16 = 10000;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 15;
// a post fetched within this window is served from memory
const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;
const DEFAULT_CACHE_CAPACITY: usize = 256;
const DEFAULT_RATE_LIMIT_MAX: u32 = 25;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 30;

const DEFAULT_INSTAGRAM_PROVIDERS: &str =
  "direct,allorigins,snapinsta,snapsave,rapidapi-instagram";
const DEFAULT_TIKTOK_PROVIDERS: &str =
  "direct,tikwm,rapidapi-tiktok,allorigins";

const DEFAULT_ALLORIGINS_ENDPOINT: &str = "https://api.allorigins.win/raw";
const DEFAULT_SNAPINSTA_ENDPOINT: &str = "https://snapinsta.app/api.php";
const DEFAULT_SNAPSAVE_ENDPOINT: &str = "https://snapsave.io/api/ajaxSearch";
const DEFAULT_TIKWM_ENDPOINT: &str = "https://www.tikwm.com/api/";
const DEFAULT_RAPIDAPI_INSTAGRAM_HOST: &str =
  "instagram-downloader-download-instagram-videos-stories.p.rapidapi.com";
const DEFAULT_RAPIDAPI_TIKTOK_HOST: &str =
  "tiktok-video-no-watermark2.p.rapidapi.com";

#[derive(Debug, Clone)]
pub struct Endpoints {
  pub allorigins: String,
  pub snapinsta: String,
  pub snapsave: String,
  pub tikwm: String,
  pub rapidapi_instagram_host: String,
  pub rapidapi_tiktok_host: String,
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
  pub port: u16,
  pub provider_timeout: Duration,
  pub cache_ttl: Duration,
  pub cache_capacity: usize,
  pub rate_limit_max: u32,
  pub rate_limit_window: Duration,
  pub videos_first: bool,
  pub rapidapi_key: Option<String>,
  pub instagram_providers: Vec<ProviderKind>,
  pub tiktok_providers: Vec<ProviderKind>,
  pub endpoints: Endpoints,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let var = |key: &str| {
      lookup(key)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
    };
    let string = |key: &str, default: &str| {
      var(key).unwrap_or_else(|| default.to_owned())
    };

    let endpoints = Endpoints {
      allorigins: string("ALLORIGINS_ENDPOINT", DEFAULT_ALLORIGINS_ENDPOINT),
      snapinsta: string("SNAPINSTA_ENDPOINT", DEFAULT_SNAPINSTA_ENDPOINT),
      snapsave: string("SNAPSAVE_ENDPOINT", DEFAULT_SNAPSAVE_ENDPOINT),
      tikwm: string("TIKWM_ENDPOINT", DEFAULT_TIKWM_ENDPOINT),
      rapidapi_instagram_host: string(
        "RAPIDAPI_INSTAGRAM_HOST",
        DEFAULT_RAPIDAPI_INSTAGRAM_HOST,
      ),
      rapidapi_tiktok_host: string(
        "RAPIDAPI_TIKTOK_HOST",
        DEFAULT_RAPIDAPI_TIKTOK_HOST,
      ),
    };

    let config = Config {
      port: parse(&var, "PORT", DEFAULT_PORT)?,
      provider_timeout: Duration::from_secs(parse(
        &var,
        "PROVIDER_TIMEOUT_SECS",
        DEFAULT_PROVIDER_TIMEOUT_SECS,
      )?),
      cache_ttl: Duration::from_secs(parse(
        &var,
        "CACHE_TTL_SECS",
        DEFAULT_CACHE_TTL_SECS,
      )?),
      cache_capacity: parse(&var, "CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY)?,
      rate_limit_max: parse(&var, "RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?,
      rate_limit_window: Duration::from_secs(parse(
        &var,
        "RATE_LIMIT_WINDOW_SECS",
        DEFAULT_RATE_LIMIT_WINDOW_SECS,
      )?),
      videos_first: parse(&var, "VIDEOS_FIRST", false)?,
      rapidapi_key: var("RAPIDAPI_KEY"),
      instagram_providers: provider_list(&string(
        "INSTAGRAM_PROVIDERS",
        DEFAULT_INSTAGRAM_PROVIDERS,
      ))?,
      tiktok_providers: provider_list(&string(
        "TIKTOK_PROVIDERS",
        DEFAULT_TIKTOK_PROVIDERS,
      ))?,
      endpoints,
    };

    if config.provider_timeout.is_zero() {
      return Err(Error::Config(
        "PROVIDER_TIMEOUT_SECS must be positive".into(),
      ));
    }

    Ok(config)
  }
}

fn parse<T: FromStr>(
  var: &impl Fn(&str) -> Option<String>,
  key: &str,
  default: T,
) -> Result<T> {
  match var(key) {
    None => Ok(default),
    Some(value) => value
      .parse()
      .map_err(|_| Error::Config(format!("{key}: cannot parse `{value}`"))),
  }
}

fn provider_list(value: &str) -> Result<Vec<ProviderKind>> {
  value
    .split(',')
    .filter(|id| !id.trim().is_empty())
    .map(str::parse)
    .collect()
}

#[cfg(test)]
mod test {
  use std::collections::HashMap;

  use super::*;

  fn config(vars: &[(&str, &str)]) -> Result<Config> {
    let vars: HashMap<String, String> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    Config::from_lookup(|key| vars.get(key).cloned())
  }

  #[test]
  fn test_defaults() {
    let config = config(&[]).unwrap();

    assert_eq!(config.port, 10000);
    assert_eq!(config.provider_timeout, Duration::from_secs(15));
    assert_eq!(config.cache_ttl, Duration::from_secs(300));
    assert_eq!(config.rate_limit_max, 25);
    assert!(!config.videos_first);
    assert!(config.rapidapi_key.is_none());
    assert_eq!(config.instagram_providers[0], ProviderKind::Direct);
    assert_eq!(
      config.tiktok_providers,
      vec![
        ProviderKind::Direct,
        ProviderKind::Tikwm,
        ProviderKind::RapidApiTikTok,
        ProviderKind::AllOrigins
      ]
    );
    assert_eq!(config.endpoints.tikwm, "https://www.tikwm.com/api/");
  }

  #[test]
  fn test_overrides() {
    let config = config(&[
      ("PORT", "8080"),
      ("PROVIDER_TIMEOUT_SECS", "3"),
      ("VIDEOS_FIRST", "true"),
      ("RAPIDAPI_KEY", " key "),
      ("TIKTOK_PROVIDERS", "tikwm,,direct"),
      ("TIKWM_ENDPOINT", "http://127.0.0.1:1/api/"),
    ])
    .unwrap();

    assert_eq!(config.port, 8080);
    assert_eq!(config.provider_timeout, Duration::from_secs(3));
    assert!(config.videos_first);
    assert_eq!(config.rapidapi_key.as_deref(), Some("key"));
    assert_eq!(
      config.tiktok_providers,
      vec![ProviderKind::Tikwm, ProviderKind::Direct]
    );
    assert_eq!(config.endpoints.tikwm, "http://127.0.0.1:1/api/");
  }

  #[test]
  fn test_blank_values_use_defaults() {
    let config = config(&[("PORT", "  "), ("RAPIDAPI_KEY", "")]).unwrap();
    assert_eq!(config.port, 10000);
    assert!(config.rapidapi_key.is_none());
  }

  #[test]
  fn test_malformed_values() {
    assert!(matches!(config(&[("PORT", "http")]), Err(Error::Config(_))));
    assert!(matches!(
      config(&[("INSTAGRAM_PROVIDERS", "direct,bogus")]),
      Err(Error::Config(_))
    ));
    assert!(matches!(
      config(&[("PROVIDER_TIMEOUT_SECS", "0")]),
      Err(Error::Config(_))
    ));
  }
}
