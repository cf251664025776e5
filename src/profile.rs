use std::{fmt, ops::RangeInclusive, time::Duration};

use clap::ValueEnum;
use reqwest::Url;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const WALLETS_PATH: &str = "/api/v1/wallets";
pub const MAX_VUS: usize = 100_000;

/// `550e8400-e29b-41d4-a716-446655440000`, the single-wallet target.
pub const BASE_WALLET_ID: Uuid = Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletPool {
  Fixed(Uuid),
  Pool(Vec<Uuid>),
}

impl WalletPool {
  /// Builds a pool by substituting the last digit of [`BASE_WALLET_ID`] with
  /// each value of `digits`. Values above 9 are skipped.
  pub fn numbered(digits: RangeInclusive<u8>) -> Self {
    let ids = digits
      .filter(|digit| *digit <= 9)
      .map(|digit| Uuid::from_u128(BASE_WALLET_ID.as_u128() + u128::from(digit)))
      .collect();
    WalletPool::Pool(ids)
  }

  pub fn ids(&self) -> &[Uuid] {
    match self {
      WalletPool::Fixed(id) => std::slice::from_ref(id),
      WalletPool::Pool(ids) => ids,
    }
  }

  pub fn contains(&self, id: &Uuid) -> bool {
    self.ids().contains(id)
  }
}

/// Inclusive bounds for generated amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmountRange {
  pub min: u64,
  pub max: u64,
}

impl AmountRange {
  pub fn new(min: u64, max: u64) -> Result<Self, ConfigError> {
    if min == 0 || min > max {
      return Err(ConfigError::InvalidAmountRange { min, max });
    }
    Ok(AmountRange { min, max })
  }

  pub fn fixed(amount: u64) -> Self {
    AmountRange {
      min: amount,
      max: amount,
    }
  }

  pub fn contains(&self, amount: u64) -> bool {
    (self.min..=self.max).contains(&amount)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
  /// Single fixed wallet, constant amount of 100.
  Smoke,
  /// Four-wallet pool, amounts uniform in [1, 1000].
  Load,
}

impl Profile {
  pub const ALL: [Profile; 2] = [Profile::Smoke, Profile::Load];

  pub fn name(&self) -> &'static str {
    match self {
      Profile::Smoke => "smoke",
      Profile::Load => "load",
    }
  }

  pub fn settings(&self) -> ProfileSettings {
    match self {
      Profile::Smoke => ProfileSettings {
        description: "single-wallet smoke test",
        wallets: WalletPool::Fixed(BASE_WALLET_ID),
        amounts: AmountRange::fixed(100),
        vus: 100,
        duration: Duration::from_secs(1),
      },
      Profile::Load => ProfileSettings {
        description: "multi-wallet load test",
        wallets: WalletPool::numbered(1..=4),
        amounts: AmountRange { min: 1, max: 1000 },
        vus: 1000,
        duration: Duration::from_secs(5),
      },
    }
  }
}

impl fmt::Display for Profile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone)]
pub struct ProfileSettings {
  pub description: &'static str,
  pub wallets: WalletPool,
  pub amounts: AmountRange,
  pub vus: usize,
  pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct LoadTestConfig {
  pub profile: Profile,
  pub base_url: String,
  pub vus: usize,
  pub duration: Duration,
  /// Pause after every iteration.
  pub sleep: Duration,
  /// Exclusive latency bound for the latency check.
  pub max_latency: Duration,
  pub expected_status: u16,
  pub request_timeout: Duration,
  /// How long in-flight iterations may run after the stop signal.
  pub graceful_stop: Duration,
  pub seed: Option<u64>,
  pub wallets: WalletPool,
  pub amounts: AmountRange,
}

impl LoadTestConfig {
  pub fn from_profile(profile: Profile) -> Self {
    let settings = profile.settings();
    Self {
      profile,
      base_url: DEFAULT_BASE_URL.to_string(),
      vus: settings.vus,
      duration: settings.duration,
      sleep: Duration::from_millis(1),
      max_latency: Duration::from_millis(200),
      expected_status: 200,
      request_timeout: Duration::from_secs(60),
      graceful_stop: Duration::from_secs(30),
      seed: None,
      wallets: settings.wallets,
      amounts: settings.amounts,
    }
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  pub fn with_vus(mut self, vus: usize) -> Self {
    self.vus = vus;
    self
  }

  pub fn with_duration(mut self, duration: Duration) -> Self {
    self.duration = duration;
    self
  }

  pub fn with_sleep(mut self, sleep: Duration) -> Self {
    self.sleep = sleep;
    self
  }

  pub fn with_max_latency(mut self, max_latency: Duration) -> Self {
    self.max_latency = max_latency;
    self
  }

  pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
    self.request_timeout = timeout;
    self
  }

  pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
    self.graceful_stop = graceful_stop;
    self
  }

  pub fn with_seed(mut self, seed: Option<u64>) -> Self {
    self.seed = seed;
    self
  }

  pub fn with_amounts(mut self, amounts: AmountRange) -> Self {
    self.amounts = amounts;
    self
  }

  pub fn with_wallets(mut self, wallets: WalletPool) -> Self {
    self.wallets = wallets;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.vus == 0 {
      return Err(ConfigError::NoVirtualUsers);
    }
    if self.vus > MAX_VUS {
      return Err(ConfigError::TooManyVirtualUsers {
        vus: self.vus,
        max: MAX_VUS,
      });
    }
    if self.duration.is_zero() {
      return Err(ConfigError::ZeroDuration);
    }
    AmountRange::new(self.amounts.min, self.amounts.max)?;
    if self.wallets.ids().is_empty() {
      return Err(ConfigError::EmptyWalletPool);
    }

    let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
      url: self.base_url.clone(),
      reason: reason.to_string(),
    };
    let url = Url::parse(&self.base_url).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
      return Err(invalid("missing host"));
    }
    Ok(())
  }

  /// `POST` target for wallet operations.
  pub fn operations_url(&self) -> String {
    format!("{}{}", self.base_url.trim_end_matches('/'), WALLETS_PATH)
  }

  pub fn wallet_url(&self, wallet_id: &Uuid) -> String {
    format!("{}/{}", self.operations_url(), wallet_id)
  }
}

/// Parses durations such as `5s`, `500ms`, `1m30s` or `250us`.
/// A bare integer is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
  let trimmed = input.trim();
  let parsed = if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
    humantime::parse_duration(&format!("{trimmed}s"))
  } else {
    humantime::parse_duration(trimmed)
  };

  parsed.map_err(|e| ConfigError::InvalidDuration {
    input: input.to_string(),
    reason: e.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn load_profile_pool_has_four_numbered_wallets() {
    let ids: Vec<String> = Profile::Load
      .settings()
      .wallets
      .ids()
      .iter()
      .map(Uuid::to_string)
      .collect();
    assert_eq!(
      ids,
      vec![
        "550e8400-e29b-41d4-a716-446655440001",
        "550e8400-e29b-41d4-a716-446655440002",
        "550e8400-e29b-41d4-a716-446655440003",
        "550e8400-e29b-41d4-a716-446655440004",
      ]
    );
  }

  #[test]
  fn smoke_profile_targets_one_wallet_with_constant_amount() {
    let settings = Profile::Smoke.settings();
    assert_eq!(
      settings.wallets.ids()[0].to_string(),
      "550e8400-e29b-41d4-a716-446655440000"
    );
    assert_eq!(settings.wallets.ids().len(), 1);
    assert_eq!(settings.amounts, AmountRange::fixed(100));
  }

  #[test]
  fn numbered_skips_values_beyond_one_digit() {
    assert_eq!(WalletPool::numbered(8..=12).ids().len(), 2);
  }

  #[test]
  fn defaults_follow_profile() {
    let config = LoadTestConfig::from_profile(Profile::Load);
    assert_eq!(config.vus, 1000);
    assert_eq!(config.duration, Duration::from_secs(5));
    assert_eq!(config.sleep, Duration::from_millis(1));
    assert_eq!(config.max_latency, Duration::from_millis(200));
    assert_eq!(config.operations_url(), "http://localhost:8080/api/v1/wallets");
    assert!(config.validate().is_ok());
  }

  #[test]
  fn urls_tolerate_trailing_slash() {
    let config = LoadTestConfig::from_profile(Profile::Smoke).with_base_url("http://10.0.0.5:9000/");
    assert_eq!(config.operations_url(), "http://10.0.0.5:9000/api/v1/wallets");
    assert_eq!(
      config.wallet_url(&BASE_WALLET_ID),
      "http://10.0.0.5:9000/api/v1/wallets/550e8400-e29b-41d4-a716-446655440000"
    );
  }

  #[test]
  fn validate_rejects_bad_settings() {
    let base = LoadTestConfig::from_profile(Profile::Smoke);

    assert_eq!(
      base.clone().with_vus(0).validate(),
      Err(ConfigError::NoVirtualUsers)
    );
    assert_eq!(
      base.clone().with_duration(Duration::ZERO).validate(),
      Err(ConfigError::ZeroDuration)
    );
    assert_eq!(
      base
        .clone()
        .with_amounts(AmountRange { min: 10, max: 1 })
        .validate(),
      Err(ConfigError::InvalidAmountRange { min: 10, max: 1 })
    );
    assert_eq!(
      base.clone().with_wallets(WalletPool::Pool(vec![])).validate(),
      Err(ConfigError::EmptyWalletPool)
    );
    assert!(matches!(
      base.clone().with_base_url("ftp://localhost").validate(),
      Err(ConfigError::InvalidBaseUrl { .. })
    ));
    assert!(matches!(
      base.with_base_url("localhost:8080").validate(),
      Err(ConfigError::InvalidBaseUrl { .. })
    ));
  }

  #[test]
  fn validate_bounds_virtual_users() {
    let base = LoadTestConfig::from_profile(Profile::Smoke);
    assert!(base.clone().with_vus(MAX_VUS).validate().is_ok());
    assert_eq!(
      base.with_vus(usize::MAX / 4).validate(),
      Err(ConfigError::TooManyVirtualUsers {
        vus: usize::MAX / 4,
        max: MAX_VUS
      })
    );
  }

  #[test]
  fn malformed_duration_reports_input() {
    let err = parse_duration("5x").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDuration { ref input, .. } if input == "5x"));
  }

  #[test]
  fn amount_range_rejects_zero() {
    assert!(AmountRange::new(0, 10).is_err());
    assert!(AmountRange::new(1, 1).is_ok());
  }

  #[test]
  fn parses_duration_units() {
    assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
    assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
    assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
    assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
    assert_eq!(parse_duration(" 3 ").unwrap(), Duration::from_secs(3));
  }

  #[test]
  fn rejects_malformed_durations() {
    for input in ["", "ms", "1x", "-1s", "five seconds"] {
      assert!(parse_duration(input).is_err(), "{input} should not parse");
    }
  }
}
