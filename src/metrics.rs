use std::{collections::BTreeMap, time::Duration};

use hdrhistogram::Histogram;
use serde::Serialize;
use uuid::Uuid;

use crate::{
  check::{CheckOutcome, Checks},
  profile::LoadTestConfig,
  report::{CheckSummary, LatencySummary, RunSummary},
  request::OperationType,
};

/// Why a request produced no usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportError {
  Timeout,
  Connect,
  Body,
  Other,
}

impl TransportError {
  pub fn classify(err: &reqwest::Error) -> Self {
    if err.is_timeout() {
      TransportError::Timeout
    } else if err.is_connect() {
      TransportError::Connect
    } else if err.is_body() || err.is_decode() {
      TransportError::Body
    } else {
      TransportError::Other
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      TransportError::Timeout => "timeout",
      TransportError::Connect => "connect",
      TransportError::Body => "body",
      TransportError::Other => "other",
    }
  }
}

#[derive(Debug, Clone)]
pub struct IterationSample {
  pub vu: usize,
  pub operation: OperationType,
  pub wallet_id: Uuid,
  pub status: Option<u16>,
  pub latency: Duration,
  pub checks: CheckOutcome,
  pub transport_error: Option<TransportError>,
}

impl IterationSample {
  /// Mirrors k6's `http_req_failed`: no response, or a status outside 200..400.
  pub fn request_failed(&self) -> bool {
    match self.status {
      Some(status) => !(200..400).contains(&status) || self.transport_error.is_some(),
      None => true,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CheckCounter {
  passes: u64,
  fails: u64,
}

impl CheckCounter {
  fn record(&mut self, passed: bool) {
    if passed {
      self.passes += 1;
    } else {
      self.fails += 1;
    }
  }
}

pub struct MetricsRecorder {
  iterations: u64,
  status_check: CheckCounter,
  latency_check: CheckCounter,
  failed_requests: u64,
  status_codes: BTreeMap<u16, u64>,
  transport_errors: BTreeMap<TransportError, u64>,
  operations: BTreeMap<OperationType, u64>,
  wallets: BTreeMap<Uuid, u64>,
  latency_us: Histogram<u64>,
}

impl Default for MetricsRecorder {
  fn default() -> Self {
    Self::new()
  }
}

impl MetricsRecorder {
  pub fn new() -> Self {
    let mut latency_us = Histogram::<u64>::new(3).expect("3 sigfigs is always valid");
    latency_us.auto(true);

    MetricsRecorder {
      iterations: 0,
      status_check: CheckCounter::default(),
      latency_check: CheckCounter::default(),
      failed_requests: 0,
      status_codes: BTreeMap::new(),
      transport_errors: BTreeMap::new(),
      operations: BTreeMap::new(),
      wallets: BTreeMap::new(),
      latency_us,
    }
  }

  pub fn record(&mut self, sample: &IterationSample) {
    self.iterations += 1;
    self.status_check.record(sample.checks.status_ok);
    self.latency_check.record(sample.checks.latency_ok);

    if sample.request_failed() {
      self.failed_requests += 1;
    }
    if let Some(status) = sample.status {
      *self.status_codes.entry(status).or_insert(0) += 1;
    }
    if let Some(kind) = sample.transport_error {
      *self.transport_errors.entry(kind).or_insert(0) += 1;
    }
    *self.operations.entry(sample.operation).or_insert(0) += 1;
    *self.wallets.entry(sample.wallet_id).or_insert(0) += 1;

    let micros = u64::try_from(sample.latency.as_micros()).unwrap_or(u64::MAX);
    let _ = self.latency_us.record(micros);
  }

  pub fn iterations(&self) -> u64 {
    self.iterations
  }

  pub fn summary(&self, config: &LoadTestConfig, elapsed: Duration) -> RunSummary {
    let checks = Checks::new(config.expected_status, config.max_latency);
    let secs = elapsed.as_secs_f64();
    let iterations_per_sec = if secs > 0.0 {
      self.iterations as f64 / secs
    } else {
      0.0
    };

    RunSummary {
      profile: config.profile,
      target: config.operations_url(),
      vus: config.vus,
      duration_ms: millis(config.duration),
      elapsed_ms: millis(elapsed),
      iterations: self.iterations,
      iterations_per_sec,
      checks: vec![
        CheckSummary {
          name: checks.status.name(),
          passes: self.status_check.passes,
          fails: self.status_check.fails,
        },
        CheckSummary {
          name: checks.latency.name(),
          passes: self.latency_check.passes,
          fails: self.latency_check.fails,
        },
      ],
      http_reqs: self.iterations,
      http_req_failed: self.failed_requests,
      status_codes: self.status_codes.clone(),
      transport_errors: self
        .transport_errors
        .iter()
        .map(|(kind, count)| (kind.as_str().to_string(), *count))
        .collect(),
      operations: self
        .operations
        .iter()
        .map(|(op, count)| (op.to_string(), *count))
        .collect(),
      wallets: self
        .wallets
        .iter()
        .map(|(id, count)| (id.to_string(), *count))
        .collect(),
      latency: self.latency_summary(),
      balances: Vec::new(),
    }
  }

  fn latency_summary(&self) -> LatencySummary {
    let h = &self.latency_us;
    if h.is_empty() {
      return LatencySummary::default();
    }
    let ms = |us: u64| us as f64 / 1_000.0;

    LatencySummary {
      avg_ms: h.mean() / 1_000.0,
      min_ms: ms(h.min()),
      med_ms: ms(h.value_at_quantile(0.5)),
      max_ms: ms(h.max()),
      p90_ms: ms(h.value_at_quantile(0.90)),
      p95_ms: ms(h.value_at_quantile(0.95)),
      p99_ms: ms(h.value_at_quantile(0.99)),
    }
  }
}

fn millis(duration: Duration) -> u64 {
  u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::profile::{Profile, BASE_WALLET_ID};

  fn sample(status: Option<u16>, latency_ms: u64, operation: OperationType) -> IterationSample {
    let checks = Checks::new(200, Duration::from_millis(200));
    let latency = Duration::from_millis(latency_ms);
    IterationSample {
      vu: 0,
      operation,
      wallet_id: BASE_WALLET_ID,
      status,
      latency,
      checks: checks.evaluate(status, latency),
      transport_error: status.is_none().then_some(TransportError::Connect),
    }
  }

  #[test]
  fn empty_recorder_produces_zeroed_summary() {
    let config = LoadTestConfig::from_profile(Profile::Smoke);
    let summary = MetricsRecorder::new().summary(&config, Duration::from_secs(1));

    assert_eq!(summary.iterations, 0);
    assert_eq!(summary.latency, LatencySummary::default());
    assert_eq!(summary.checks_total(), 0);
  }

  #[test]
  fn counts_checks_statuses_and_operations() {
    let mut recorder = MetricsRecorder::new();
    recorder.record(&sample(Some(200), 10, OperationType::Deposit));
    recorder.record(&sample(Some(200), 250, OperationType::Withdraw));
    recorder.record(&sample(Some(500), 20, OperationType::Deposit));
    recorder.record(&sample(None, 5, OperationType::Withdraw));

    let config = LoadTestConfig::from_profile(Profile::Smoke);
    let summary = recorder.summary(&config, Duration::from_secs(2));

    assert_eq!(summary.iterations, 4);
    assert_eq!(summary.iterations_per_sec, 2.0);
    assert_eq!(summary.http_req_failed, 2);
    assert_eq!(summary.status_codes.get(&200), Some(&2));
    assert_eq!(summary.status_codes.get(&500), Some(&1));
    assert_eq!(summary.transport_errors.get("connect"), Some(&1));
    assert_eq!(summary.operations.get("DEPOSIT"), Some(&2));
    assert_eq!(summary.operations.get("WITHDRAW"), Some(&2));
    assert_eq!(
      summary.wallets.get("550e8400-e29b-41d4-a716-446655440000"),
      Some(&4)
    );

    let status = &summary.checks[0];
    assert_eq!(status.name, "is status 200");
    assert_eq!((status.passes, status.fails), (2, 2));
    let latency = &summary.checks[1];
    assert_eq!(latency.name, "response time < 200ms");
    assert_eq!((latency.passes, latency.fails), (3, 1));
    assert_eq!(summary.checks_failed(), 3);
  }

  #[test]
  fn latency_percentiles_are_reported_in_millis() {
    let mut recorder = MetricsRecorder::new();
    for ms in 1..=100 {
      recorder.record(&sample(Some(200), ms, OperationType::Deposit));
    }

    let config = LoadTestConfig::from_profile(Profile::Load);
    let latency = recorder.summary(&config, Duration::from_secs(1)).latency;

    assert!((latency.min_ms - 1.0).abs() < 0.01);
    assert!((latency.max_ms - 100.0).abs() < 0.1);
    assert!((latency.med_ms - 50.0).abs() < 0.1);
    assert!((latency.p95_ms - 95.0).abs() < 0.1);
    assert!((latency.avg_ms - 50.5).abs() < 0.1);
  }

  #[test]
  fn redirects_are_not_failed_requests() {
    assert!(!sample(Some(302), 1, OperationType::Deposit).request_failed());
    assert!(sample(Some(422), 1, OperationType::Deposit).request_failed());
  }
}
