use std::{collections::BTreeMap, fmt::Write as _, fs, path::Path};

use serde::Serialize;

use crate::{
  error::{LoadTestError, LoadTestResult},
  probe::BalanceReport,
  profile::Profile,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckSummary {
  pub name: String,
  pub passes: u64,
  pub fails: u64,
}

impl CheckSummary {
  pub fn pass_rate(&self) -> f64 {
    let total = self.passes + self.fails;
    if total == 0 {
      return 0.0;
    }
    self.passes as f64 / total as f64
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
  pub avg_ms: f64,
  pub min_ms: f64,
  pub med_ms: f64,
  pub max_ms: f64,
  pub p90_ms: f64,
  pub p95_ms: f64,
  pub p99_ms: f64,
}

/// End-of-run totals, printed to stdout and optionally exported as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
  pub profile: Profile,
  pub target: String,
  pub vus: usize,
  pub duration_ms: u64,
  pub elapsed_ms: u64,
  pub iterations: u64,
  pub iterations_per_sec: f64,
  pub checks: Vec<CheckSummary>,
  pub http_reqs: u64,
  pub http_req_failed: u64,
  pub status_codes: BTreeMap<u16, u64>,
  pub transport_errors: BTreeMap<String, u64>,
  pub operations: BTreeMap<String, u64>,
  pub wallets: BTreeMap<String, u64>,
  pub latency: LatencySummary,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub balances: Vec<BalanceReport>,
}

impl RunSummary {
  pub fn checks_total(&self) -> u64 {
    self.checks.iter().map(|c| c.passes + c.fails).sum()
  }

  pub fn checks_failed(&self) -> u64 {
    self.checks.iter().map(|c| c.fails).sum()
  }

  pub fn export(&self, path: &Path) -> LoadTestResult<()> {
    let json = serde_json::to_string_pretty(self)?;
    fs::write(path, json).map_err(|source| LoadTestError::SummaryExport {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Renders the summary in the layout of k6's end-of-test report.
  pub fn render(&self) -> String {
    let mut out = String::new();
    let _ = self.render_into(&mut out);
    out
  }

  fn render_into(&self, out: &mut String) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(
      out,
      "  profile: {} | target: {} | vus: {} | duration: {}ms",
      self.profile, self.target, self.vus, self.duration_ms
    )?;
    writeln!(out)?;

    for check in &self.checks {
      let mark = if check.fails == 0 { '✓' } else { '✗' };
      writeln!(out, "     {mark} {}", check.name)?;
      if check.fails > 0 {
        writeln!(
          out,
          "      ↳  {:.0}% : ✓ {} / ✗ {}",
          check.pass_rate() * 100.0,
          check.passes,
          check.fails
        )?;
      }
    }
    writeln!(out)?;

    let total = self.checks_total();
    let failed = self.checks_failed();
    let rate = if total == 0 {
      0.0
    } else {
      (total - failed) as f64 / total as f64 * 100.0
    };
    let elapsed = self.elapsed_ms as f64 / 1_000.0;
    let per_sec = |n: u64| if elapsed > 0.0 { n as f64 / elapsed } else { 0.0 };

    writeln!(
      out,
      "     checks.........................: {rate:.2}% ✓ {} ✗ {}",
      total - failed,
      failed
    )?;
    writeln!(
      out,
      "     http_req_duration..............: avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
      self.latency.avg_ms,
      self.latency.min_ms,
      self.latency.med_ms,
      self.latency.max_ms,
      self.latency.p90_ms,
      self.latency.p95_ms
    )?;
    let failed_rate = if self.http_reqs == 0 {
      0.0
    } else {
      self.http_req_failed as f64 / self.http_reqs as f64 * 100.0
    };
    writeln!(
      out,
      "     http_req_failed................: {failed_rate:.2}% ✓ {} ✗ {}",
      self.http_req_failed,
      self.http_reqs - self.http_req_failed
    )?;
    writeln!(
      out,
      "     http_reqs......................: {} {:.2}/s",
      self.http_reqs,
      per_sec(self.http_reqs)
    )?;
    writeln!(
      out,
      "     iterations.....................: {} {:.2}/s",
      self.iterations, self.iterations_per_sec
    )?;

    if !self.status_codes.is_empty() {
      let codes: Vec<String> = self
        .status_codes
        .iter()
        .map(|(code, count)| format!("{code}={count}"))
        .collect();
      writeln!(out, "     status_codes...................: {}", codes.join(" "))?;
    }
    if !self.transport_errors.is_empty() {
      let errors: Vec<String> = self
        .transport_errors
        .iter()
        .map(|(kind, count)| format!("{kind}={count}"))
        .collect();
      writeln!(out, "     transport_errors...............: {}", errors.join(" "))?;
    }
    let ops: Vec<String> = self
      .operations
      .iter()
      .map(|(op, count)| format!("{op}={count}"))
      .collect();
    writeln!(out, "     operations.....................: {}", ops.join(" "))?;

    if !self.balances.is_empty() {
      writeln!(out)?;
      writeln!(out, "     balances:")?;
      for report in &self.balances {
        match (report.balance, &report.error) {
          (Some(balance), _) => writeln!(out, "       {} {balance:.2}", report.wallet_id)?,
          (None, Some(error)) => writeln!(out, "       {} unavailable ({error})", report.wallet_id)?,
          (None, None) => writeln!(out, "       {} unavailable", report.wallet_id)?,
        }
      }
    }
    Ok(())
  }
}
