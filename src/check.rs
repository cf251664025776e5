use std::time::Duration;

use serde::Serialize;

/// Named assertion evaluated against every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
  StatusIs(u16),
  LatencyBelow(Duration),
}

impl Check {
  pub fn name(&self) -> String {
    match self {
      Check::StatusIs(status) => format!("is status {status}"),
      Check::LatencyBelow(bound) => format!("response time < {bound:?}"),
    }
  }

  /// A missing status means the request never produced a response.
  pub fn passes(&self, status: Option<u16>, elapsed: Duration) -> bool {
    match self {
      Check::StatusIs(expected) => status == Some(*expected),
      Check::LatencyBelow(bound) => elapsed < *bound,
    }
  }
}

/// The two checks every iteration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checks {
  pub status: Check,
  pub latency: Check,
}

impl Checks {
  pub fn new(expected_status: u16, max_latency: Duration) -> Self {
    Checks {
      status: Check::StatusIs(expected_status),
      latency: Check::LatencyBelow(max_latency),
    }
  }

  pub fn evaluate(&self, status: Option<u16>, elapsed: Duration) -> CheckOutcome {
    CheckOutcome {
      status_ok: self.status.passes(status, elapsed),
      latency_ok: self.latency.passes(status, elapsed),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CheckOutcome {
  pub status_ok: bool,
  pub latency_ok: bool,
}

impl CheckOutcome {
  pub fn all_passed(&self) -> bool {
    self.status_ok && self.latency_ok
  }
}
