use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
  #[error("at least one virtual user is required")]
  NoVirtualUsers,

  #[error("{vus} virtual users requested, at most {max} are supported")]
  TooManyVirtualUsers { vus: usize, max: usize },

  #[error("run duration must be greater than zero")]
  ZeroDuration,

  #[error("invalid amount range [{min}, {max}]: amounts must be positive and min <= max")]
  InvalidAmountRange { min: u64, max: u64 },

  #[error("wallet pool is empty")]
  EmptyWalletPool,

  #[error("invalid base url `{url}`: {reason}")]
  InvalidBaseUrl { url: String, reason: String },

  #[error("invalid duration `{input}`: {reason}")]
  InvalidDuration { input: String, reason: String },
}

#[derive(Error, Debug)]
pub enum LoadTestError {
  #[error("{0}")]
  Config(#[from] ConfigError),

  #[error("failed to build http client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("metrics aggregator stopped unexpectedly: {0}")]
  Aggregator(String),

  #[error("failed to write summary to {path}: {source}")]
  SummaryExport {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to encode summary: {0}")]
  SummaryEncode(#[from] serde_json::Error),

  #[error("failed to bind stub server on {addr}: {reason}")]
  StubBind { addr: SocketAddr, reason: String },

  #[error("{failed} of {total} checks failed")]
  ChecksFailed { failed: u64, total: u64 },
}

pub type LoadTestResult<T> = Result<T, LoadTestError>;
