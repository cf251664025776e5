use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info};

use crate::{profile::LoadTestConfig, request::WalletBalance};

/// Balance of one wallet as read back after the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceReport {
  pub wallet_id: String,
  pub status: Option<u16>,
  pub balance: Option<f64>,
  pub error: Option<String>,
}

impl BalanceReport {
  fn unavailable(wallet_id: String, status: Option<u16>, error: String) -> Self {
    BalanceReport {
      wallet_id,
      status,
      balance: None,
      error: Some(error),
    }
  }
}

/// Reads `GET /api/v1/wallets/{uuid}` for every wallet the profile targets.
/// Failures are reported per wallet and never abort the probe.
pub async fn probe_balances(client: &Client, config: &LoadTestConfig) -> Vec<BalanceReport> {
  let mut reports = Vec::with_capacity(config.wallets.ids().len());

  for wallet_id in config.wallets.ids() {
    let url = config.wallet_url(wallet_id);
    let wallet_id = wallet_id.to_string();

    let response = match client.get(&url).send().await {
      Ok(response) => response,
      Err(err) => {
        debug!(%wallet_id, error = %err, "balance probe failed");
        reports.push(BalanceReport::unavailable(wallet_id, None, err.to_string()));
        continue;
      }
    };

    let status = response.status();
    if status != StatusCode::OK {
      reports.push(BalanceReport::unavailable(
        wallet_id,
        Some(status.as_u16()),
        format!("status {}", status.as_u16()),
      ));
      continue;
    }

    match response.json::<WalletBalance>().await {
      Ok(wallet) => {
        info!(%wallet_id, balance = wallet.balance, "wallet balance");
        reports.push(BalanceReport {
          wallet_id,
          status: Some(status.as_u16()),
          balance: Some(wallet.balance),
          error: None,
        });
      }
      Err(err) => {
        reports.push(BalanceReport::unavailable(
          wallet_id,
          Some(status.as_u16()),
          format!("malformed body: {err}"),
        ));
      }
    }
  }

  reports
}
