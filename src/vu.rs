use std::{sync::Arc, time::Instant};

use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
  check::Checks,
  generator::RequestGenerator,
  metrics::{IterationSample, TransportError},
  profile::LoadTestConfig,
  request::WalletOperationRequest,
};

/// One request, check and record cycle. Never fails: transport errors are
/// folded into the sample.
pub async fn run_iteration(
  vu: usize,
  client: &Client,
  url: &str,
  generator: &mut RequestGenerator,
  checks: &Checks,
) -> IterationSample {
  let request = generator.next_request();

  let started = Instant::now();
  let (status, transport_error) = send(client, url, &request).await;
  let latency = started.elapsed();

  let outcome = checks.evaluate(status, latency);
  trace!(
    vu,
    wallet_id = %request.wallet_id,
    operation = %request.operation_type,
    amount = request.amount,
    status,
    latency_us = latency.as_micros() as u64,
    status_ok = outcome.status_ok,
    latency_ok = outcome.latency_ok,
    "iteration complete"
  );

  IterationSample {
    vu,
    operation: request.operation_type,
    wallet_id: request.wallet_id,
    status,
    latency,
    checks: outcome,
    transport_error,
  }
}

async fn send(
  client: &Client,
  url: &str,
  request: &WalletOperationRequest,
) -> (Option<u16>, Option<TransportError>) {
  // `json` sets `Content-Type: application/json`.
  let response = match client.post(url).json(request).send().await {
    Ok(response) => response,
    Err(err) => {
      debug!(error = %err, "request failed");
      return (None, Some(TransportError::classify(&err)));
    }
  };

  let status = response.status().as_u16();
  // Latency covers the whole body, not just the headers.
  match response.bytes().await {
    Ok(_) => (Some(status), None),
    Err(err) => {
      debug!(status, error = %err, "failed to read response body");
      (Some(status), Some(TransportError::classify(&err)))
    }
  }
}

/// Runs iterations until `cancel` fires. An iteration already in flight when
/// the stop signal arrives is completed and recorded.
pub async fn vu_loop(
  vu: usize,
  config: Arc<LoadTestConfig>,
  client: Client,
  sample_tx: mpsc::Sender<IterationSample>,
  cancel: CancellationToken,
) {
  let mut generator = match RequestGenerator::for_vu(&config, vu) {
    Ok(generator) => generator,
    Err(err) => {
      warn!(vu, error = %err, "virtual user could not start");
      return;
    }
  };
  let checks = Checks::new(config.expected_status, config.max_latency);
  let url = config.operations_url();

  while !cancel.is_cancelled() {
    let sample = run_iteration(vu, &client, &url, &mut generator, &checks).await;
    if sample_tx.send(sample).await.is_err() {
      // Aggregator is gone.
      return;
    }

    tokio::select! {
      _ = tokio::time::sleep(config.sleep) => {}
      _ = cancel.cancelled() => break,
    }
  }

  trace!(vu, "virtual user stopped");
}
