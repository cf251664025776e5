use std::{
  future::Future,
  sync::Arc,
  time::{Duration, Instant},
};

use reqwest::Client;
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
  error::{LoadTestError, LoadTestResult},
  metrics::{IterationSample, MetricsRecorder},
  profile::LoadTestConfig,
  report::RunSummary,
  vu::vu_loop,
};

const SAMPLES_PER_VU: usize = 64;
const MAX_SAMPLE_BUFFER: usize = 1 << 16;

pub struct LoadTest {
  config: Arc<LoadTestConfig>,
  client: Client,
}

impl LoadTest {
  pub fn new(config: LoadTestConfig) -> LoadTestResult<Self> {
    config.validate()?;

    let client = Client::builder()
      .timeout(config.request_timeout)
      .pool_max_idle_per_host(config.vus)
      .build()
      .map_err(LoadTestError::Client)?;

    Ok(LoadTest {
      config: Arc::new(config),
      client,
    })
  }

  pub fn config(&self) -> &LoadTestConfig {
    &self.config
  }

  pub fn client(&self) -> &Client {
    &self.client
  }

  /// Runs for the configured duration, or until Ctrl+C.
  pub async fn run(&self) -> LoadTestResult<RunSummary> {
    self.run_until(ctrl_c()).await
  }

  /// Runs for the configured duration, or until `shutdown` resolves.
  pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> LoadTestResult<RunSummary> {
    let config = &self.config;
    let cancel = CancellationToken::new();
    let (sample_tx, sample_rx) = mpsc::channel(sample_buffer(config.vus));
    let aggregator = tokio::spawn(aggregate(sample_rx));

    info!(
      profile = %config.profile,
      target = %config.operations_url(),
      vus = config.vus,
      duration_ms = config.duration.as_millis() as u64,
      "starting load test"
    );

    let started = Instant::now();
    let mut vus = JoinSet::new();
    for vu in 0..config.vus {
      vus.spawn(vu_loop(
        vu,
        config.clone(),
        self.client.clone(),
        sample_tx.clone(),
        cancel.clone(),
      ));
    }
    // VUs hold the remaining senders.
    drop(sample_tx);

    tokio::select! {
      _ = tokio::time::sleep(config.duration) => {
        info!("duration elapsed, stopping virtual users");
      }
      _ = shutdown => {
        warn!("interrupted, stopping virtual users");
      }
    }
    cancel.cancel();

    drain(&mut vus, config.graceful_stop).await;
    let elapsed = started.elapsed();

    let recorder = aggregator
      .await
      .map_err(|e| LoadTestError::Aggregator(e.to_string()))?;
    let summary = recorder.summary(config, elapsed);

    info!(
      iterations = summary.iterations,
      failed_checks = summary.checks_failed(),
      elapsed_ms = elapsed.as_millis() as u64,
      "load test finished"
    );
    Ok(summary)
  }
}

fn sample_buffer(vus: usize) -> usize {
  vus.saturating_mul(SAMPLES_PER_VU).clamp(1, MAX_SAMPLE_BUFFER)
}

async fn aggregate(mut sample_rx: mpsc::Receiver<IterationSample>) -> MetricsRecorder {
  let mut recorder = MetricsRecorder::new();
  while let Some(sample) = sample_rx.recv().await {
    recorder.record(&sample);
  }
  debug!(iterations = recorder.iterations(), "aggregator drained");
  recorder
}

async fn drain(vus: &mut JoinSet<()>, graceful_stop: Duration) {
  let wait_all = async {
    while let Some(result) = vus.join_next().await {
      if let Err(err) = result {
        warn!(error = %err, "virtual user task failed");
      }
    }
  };

  if tokio::time::timeout(graceful_stop, wait_all).await.is_err() {
    warn!(
      remaining = vus.len(),
      "graceful stop window elapsed, aborting in-flight iterations"
    );
    vus.abort_all();
    while vus.join_next().await.is_some() {}
  }
}

async fn ctrl_c() {
  if let Err(err) = tokio::signal::ctrl_c().await {
    warn!(error = %err, "unable to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
}
