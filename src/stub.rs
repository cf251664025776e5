use std::{
  collections::HashMap,
  future::Future,
  net::SocketAddr,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
  time::Duration,
};

use serde_json::json;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};
use uuid::Uuid;
use warp::{
  http::StatusCode,
  hyper::body::Bytes,
  reply::{self, Response},
  Filter, Rejection, Reply,
};

use crate::{
  error::{LoadTestError, LoadTestResult},
  request::{WalletBalance, WalletOperationRequest},
};

pub(crate) type StubTally = Arc<Mutex<HashMap<Uuid, i64>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubConfig {
  pub status: u16,
  pub delay: Duration,
}

impl Default for StubConfig {
  fn default() -> Self {
    StubConfig {
      status: 200,
      delay: Duration::ZERO,
    }
  }
}

#[derive(Clone)]
pub(crate) struct StubState {
  config: StubConfig,
  tally: StubTally,
  received: Arc<AtomicU64>,
}

impl StubState {
  fn new(config: StubConfig) -> Self {
    StubState {
      config,
      tally: Arc::new(Mutex::new(HashMap::new())),
      received: Arc::new(AtomicU64::new(0)),
    }
  }
}

fn routes(state: StubState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
  let operation_state = state.clone();
  let operation_route = warp::post()
    .and(warp::path!("api" / "v1" / "wallets"))
    .and(warp::header::optional::<String>("content-type"))
    .and(warp::body::bytes())
    .and_then(move |content_type: Option<String>, body: Bytes| {
      let state = operation_state.clone();
      async move { Ok::<_, Rejection>(handle_operation(state, content_type, body).await) }
    });

  let balance_route = warp::get()
    .and(warp::path!("api" / "v1" / "wallets" / String))
    .and_then(move |wallet_id: String| {
      let state = state.clone();
      async move { Ok::<_, Rejection>(handle_balance(state, wallet_id).await) }
    });

  operation_route.or(balance_route).unify()
}

async fn handle_operation(state: StubState, content_type: Option<String>, body: Bytes) -> Response {
  state.received.fetch_add(1, Ordering::Relaxed);

  let is_json = content_type
    .as_deref()
    .map(|value| value.starts_with("application/json"))
    .unwrap_or(false);
  if !is_json {
    return reply::with_status(
      reply::json(&json!({ "errors": [{ "Field": "Content-Type", "Tag": "unsupported" }] })),
      StatusCode::UNSUPPORTED_MEDIA_TYPE,
    )
    .into_response();
  }

  let request: WalletOperationRequest = match serde_json::from_slice(&body) {
    Ok(request) => request,
    Err(err) => {
      debug!(error = %err, "stub rejected malformed operation");
      return reply::with_status(
        reply::json(&json!({ "errors": [{ "Field": "body", "Tag": "invalid", "Value": err.to_string() }] })),
        StatusCode::UNPROCESSABLE_ENTITY,
      )
      .into_response();
    }
  };

  if !state.config.delay.is_zero() {
    tokio::time::sleep(state.config.delay).await;
  }

  let status = StatusCode::from_u16(state.config.status).unwrap_or(StatusCode::OK);
  let mut tally = state.tally.lock().await;
  let balance = tally.entry(request.wallet_id).or_insert(0);
  if status.is_success() {
    *balance += request.delta();
  }

  let wallet = WalletBalance {
    wallet_id: request.wallet_id.to_string(),
    balance: *balance as f64,
  };
  drop(tally);

  reply::with_status(reply::json(&wallet), status).into_response()
}

async fn handle_balance(state: StubState, wallet_id: String) -> Response {
  let id = match Uuid::parse_str(&wallet_id) {
    Ok(id) => id,
    Err(_) => {
      return reply::with_status(
        reply::json(&json!({ "errors": [{ "Field": "uuid", "Tag": "invalid", "Value": wallet_id }] })),
        StatusCode::UNPROCESSABLE_ENTITY,
      )
      .into_response();
    }
  };

  match state.tally.lock().await.get(&id) {
    Some(balance) => reply::json(&WalletBalance {
      wallet_id: id.to_string(),
      balance: *balance as f64,
    })
    .into_response(),
    None => StatusCode::NOT_FOUND.into_response(),
  }
}

/// A stub bound to a local port; shuts down when dropped.
pub struct StubServer {
  addr: SocketAddr,
  state: StubState,
  shutdown: Option<oneshot::Sender<()>>,
}

impl StubServer {
  pub async fn spawn(addr: SocketAddr, config: StubConfig) -> LoadTestResult<Self> {
    let state = StubState::new(config);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let (bound, server) = warp::serve(routes(state.clone()))
      .try_bind_with_graceful_shutdown(addr, async {
        let _ = shutdown_rx.await;
      })
      .map_err(|e| LoadTestError::StubBind {
        addr,
        reason: e.to_string(),
      })?;
    tokio::spawn(server);

    Ok(StubServer {
      addr: bound,
      state,
      shutdown: Some(shutdown_tx),
    })
  }

  /// Binds an ephemeral port on the loopback interface.
  pub async fn local(config: StubConfig) -> LoadTestResult<Self> {
    Self::spawn(SocketAddr::from(([127, 0, 0, 1], 0)), config).await
  }

  pub fn addr(&self) -> SocketAddr {
    self.addr
  }

  pub fn base_url(&self) -> String {
    format!("http://{}", self.addr)
  }

  /// Operation requests received so far, including rejected ones.
  pub fn received(&self) -> u64 {
    self.state.received.load(Ordering::Relaxed)
  }

  pub async fn balance(&self, wallet_id: &Uuid) -> Option<i64> {
    self.state.tally.lock().await.get(wallet_id).copied()
  }
}

impl Drop for StubServer {
  fn drop(&mut self) {
    if let Some(shutdown) = self.shutdown.take() {
      let _ = shutdown.send(());
    }
  }
}

/// Serves the stub until `signal` resolves.
pub async fn serve(
  addr: SocketAddr,
  config: StubConfig,
  signal: impl Future<Output = ()> + Send + 'static,
) -> LoadTestResult<()> {
  let state = StubState::new(config);
  let (bound, server) = warp::serve(routes(state.clone()))
    .try_bind_with_graceful_shutdown(addr, signal)
    .map_err(|e| LoadTestError::StubBind {
      addr,
      reason: e.to_string(),
    })?;

  info!(
    addr = %bound,
    status = config.status,
    delay_ms = config.delay.as_millis() as u64,
    "stub target listening"
  );
  server.await;
  info!(received = state.received.load(Ordering::Relaxed), "stub target stopped");
  Ok(())
}

#[cfg(test)]
mod tests {
  use reqwest::Client;

  use super::*;
  use crate::request::OperationType;

  fn operation(wallet: &str, operation_type: OperationType, amount: u64) -> WalletOperationRequest {
    WalletOperationRequest {
      wallet_id: Uuid::parse_str(wallet).unwrap(),
      operation_type,
      amount,
    }
  }

  #[tokio::test]
  async fn tallies_successful_operations() {
    let stub = StubServer::local(StubConfig::default()).await.unwrap();
    let client = Client::new();
    let url = format!("{}/api/v1/wallets", stub.base_url());
    let wallet = "550e8400-e29b-41d4-a716-446655440001";

    for request in [
      operation(wallet, OperationType::Deposit, 300),
      operation(wallet, OperationType::Withdraw, 120),
    ] {
      let response = client.post(&url).json(&request).send().await.unwrap();
      assert_eq!(response.status(), 200);
    }

    let response = client.get(format!("{url}/{wallet}")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let balance: WalletBalance = response.json().await.unwrap();
    assert_eq!(balance.balance, 180.0);
    assert_eq!(stub.received(), 2);
  }

  #[tokio::test]
  async fn failing_status_does_not_change_tally() {
    let stub = StubServer::local(StubConfig {
      status: 500,
      delay: Duration::ZERO,
    })
    .await
    .unwrap();
    let request = operation(
      "550e8400-e29b-41d4-a716-446655440000",
      OperationType::Deposit,
      100,
    );

    let response = Client::new()
      .post(format!("{}/api/v1/wallets", stub.base_url()))
      .json(&request)
      .send()
      .await
      .unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(stub.balance(&request.wallet_id).await, Some(0));
  }

  #[tokio::test]
  async fn rejects_non_json_and_malformed_bodies() {
    let stub = StubServer::local(StubConfig::default()).await.unwrap();
    let client = Client::new();
    let url = format!("{}/api/v1/wallets", stub.base_url());

    let response = client.post(&url).body("WalletId=1").send().await.unwrap();
    assert_eq!(response.status(), 415);

    let response = client
      .post(&url)
      .header("content-type", "application/json")
      .body(r#"{"WalletId":"nope","OperationType":"DEPOSIT","Amount":1}"#)
      .send()
      .await
      .unwrap();
    assert_eq!(response.status(), 422);
  }

  #[tokio::test]
  async fn balance_lookup_validates_ids() {
    let stub = StubServer::local(StubConfig::default()).await.unwrap();
    let client = Client::new();
    let url = format!("{}/api/v1/wallets", stub.base_url());

    let response = client.get(format!("{url}/not-a-uuid")).send().await.unwrap();
    assert_eq!(response.status(), 422);

    let response = client
      .get(format!("{url}/{}", Uuid::new_v4()))
      .send()
      .await
      .unwrap();
    assert_eq!(response.status(), 404);
  }
}
