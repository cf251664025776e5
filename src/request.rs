use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
  Deposit,
  Withdraw,
}

impl OperationType {
  pub const ALL: [OperationType; 2] = [OperationType::Deposit, OperationType::Withdraw];

  pub fn as_str(&self) -> &'static str {
    match self {
      OperationType::Deposit => "DEPOSIT",
      OperationType::Withdraw => "WITHDRAW",
    }
  }
}

impl fmt::Display for OperationType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Body of `POST /api/v1/wallets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WalletOperationRequest {
  pub wallet_id: Uuid,
  pub operation_type: OperationType,
  pub amount: u64,
}

impl WalletOperationRequest {
  /// Signed effect of this operation on the wallet balance.
  pub fn delta(&self) -> i64 {
    let amount = i64::try_from(self.amount).unwrap_or(i64::MAX);
    match self.operation_type {
      OperationType::Deposit => amount,
      OperationType::Withdraw => -amount,
    }
  }
}

/// Body of `GET /api/v1/wallets/{uuid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalance {
  pub wallet_id: String,
  pub balance: f64,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn request_uses_pascal_case_keys() {
    let request = WalletOperationRequest {
      wallet_id: Uuid::parse_str("550e8400-e29b-41d4-a716-446655440003").unwrap(),
      operation_type: OperationType::Withdraw,
      amount: 42,
    };

    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(
      value,
      json!({
        "WalletId": "550e8400-e29b-41d4-a716-446655440003",
        "OperationType": "WITHDRAW",
        "Amount": 42,
      })
    );
  }

  #[test]
  fn unknown_operation_type_is_rejected() {
    let body = r#"{"WalletId":"550e8400-e29b-41d4-a716-446655440000","OperationType":"TRANSFER","Amount":1}"#;
    assert!(serde_json::from_str::<WalletOperationRequest>(body).is_err());
  }

  #[test]
  fn display_matches_wire_format() {
    for op in OperationType::ALL {
      assert_eq!(serde_json::to_value(op).unwrap(), json!(op.to_string()));
    }
  }

  #[test]
  fn withdraw_delta_is_negative() {
    let mut request = WalletOperationRequest {
      wallet_id: Uuid::nil(),
      operation_type: OperationType::Deposit,
      amount: 100,
    };
    assert_eq!(request.delta(), 100);
    request.operation_type = OperationType::Withdraw;
    assert_eq!(request.delta(), -100);
  }
}
