use rand::{
  distributions::{Distribution, Standard},
  rngs::StdRng,
  Rng, SeedableRng,
};
use uuid::Uuid;

use crate::{
  error::ConfigError,
  profile::{AmountRange, LoadTestConfig, WalletPool},
  request::{OperationType, WalletOperationRequest},
};

impl Distribution<OperationType> for Standard {
  fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> OperationType {
    if rng.gen_bool(0.5) {
      OperationType::Deposit
    } else {
      OperationType::Withdraw
    }
  }
}

/// Builds randomized wallet operations for one virtual user.
///
/// Every virtual user owns its generator, so no random state is shared across
/// tasks. With a base seed, VU `n` is seeded with `seed + n` and replays the
/// same request sequence on every run.
#[derive(Debug, Clone)]
pub struct RequestGenerator {
  rng: StdRng,
  wallets: WalletPool,
  amounts: AmountRange,
}

impl RequestGenerator {
  pub fn new(wallets: WalletPool, amounts: AmountRange, seed: Option<u64>) -> Result<Self, ConfigError> {
    if wallets.ids().is_empty() {
      return Err(ConfigError::EmptyWalletPool);
    }
    let amounts = AmountRange::new(amounts.min, amounts.max)?;
    let rng = match seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };

    Ok(RequestGenerator {
      rng,
      wallets,
      amounts,
    })
  }

  pub fn for_vu(config: &LoadTestConfig, vu: usize) -> Result<Self, ConfigError> {
    let seed = config.seed.map(|seed| seed.wrapping_add(vu as u64));
    Self::new(config.wallets.clone(), config.amounts, seed)
  }

  pub fn next_request(&mut self) -> WalletOperationRequest {
    let operation_type = self.rng.gen::<OperationType>();
    let wallet_id = self.next_wallet();
    let amount = self.rng.gen_range(self.amounts.min..=self.amounts.max);

    WalletOperationRequest {
      wallet_id,
      operation_type,
      amount,
    }
  }

  fn next_wallet(&mut self) -> Uuid {
    match &self.wallets {
      WalletPool::Fixed(id) => *id,
      WalletPool::Pool(ids) => ids[self.rng.gen_range(0..ids.len())],
    }
  }
}
