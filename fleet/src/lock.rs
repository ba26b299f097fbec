//! Per-wallet serialization of ledger-mutating operations.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex as StdMutex},
};

use solana_sdk::pubkey::Pubkey;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held while an operation runs against one wallet; dropping it releases the wallet.
pub type WalletGuard = OwnedMutexGuard<()>;

/// One FIFO lock per wallet identity.
///
/// Waiters on the same wallet are served in the order they called `acquire`.
#[derive(Debug, Default)]
pub struct WalletLockRegistry {
    locks: StdMutex<HashMap<Pubkey, Arc<Mutex<()>>>>,
}

impl WalletLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, wallet: &Pubkey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(*wallet).or_default().clone()
    }

    pub async fn acquire(&self, wallet: &Pubkey) -> WalletGuard {
        self.entry(wallet).lock_owned().await
    }

    /// Acquire several wallets at once, in key order so that two callers
    /// locking overlapping sets cannot deadlock.
    pub async fn acquire_all(&self, wallets: &[Pubkey]) -> Vec<WalletGuard> {
        let mut keys = wallets.to_vec();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.acquire(key).await);
        }
        guards
    }

    /// Run `op` while holding `wallet`'s lock.
    pub async fn with_lock<F: Future>(&self, wallet: &Pubkey, op: F) -> F::Output {
        let _guard = self.acquire(wallet).await;
        op.await
    }

    pub fn is_locked(&self, wallet: &Pubkey) -> bool {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .get(wallet)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Forget a wallet. Holders and waiters keep the old lock until they finish.
    pub fn remove(&self, wallet: &Pubkey) -> bool {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(wallet).is_some()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn same_wallet_runs_in_call_order_one_at_a_time() {
        let registry = WalletLockRegistry::new();
        let wallet = Pubkey::new_unique();
        let order = StdMutex::new(Vec::new());
        let active = AtomicUsize::new(0);
        let max_active = AtomicUsize::new(0);

        let ops = (0..8).map(|i| {
            let (registry, order, active, max_active) = (&registry, &order, &active, &max_active);
            async move {
                registry
                    .with_lock(&wallet, async {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        order.lock().unwrap().push(i);
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }
        });
        join_all(ops).await;

        assert_eq!(*order.lock().unwrap(), (0..8).collect::<Vec<_>>());
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_wallets_do_not_block() {
        let registry = WalletLockRegistry::new();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();

        let _held = registry.acquire(&a).await;
        assert!(registry.is_locked(&a));
        assert!(!registry.is_locked(&b));
        let _other = registry.acquire(&b).await;
        assert!(registry.is_locked(&b));
    }

    #[tokio::test]
    async fn acquire_all_dedups_and_releases() {
        let registry = WalletLockRegistry::new();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();

        let guards = registry.acquire_all(&[b, a, b]).await;
        assert_eq!(guards.len(), 2);
        assert!(registry.is_locked(&a) && registry.is_locked(&b));

        drop(guards);
        assert!(!registry.is_locked(&a));
        assert!(registry.remove(&a));
        assert!(!registry.remove(&a));
        assert_eq!(registry.len(), 1);
    }
}
