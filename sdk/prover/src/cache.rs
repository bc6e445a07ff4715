//! Per-circuit cache of prepared circuits
//!
//! ```text
//! Unloaded ──load──▶ Loading ──ok──▶ Ready
//!    ▲                  │
//!    └──────err─────────┘
//! ```
//!
//! Each circuit type owns a `OnceCell`; callers that race on a cold type all
//! wait on the one in-flight load and receive the same `Arc`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;
use tracing::debug;

use crate::ProverError;
use crate::circuit::CircuitType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Unloaded,
    Loading,
    Ready,
}

struct Slot<C> {
    cell: OnceCell<Arc<C>>,
    loading: AtomicBool,
}

/// Clears the loading flag even if the load future is dropped
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct CircuitCache<C> {
    slots: Mutex<HashMap<CircuitType, Arc<Slot<C>>>>,
}

impl<C> Default for CircuitCache<C> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<C> CircuitCache<C> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, circuit: CircuitType) -> Arc<Slot<C>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(circuit)
            .or_insert_with(|| {
                Arc::new(Slot {
                    cell: OnceCell::new(),
                    loading: AtomicBool::new(false),
                })
            })
            .clone()
    }

    pub fn state(&self, circuit: CircuitType) -> CircuitState {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(&circuit) {
            Some(slot) if slot.cell.initialized() => CircuitState::Ready,
            Some(slot) if slot.loading.load(Ordering::SeqCst) => CircuitState::Loading,
            _ => CircuitState::Unloaded,
        }
    }

    /// Return the cached circuit, running `load` if none is cached.
    ///
    /// A failed load leaves the type unloaded so the next call retries.
    pub async fn get_or_load<F, Fut>(
        &self,
        circuit: CircuitType,
        load: F,
    ) -> Result<Arc<C>, ProverError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, ProverError>>,
    {
        let slot = self.slot(circuit);
        if let Some(ready) = slot.cell.get() {
            debug!("{} circuit cache hit", circuit);
            return Ok(ready.clone());
        }

        let loading = &slot.loading;
        let loaded = slot
            .cell
            .get_or_try_init(move || async move {
                loading.store(true, Ordering::SeqCst);
                let _guard = LoadingGuard(loading);
                debug!("Loading {} circuit", circuit);
                load().await.map(Arc::new)
            })
            .await?;

        Ok(loaded.clone())
    }

    /// Drop every cached circuit; in-flight loads finish into detached slots
    pub fn clear(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_failed_load_stays_unloaded() {
        let cache: CircuitCache<u32> = CircuitCache::new();

        let err = cache
            .get_or_load(CircuitType::Deposit, || async {
                Err(ProverError::ArtifactLoad {
                    circuit: CircuitType::Deposit,
                    reason: "offline".into(),
                })
            })
            .await;
        assert!(err.is_err());
        assert_eq!(cache.state(CircuitType::Deposit), CircuitState::Unloaded);

        let value = cache
            .get_or_load(CircuitType::Deposit, || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(*value, 7);
        assert_eq!(cache.state(CircuitType::Deposit), CircuitState::Ready);
    }

    #[tokio::test]
    async fn test_racing_loads_converge() {
        let cache: CircuitCache<u32> = CircuitCache::new();
        let counter = AtomicUsize::new(0);
        let loads = &counter;

        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(42)
        };

        let (a, b) = tokio::join!(
            cache.get_or_load(CircuitType::Withdraw, load),
            cache.get_or_load(CircuitType::Withdraw, load),
        );

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loading_state_visible() {
        let cache: Arc<CircuitCache<u32>> = Arc::new(CircuitCache::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let loader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load(CircuitType::Transfer, move || async move {
                        let _ = rx.await;
                        Ok(1)
                    })
                    .await
            })
        };

        tokio::task::yield_now().await;
        while cache.state(CircuitType::Transfer) == CircuitState::Unloaded {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.state(CircuitType::Transfer), CircuitState::Loading);

        tx.send(()).unwrap();
        loader.await.unwrap().unwrap();
        assert_eq!(cache.state(CircuitType::Transfer), CircuitState::Ready);

        cache.clear();
        assert_eq!(cache.state(CircuitType::Transfer), CircuitState::Unloaded);
    }
}
