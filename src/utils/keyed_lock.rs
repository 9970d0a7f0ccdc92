use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-key mutual exclusion for verification calls.
///
/// Concurrent discovery of the same secret in multiple chunks must not issue
/// duplicate concurrent verification requests against a provider, so calls
/// are serialized per logical credential rather than globally.
///
/// Lock entries are created on first access and never removed. Growth is
/// bounded by the number of distinct credentials seen during one scanning
/// run.
#[derive(Default)]
pub struct KeyedLock {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting if another verification of the
    /// same credential is in flight.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("keyed lock map poisoned");
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
