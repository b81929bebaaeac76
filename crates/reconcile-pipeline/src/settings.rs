use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

/// Persisted user settings read at the start of every pass.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn auto_hide(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct MemorySettings {
    auto_hide: AtomicBool,
}

impl MemorySettings {
    pub fn new(auto_hide: bool) -> Self {
        Self {
            auto_hide: AtomicBool::new(auto_hide),
        }
    }

    pub fn set_auto_hide(&self, value: bool) {
        self.auto_hide.store(value, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn auto_hide(&self) -> bool {
        self.auto_hide.load(Ordering::SeqCst)
    }
}
