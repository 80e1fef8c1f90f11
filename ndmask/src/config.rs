/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Runtime configuration for ndmask.
//!
//! Settings are read once from the environment into a global
//! instance. Tests can take the global lock and override values for
//! the duration of a scope.

use std::env;

/// Environment variable toggling the contiguous mask scan in the
/// reducers.
pub const CONTIGUOUS_FAST_PATH_ENV: &str = "NDMASK_CONTIGUOUS_FAST_PATH";

/// Environment variable setting the initial capacity of region lists
/// returned by the contiguous finders.
pub const REGION_CAPACITY_ENV: &str = "NDMASK_REGION_CAPACITY";

/// Tunables consulted by the reduction and region-finding code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Scan the raw mask buffer when a tensor's mask is laid out
    /// contiguously, instead of iterating element by element.
    pub contiguous_fast_path: bool,

    /// Initial capacity of the region lists built by
    /// `flat_*_contiguous`.
    pub region_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contiguous_fast_path: true,
            region_capacity: 4,
        }
    }
}

/// Load configuration from environment variables. Values that do not
/// parse keep their defaults.
pub fn from_env() -> Config {
    let mut config = Config::default();

    if let Ok(val) = env::var(CONTIGUOUS_FAST_PATH_ENV) {
        match val.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => config.contiguous_fast_path = true,
            "0" | "false" | "no" | "off" => config.contiguous_fast_path = false,
            _ => tracing::warn!(%val, "ignoring unparseable {}", CONTIGUOUS_FAST_PATH_ENV),
        }
    }

    if let Ok(val) = env::var(REGION_CAPACITY_ENV) {
        match val.parse::<usize>() {
            Ok(parsed) => config.region_capacity = parsed,
            Err(_) => tracing::warn!(%val, "ignoring unparseable {}", REGION_CAPACITY_ENV),
        }
    }

    config
}

/// Global configuration functions
pub mod global {
    use std::sync::Arc;
    use std::sync::LazyLock;

    use parking_lot::Mutex;
    use parking_lot::MutexGuard;
    use parking_lot::RwLock;

    use super::*;

    /// Global configuration instance, initialized from environment variables.
    static CONFIG: LazyLock<Arc<RwLock<Config>>> =
        LazyLock::new(|| Arc::new(RwLock::new(from_env())));

    // Serializes tests that override the global configuration.
    static LOCK: Mutex<()> = Mutex::new(());

    /// A snapshot of the global configuration.
    pub fn get() -> Config {
        *CONFIG.read()
    }

    /// Reset the global configuration to defaults (for testing only)
    pub fn reset_to_defaults() {
        *CONFIG.write() = Config::default();
    }

    /// Acquire the global configuration lock for testing.
    pub fn lock() -> ConfigLock {
        ConfigLock {
            _guard: LOCK.lock(),
            config: Arc::clone(&CONFIG),
        }
    }

    /// Exclusive access to the global configuration for the lifetime
    /// of the lock.
    pub struct ConfigLock {
        _guard: MutexGuard<'static, ()>,
        config: Arc<RwLock<Config>>,
    }

    impl ConfigLock {
        /// Applies `f` to the global configuration until the returned
        /// guard is dropped.
        pub fn override_with(&self, f: impl FnOnce(&mut Config)) -> ConfigOverride<'_> {
            let mut config = self.config.write();
            let saved = *config;
            f(&mut config);
            ConfigOverride { lock: self, saved }
        }
    }

    /// Restores the configuration saved by
    /// [`ConfigLock::override_with`] on drop.
    pub struct ConfigOverride<'a> {
        lock: &'a ConfigLock,
        saved: Config,
    }

    impl Drop for ConfigOverride<'_> {
        fn drop(&mut self) {
            *self.lock.config.write() = self.saved;
        }
    }
}
