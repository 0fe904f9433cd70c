//! Process-wide table of platform appliers.
//!
//! The table is built once at startup and frozen:
//!
//! ```ignore
//! use osrouter::registry::RegistryBuilder;
//!
//! let mut builder = RegistryBuilder::new();
//! osrouter::platform::register_builtin(&mut builder);
//! builder.register("custom", || Box::new(MyApplier::default()));
//! builder.install()?;
//!
//! let applier = osrouter::registry::global()?.create("linux")?;
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::applier::PlatformApplier;
use crate::error::{Error, Result};

/// Creates a fresh applier for a platform.
pub type Constructor = fn() -> Box<dyn PlatformApplier>;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Mutable registry under construction.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<String, Constructor>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is already registered. Two platforms claiming the same
    /// identifier is a programming error.
    pub fn register(&mut self, id: &str, ctor: Constructor) -> &mut Self {
        if self.entries.insert(id.to_string(), ctor).is_some() {
            panic!("platform {id:?} registered twice");
        }
        self
    }

    /// Freeze into a standalone registry.
    pub fn build(self) -> Registry {
        Registry {
            entries: self.entries,
        }
    }

    /// Freeze and install as the process-wide registry.
    ///
    /// Fails with [`Error::RegistryInstalled`] if one is already installed.
    pub fn install(self) -> Result<&'static Registry> {
        let count = self.entries.len();
        let mut slot = Some(self.build());
        let installed = GLOBAL.get_or_init(|| slot.take().unwrap_or_default());
        if slot.is_some() {
            return Err(Error::RegistryInstalled);
        }
        tracing::debug!(platforms = count, "platform registry installed");
        Ok(installed)
    }
}

/// Frozen table from platform identifier to applier constructor.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, Constructor>,
}

impl Registry {
    /// Find the constructor for `id`.
    pub fn lookup(&self, id: &str) -> Option<Constructor> {
        self.entries.get(id).copied()
    }

    /// Construct a new applier for `id`.
    pub fn create(&self, id: &str) -> Result<Box<dyn PlatformApplier>> {
        let ctor = self
            .lookup(id)
            .ok_or_else(|| Error::UnknownPlatform(id.to_string()))?;
        Ok(ctor())
    }

    /// Registered identifiers, sorted.
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Check if `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }
}

/// Register a constructor on `builder`.
///
/// # Panics
///
/// Panics if `id` is already registered on `builder`.
pub fn register(builder: &mut RegistryBuilder, id: &str, ctor: Constructor) {
    builder.register(id, ctor);
}

/// Get the process-wide registry.
///
/// Fails with [`Error::RegistryNotInstalled`] before
/// [`RegistryBuilder::install`] has run.
pub fn global() -> Result<&'static Registry> {
    GLOBAL.get().ok_or(Error::RegistryNotInstalled)
}
