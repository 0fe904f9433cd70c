//! Reconcile OS routing state with a declared configuration.
//!
//! This crate keeps addresses, routes, policy rules, DNS servers and a link
//! MTU on the host in line with a desired [`NetworkConfig`]. Each new desired
//! state is diffed against what has been confirmed so far, and the resulting
//! mutations are applied one at a time, in dependency order, through a
//! [`PlatformApplier`].
//!
//! # Features
//!
//! - `serde` - Serialize/Deserialize for configurations and mutations
//!
//! # Example
//!
//! ```ignore
//! use osrouter::registry::RegistryBuilder;
//! use osrouter::{NetworkConfig, Reconciler};
//!
//! #[tokio::main]
//! async fn main() -> osrouter::Result<()> {
//!     let mut builder = RegistryBuilder::new();
//!     osrouter::platform::register_builtin(&mut builder);
//!     builder.install()?;
//!
//!     let reconciler = Reconciler::for_platform("linux")?;
//!     let desired = NetworkConfig::new()
//!         .address("wg0", "100.64.0.1/32")?
//!         .route("100.64.0.0/10", |r| r.dev("wg0").table(52))?
//!         .rule(5270, |r| r.table(52))?;
//!
//!     println!("{}", reconciler.plan(&desired).summary());
//!     reconciler.set_desired(desired).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Failure handling
//!
//! Removing something already gone and adding something already present are
//! treated as success. Any other failure stops the batch; everything applied
//! before it stays applied and [`Reconciler::current`] reflects exactly that.

pub mod applier;
pub mod config;
pub mod error;
pub mod platform;
pub mod reconciler;
pub mod registry;

pub use applier::{ApplyResult, PlatformApplier};
pub use config::{Mutation, NetworkConfig, Plan, diff};
pub use error::{AppliedState, ApplyError, Error, ErrorKind, Result};
pub use reconciler::{Reconciler, ReconcilerOptions, ReconcilerState};
pub use registry::{Registry, RegistryBuilder};
