//! Declarative network configuration.
//!
//! This module describes the network state the operating system should carry
//! and computes the changes needed to get there.
//!
//! # Overview
//!
//! Instead of imperatively adding addresses, routes and rules, you describe
//! the desired state and let the differ figure out what changes are needed:
//!
//! ```ignore
//! use osrouter::config::{NetworkConfig, Plan};
//!
//! let current = NetworkConfig::new();
//! let desired = NetworkConfig::new()
//!     .address("wg0", "100.64.0.1/32")?
//!     .route("100.64.0.0/10", |r| r.dev("wg0").table(52))?
//!     .rule(5270, |r| r.table(52))?
//!     .dns("100.100.100.100".parse()?)
//!     .mtu("wg0", 1280);
//!
//! // Preview changes
//! let plan = Plan::between(&current, &desired);
//! println!("{}", plan.summary());
//! ```
//!
//! # Ordering
//!
//! Mutations are emitted removals first, most dependent objects first:
//!
//! 1. Rule removals
//! 2. Route removals
//! 3. Address removals
//! 4. Address additions
//! 5. Route additions
//! 6. Rule additions
//! 7. DNS servers, then MTU
//!
//! # Identity
//!
//! - Addresses are keyed by (device, address, prefix length)
//! - Routes are keyed by every field, so metric-only changes are a removal
//!   plus an addition and both routes may briefly coexist
//! - Rules are keyed by every field

mod diff;
mod types;

pub use diff::{Category, Mutation, Plan, diff};
pub use types::*;
