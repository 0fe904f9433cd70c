//! Configuration diffing.
//!
//! This module computes the ordered list of mutations that moves the
//! operating system from one [`NetworkConfig`] snapshot to another.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::net::IpAddr;

use super::types::{DeclaredAddress, DeclaredMtu, DeclaredRoute, DeclaredRule, NetworkConfig};

/// A single atomic OS configuration change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mutation {
    /// Assign an address to an interface.
    AddAddress(DeclaredAddress),
    /// Remove an address from an interface.
    RemoveAddress(DeclaredAddress),
    /// Install a route.
    AddRoute(DeclaredRoute),
    /// Delete a route.
    RemoveRoute(DeclaredRoute),
    /// Install a policy rule.
    AddRule(DeclaredRule),
    /// Delete a policy rule.
    RemoveRule(DeclaredRule),
    /// Replace the resolver's DNS servers.
    SetDns(Vec<IpAddr>),
    /// Set an interface MTU.
    SetMtu(DeclaredMtu),
}

impl Mutation {
    /// Check if this mutation removes an OS object.
    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            Self::RemoveAddress(_) | Self::RemoveRoute(_) | Self::RemoveRule(_)
        )
    }

    /// Check if this mutation creates an OS object.
    pub fn is_addition(&self) -> bool {
        matches!(
            self,
            Self::AddAddress(_) | Self::AddRoute(_) | Self::AddRule(_)
        )
    }

    /// Get the category this mutation belongs to.
    pub fn category(&self) -> Category {
        match self {
            Self::AddAddress(_) | Self::RemoveAddress(_) => Category::Address,
            Self::AddRoute(_) | Self::RemoveRoute(_) => Category::Route,
            Self::AddRule(_) | Self::RemoveRule(_) => Category::Rule,
            Self::SetDns(_) => Category::Dns,
            Self::SetMtu(_) => Category::Mtu,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddAddress(a) => write!(f, "+ address {}", a),
            Self::RemoveAddress(a) => write!(f, "- address {}", a),
            Self::AddRoute(r) => write!(f, "+ route {}", r),
            Self::RemoveRoute(r) => write!(f, "- route {}", r),
            Self::AddRule(r) => write!(f, "+ rule {}", r),
            Self::RemoveRule(r) => write!(f, "- rule {}", r),
            Self::SetDns(servers) if servers.is_empty() => write!(f, "~ dns (none)"),
            Self::SetDns(servers) => {
                let list: Vec<String> = servers.iter().map(|s| s.to_string()).collect();
                write!(f, "~ dns {}", list.join(", "))
            }
            Self::SetMtu(m) => write!(f, "~ mtu {}", m),
        }
    }
}

/// Kind of OS object a mutation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Interface addresses.
    Address,
    /// Routes.
    Route,
    /// Policy routing rules.
    Rule,
    /// Resolver configuration.
    Dns,
    /// Interface MTU.
    Mtu,
}

/// Compute the ordered mutations that turn `old` into `new`.
///
/// Emission order is rule removals, route removals, address removals,
/// address additions, route additions, rule additions, then the DNS and MTU
/// settings. Routes never outlive the addresses they leave through, and no
/// route is installed before the address it depends on exists.
///
/// Removals keep `old`'s declaration order and additions keep `new`'s.
/// Unchanged entries are never touched, so `diff(c, c)` is empty.
pub fn diff(old: &NetworkConfig, new: &NetworkConfig) -> Vec<Mutation> {
    let (rules_removed, rules_added) = split(&old.rules, &new.rules);
    let (routes_removed, routes_added) = split(&old.routes, &new.routes);
    let (addrs_removed, addrs_added) = split(&old.addresses, &new.addresses);

    let mut mutations = Vec::new();
    mutations.extend(rules_removed.into_iter().cloned().map(Mutation::RemoveRule));
    mutations.extend(routes_removed.into_iter().cloned().map(Mutation::RemoveRoute));
    mutations.extend(addrs_removed.into_iter().cloned().map(Mutation::RemoveAddress));
    mutations.extend(addrs_added.into_iter().cloned().map(Mutation::AddAddress));
    mutations.extend(routes_added.into_iter().cloned().map(Mutation::AddRoute));
    mutations.extend(rules_added.into_iter().cloned().map(Mutation::AddRule));

    let old_dns: Vec<IpAddr> = unique(&old.dns).copied().collect();
    let new_dns: Vec<IpAddr> = unique(&new.dns).copied().collect();
    if old_dns != new_dns {
        mutations.push(Mutation::SetDns(new_dns));
    }

    // A cleared MTU has nothing to restore to.
    if let Some(mtu) = &new.mtu
        && old.mtu.as_ref() != Some(mtu)
    {
        mutations.push(Mutation::SetMtu(mtu.clone()));
    }

    mutations
}

/// Entries only in `old` and entries only in `new`, duplicates coalesced.
fn split<'a, T: Eq + Hash>(old: &'a [T], new: &'a [T]) -> (Vec<&'a T>, Vec<&'a T>) {
    let old_set: HashSet<&T> = old.iter().collect();
    let new_set: HashSet<&T> = new.iter().collect();

    let removed = unique(old).filter(|e| !new_set.contains(e)).collect();
    let added = unique(new).filter(|e| !old_set.contains(e)).collect();
    (removed, added)
}

fn unique<T: Eq + Hash>(items: &[T]) -> impl Iterator<Item = &T> {
    let mut seen = HashSet::new();
    items.iter().filter(move |item| seen.insert(*item))
}

/// An ordered set of mutations between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    mutations: Vec<Mutation>,
}

impl Plan {
    /// Compute the plan that turns `old` into `new`.
    pub fn between(old: &NetworkConfig, new: &NetworkConfig) -> Self {
        Self {
            mutations: diff(old, new),
        }
    }

    /// Check if no changes are needed.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Get the total number of changes.
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Get the mutations in application order.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Number of changes touching the given category.
    pub fn count(&self, category: Category) -> usize {
        self.mutations
            .iter()
            .filter(|m| m.category() == category)
            .count()
    }

    /// Get a human-readable summary of the changes.
    pub fn summary(&self) -> String {
        if self.mutations.is_empty() {
            "No changes needed".to_string()
        } else {
            self.mutations
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

impl IntoIterator for Plan {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

impl From<Plan> for Vec<Mutation> {
    fn from(plan: Plan) -> Self {
        plan.mutations
    }
}
