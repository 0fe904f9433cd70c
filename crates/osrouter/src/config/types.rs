//! Core types for declarative network configuration.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::diff::Mutation;

/// The main routing table (`RT_TABLE_MAIN`).
pub const MAIN_TABLE: u32 = 254;

/// Declarative network configuration.
///
/// An immutable snapshot of the addresses, routes, rules, DNS servers and MTU
/// the operating system should carry. Build one with the builder methods and
/// hand it to a [`Reconciler`](crate::Reconciler), or compare two snapshots
/// with [`diff()`](super::diff()).
///
/// Entries are unique: declaring the same address, route or rule twice keeps
/// a single copy. Equality is set equality per category; only the DNS server
/// order is significant.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkConfig {
    pub(crate) addresses: Vec<DeclaredAddress>,
    pub(crate) routes: Vec<DeclaredRoute>,
    pub(crate) rules: Vec<DeclaredRule>,
    pub(crate) dns: Vec<IpAddr>,
    pub(crate) mtu: Option<DeclaredMtu>,
}

impl NetworkConfig {
    /// Create an empty network configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an IP address to an interface.
    ///
    /// The address should be in CIDR notation (e.g., "100.64.0.1/32").
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = NetworkConfig::new()
    ///     .address("wg0", "100.64.0.1/32")?
    ///     .address("wg0", "fd7a:115c:a1e0::1/128")?;
    /// ```
    pub fn address(mut self, dev: &str, addr: &str) -> Result<Self, AddressParseError> {
        let declared = DeclaredAddress::parse(dev, addr)?;
        push_unique(&mut self.addresses, declared);
        Ok(self)
    }

    /// Add a route.
    ///
    /// The destination should be in CIDR notation (e.g., "10.0.0.0/8"), or
    /// `default` for the IPv4 default route. Host bits are masked off.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = NetworkConfig::new()
    ///     .route("100.64.0.0/10", |r| r.dev("wg0"))?
    ///     .route("0.0.0.0/0", |r| r.dev("wg0").table(52))?;
    /// ```
    pub fn route(
        mut self,
        dst: &str,
        f: impl FnOnce(RouteBuilder) -> RouteBuilder,
    ) -> Result<Self, RouteParseError> {
        let declared = f(RouteBuilder::new(dst)?).build()?;
        push_unique(&mut self.routes, declared);
        Ok(self)
    }

    /// Add a routing policy rule with the given priority.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = NetworkConfig::new()
    ///     .rule(5210, |r| r.fwmark(0x80000, 0xff0000).table(254))?
    ///     .rule(5270, |r| r.table(52))?;
    /// ```
    pub fn rule(
        mut self,
        priority: u32,
        f: impl FnOnce(RuleBuilder) -> RuleBuilder,
    ) -> Result<Self, RuleParseError> {
        let declared = f(RuleBuilder::new(priority)).build()?;
        push_unique(&mut self.rules, declared);
        Ok(self)
    }

    /// Append a DNS server. Order is preserved; duplicates are dropped.
    pub fn dns(mut self, server: IpAddr) -> Self {
        push_unique(&mut self.dns, server);
        self
    }

    /// Set the MTU of an interface.
    pub fn mtu(mut self, dev: &str, mtu: u32) -> Self {
        self.mtu = Some(DeclaredMtu {
            dev: dev.to_string(),
            mtu,
        });
        self
    }

    /// Get the configured addresses.
    pub fn addresses(&self) -> &[DeclaredAddress] {
        &self.addresses
    }

    /// Get the configured routes.
    pub fn routes(&self) -> &[DeclaredRoute] {
        &self.routes
    }

    /// Get the configured rules.
    pub fn rules(&self) -> &[DeclaredRule] {
        &self.rules
    }

    /// Get the configured DNS servers, in resolver order.
    pub fn dns_servers(&self) -> &[IpAddr] {
        &self.dns
    }

    /// Get the configured interface MTU.
    pub fn link_mtu(&self) -> Option<&DeclaredMtu> {
        self.mtu.as_ref()
    }

    /// Check if nothing is configured.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
            && self.routes.is_empty()
            && self.rules.is_empty()
            && self.dns.is_empty()
            && self.mtu.is_none()
    }

    /// Fold a confirmed mutation into this snapshot.
    ///
    /// Additions are idempotent and removals of absent entries are no-ops,
    /// matching how the reconciler treats "already exists" and "not found".
    pub fn apply_mutation(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::AddAddress(a) => push_unique(&mut self.addresses, a.clone()),
            Mutation::RemoveAddress(a) => self.addresses.retain(|x| x != a),
            Mutation::AddRoute(r) => push_unique(&mut self.routes, r.clone()),
            Mutation::RemoveRoute(r) => self.routes.retain(|x| x != r),
            Mutation::AddRule(r) => push_unique(&mut self.rules, r.clone()),
            Mutation::RemoveRule(r) => self.rules.retain(|x| x != r),
            Mutation::SetDns(servers) => {
                self.dns.clear();
                for server in servers {
                    push_unique(&mut self.dns, *server);
                }
            }
            Mutation::SetMtu(m) => self.mtu = Some(m.clone()),
        }
    }
}

impl PartialEq for NetworkConfig {
    fn eq(&self, other: &Self) -> bool {
        same_set(&self.addresses, &other.addresses)
            && same_set(&self.routes, &other.routes)
            && same_set(&self.rules, &other.rules)
            && self.dns == other.dns
            && self.mtu == other.mtu
    }
}

impl Eq for NetworkConfig {}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn same_set<T: Eq + Hash>(a: &[T], b: &[T]) -> bool {
    let a: HashSet<&T> = a.iter().collect();
    let b: HashSet<&T> = b.iter().collect();
    a == b
}

// ============================================================================
// Prefix helpers
// ============================================================================

/// Split "addr/len" into its parts and validate the prefix length.
fn parse_cidr(s: &str) -> Result<(IpAddr, u8), CidrError> {
    let (ip_str, prefix_str) = s
        .split_once('/')
        .ok_or_else(|| CidrError::MissingPrefix(s.to_string()))?;

    let address: IpAddr = ip_str
        .parse()
        .map_err(|_| CidrError::InvalidAddress(ip_str.to_string()))?;

    let prefix_len: u8 = prefix_str
        .parse()
        .map_err(|_| CidrError::InvalidPrefix(prefix_str.to_string()))?;

    let max = max_prefix(address);
    if prefix_len > max {
        return Err(CidrError::PrefixTooLarge {
            prefix: prefix_len,
            max,
        });
    }

    Ok((address, prefix_len))
}

enum CidrError {
    MissingPrefix(String),
    InvalidAddress(String),
    InvalidPrefix(String),
    PrefixTooLarge { prefix: u8, max: u8 },
}

fn max_prefix(addr: IpAddr) -> u8 {
    if addr.is_ipv4() { 32 } else { 128 }
}

/// Mask off the host bits of `addr`.
pub(crate) fn network_address(addr: IpAddr, prefix_len: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let mask = u32::MAX
                .checked_shl(32 - u32::from(prefix_len.min(32)))
                .unwrap_or(0);
            IpAddr::V4(Ipv4Addr::from(u32::from(v4) & mask))
        }
        IpAddr::V6(v6) => {
            let mask = u128::MAX
                .checked_shl(128 - u32::from(prefix_len.min(128)))
                .unwrap_or(0);
            IpAddr::V6(Ipv6Addr::from(u128::from(v6) & mask))
        }
    }
}

// ============================================================================
// Address Types
// ============================================================================

/// Declared address configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeclaredAddress {
    pub(crate) dev: String,
    pub(crate) address: IpAddr,
    pub(crate) prefix_len: u8,
}

impl DeclaredAddress {
    /// Parse an address from CIDR notation.
    pub fn parse(dev: &str, addr: &str) -> Result<Self, AddressParseError> {
        let (address, prefix_len) = parse_cidr(addr).map_err(|e| match e {
            CidrError::MissingPrefix(s) => AddressParseError::MissingPrefix(s),
            CidrError::InvalidAddress(s) => AddressParseError::InvalidAddress(s),
            CidrError::InvalidPrefix(s) => AddressParseError::InvalidPrefix(s),
            CidrError::PrefixTooLarge { prefix, max } => {
                AddressParseError::PrefixTooLarge { prefix, max }
            }
        })?;

        Ok(Self {
            dev: dev.to_string(),
            address,
            prefix_len,
        })
    }

    /// Get the device name.
    pub fn dev(&self) -> &str {
        &self.dev
    }

    /// Get the IP address.
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Get the prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Check if this is an IPv4 address.
    pub fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    /// Check if this is an IPv6 address.
    pub fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }
}

impl fmt::Display for DeclaredAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} dev {}", self.address, self.prefix_len, self.dev)
    }
}

/// Error parsing an address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// Address is missing prefix (no "/").
    #[error("address missing prefix: {0} (expected format: 100.64.0.1/32)")]
    MissingPrefix(String),
    /// Invalid IP address.
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),
    /// Invalid prefix length.
    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),
    /// Prefix length too large.
    #[error("prefix length {prefix} exceeds maximum {max}")]
    PrefixTooLarge { prefix: u8, max: u8 },
}

// ============================================================================
// Route Types
// ============================================================================

/// Declared route configuration.
///
/// Every field takes part in the route's identity: two routes that differ
/// only in metric are distinct and may coexist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeclaredRoute {
    pub(crate) destination: IpAddr,
    pub(crate) prefix_len: u8,
    pub(crate) gateway: Option<IpAddr>,
    pub(crate) dev: Option<String>,
    pub(crate) metric: Option<u32>,
    pub(crate) table: u32,
    pub(crate) route_type: DeclaredRouteType,
}

impl DeclaredRoute {
    /// Get the destination address.
    pub fn destination(&self) -> IpAddr {
        self.destination
    }

    /// Get the prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Get the gateway address.
    pub fn gateway(&self) -> Option<IpAddr> {
        self.gateway
    }

    /// Get the output device.
    pub fn dev(&self) -> Option<&str> {
        self.dev.as_deref()
    }

    /// Get the route metric.
    pub fn metric(&self) -> Option<u32> {
        self.metric
    }

    /// Get the routing table.
    pub fn table(&self) -> u32 {
        self.table
    }

    /// Get the route type.
    pub fn route_type(&self) -> DeclaredRouteType {
        self.route_type
    }

    /// Check if this is an IPv4 route.
    pub fn is_ipv4(&self) -> bool {
        self.destination.is_ipv4()
    }

    /// Check if this is an IPv6 route.
    pub fn is_ipv6(&self) -> bool {
        self.destination.is_ipv6()
    }
}

impl fmt::Display for DeclaredRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(kind) = self.route_type.keyword() {
            write!(f, "{} ", kind)?;
        }
        write!(f, "{}/{}", self.destination, self.prefix_len)?;
        if let Some(gw) = self.gateway {
            write!(f, " via {}", gw)?;
        }
        if let Some(dev) = &self.dev {
            write!(f, " dev {}", dev)?;
        }
        if let Some(metric) = self.metric {
            write!(f, " metric {}", metric)?;
        }
        if self.table != MAIN_TABLE {
            write!(f, " table {}", self.table)?;
        }
        Ok(())
    }
}

/// Route type for declared configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeclaredRouteType {
    /// Normal unicast route.
    #[default]
    Unicast,
    /// Blackhole (silently drop).
    Blackhole,
    /// Unreachable (ICMP unreachable).
    Unreachable,
    /// Prohibit (ICMP prohibited).
    Prohibit,
}

impl DeclaredRouteType {
    fn keyword(self) -> Option<&'static str> {
        match self {
            Self::Unicast => None,
            Self::Blackhole => Some("blackhole"),
            Self::Unreachable => Some("unreachable"),
            Self::Prohibit => Some("prohibit"),
        }
    }
}

/// Error parsing a route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteParseError {
    /// Destination is missing prefix.
    #[error("destination missing prefix: {0} (expected format: 10.0.0.0/8)")]
    MissingPrefix(String),
    /// Invalid destination address.
    #[error("invalid destination address: {0}")]
    InvalidDestination(String),
    /// Invalid prefix length.
    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),
    /// Prefix length too large.
    #[error("prefix length {prefix} exceeds maximum {max}")]
    PrefixTooLarge { prefix: u8, max: u8 },
    /// Invalid gateway address.
    #[error("invalid gateway address: {0}")]
    InvalidGateway(String),
    /// Gateway and destination belong to different address families.
    #[error("gateway {gateway} does not match the family of {destination}")]
    FamilyMismatch { destination: IpAddr, gateway: IpAddr },
}

/// Builder for route configuration.
#[derive(Debug)]
pub struct RouteBuilder {
    destination: IpAddr,
    prefix_len: u8,
    gateway: Option<IpAddr>,
    dev: Option<String>,
    metric: Option<u32>,
    table: u32,
    route_type: DeclaredRouteType,
    error: Option<RouteParseError>,
}

impl RouteBuilder {
    fn new(dst: &str) -> Result<Self, RouteParseError> {
        let (destination, prefix_len) = if dst == "default" {
            (IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
        } else {
            parse_cidr(dst).map_err(|e| match e {
                CidrError::MissingPrefix(s) => RouteParseError::MissingPrefix(s),
                CidrError::InvalidAddress(s) => RouteParseError::InvalidDestination(s),
                CidrError::InvalidPrefix(s) => RouteParseError::InvalidPrefix(s),
                CidrError::PrefixTooLarge { prefix, max } => {
                    RouteParseError::PrefixTooLarge { prefix, max }
                }
            })?
        };

        Ok(Self {
            destination: network_address(destination, prefix_len),
            prefix_len,
            gateway: None,
            dev: None,
            metric: None,
            table: MAIN_TABLE,
            route_type: DeclaredRouteType::default(),
            error: None,
        })
    }

    /// Set the gateway address.
    pub fn via(mut self, gateway: &str) -> Self {
        match gateway.parse::<IpAddr>() {
            Ok(gw) if gw.is_ipv4() != self.destination.is_ipv4() => {
                self.error.get_or_insert(RouteParseError::FamilyMismatch {
                    destination: self.destination,
                    gateway: gw,
                });
            }
            Ok(gw) => self.gateway = Some(gw),
            Err(_) => {
                self.error
                    .get_or_insert(RouteParseError::InvalidGateway(gateway.to_string()));
            }
        }
        self
    }

    /// Set the output device.
    pub fn dev(mut self, dev: &str) -> Self {
        self.dev = Some(dev.to_string());
        self
    }

    /// Set the route metric (priority).
    pub fn metric(mut self, metric: u32) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Set the routing table.
    pub fn table(mut self, table: u32) -> Self {
        self.table = table;
        self
    }

    /// Make this a blackhole route.
    pub fn blackhole(mut self) -> Self {
        self.route_type = DeclaredRouteType::Blackhole;
        self
    }

    /// Make this an unreachable route.
    pub fn unreachable(mut self) -> Self {
        self.route_type = DeclaredRouteType::Unreachable;
        self
    }

    /// Make this a prohibit route.
    pub fn prohibit(mut self) -> Self {
        self.route_type = DeclaredRouteType::Prohibit;
        self
    }

    fn build(self) -> Result<DeclaredRoute, RouteParseError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(DeclaredRoute {
            destination: self.destination,
            prefix_len: self.prefix_len,
            gateway: self.gateway,
            dev: self.dev,
            metric: self.metric,
            table: self.table,
            route_type: self.route_type,
        })
    }
}

// ============================================================================
// Rule Types
// ============================================================================

/// Address family of a routing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Family {
    /// IPv4 rule.
    #[default]
    Inet,
    /// IPv6 rule.
    Inet6,
}

impl Family {
    fn of(addr: IpAddr) -> Self {
        if addr.is_ipv4() { Self::Inet } else { Self::Inet6 }
    }
}

/// What a matching rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleAction {
    /// Look up the given routing table.
    Lookup(u32),
    /// Drop silently.
    Blackhole,
    /// Reject with ICMP unreachable.
    Unreachable,
    /// Reject with ICMP prohibited.
    Prohibit,
}

impl Default for RuleAction {
    fn default() -> Self {
        Self::Lookup(MAIN_TABLE)
    }
}

/// Declared routing policy rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeclaredRule {
    pub(crate) family: Family,
    pub(crate) priority: u32,
    pub(crate) src: Option<(IpAddr, u8)>,
    pub(crate) dst: Option<(IpAddr, u8)>,
    pub(crate) fwmark: Option<u32>,
    pub(crate) fwmask: Option<u32>,
    pub(crate) iif: Option<String>,
    pub(crate) action: RuleAction,
}

impl DeclaredRule {
    /// Get the address family.
    pub fn family(&self) -> Family {
        self.family
    }

    /// Get the rule priority.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Get the source selector.
    pub fn src(&self) -> Option<(IpAddr, u8)> {
        self.src
    }

    /// Get the destination selector.
    pub fn dst(&self) -> Option<(IpAddr, u8)> {
        self.dst
    }

    /// Get the firewall mark selector.
    pub fn fwmark(&self) -> Option<u32> {
        self.fwmark
    }

    /// Get the firewall mark mask.
    pub fn fwmask(&self) -> Option<u32> {
        self.fwmask
    }

    /// Get the input interface selector.
    pub fn iif(&self) -> Option<&str> {
        self.iif.as_deref()
    }

    /// Get the rule action.
    pub fn action(&self) -> RuleAction {
        self.action
    }
}

impl fmt::Display for DeclaredRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.family == Family::Inet6 {
            write!(f, "-6 ")?;
        }
        write!(f, "pref {}", self.priority)?;
        match self.src {
            Some((addr, len)) => write!(f, " from {}/{}", addr, len)?,
            None => write!(f, " from all")?,
        }
        if let Some((addr, len)) = self.dst {
            write!(f, " to {}/{}", addr, len)?;
        }
        if let Some(mark) = self.fwmark {
            write!(f, " fwmark {:#x}", mark)?;
            if let Some(mask) = self.fwmask {
                write!(f, "/{:#x}", mask)?;
            }
        }
        if let Some(iif) = &self.iif {
            write!(f, " iif {}", iif)?;
        }
        match self.action {
            RuleAction::Lookup(table) => write!(f, " lookup {}", table),
            RuleAction::Blackhole => write!(f, " blackhole"),
            RuleAction::Unreachable => write!(f, " unreachable"),
            RuleAction::Prohibit => write!(f, " prohibit"),
        }
    }
}

/// Kernel limit on interface names, including the terminating NUL.
const IFNAMSIZ: usize = 16;

/// Error parsing a rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleParseError {
    /// Selector is missing prefix.
    #[error("selector missing prefix: {0} (expected format: 10.0.0.0/8)")]
    MissingPrefix(String),
    /// Invalid selector address.
    #[error("invalid selector address: {0}")]
    InvalidAddress(String),
    /// Invalid prefix length.
    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),
    /// Prefix length too large.
    #[error("prefix length {prefix} exceeds maximum {max}")]
    PrefixTooLarge { prefix: u8, max: u8 },
    /// Selectors or explicit family disagree.
    #[error("rule {priority} mixes IPv4 and IPv6 selectors")]
    FamilyMismatch { priority: u32 },
    /// Interface name is empty or longer than the kernel allows.
    #[error("invalid interface name: {0:?}")]
    InvalidInterface(String),
}

/// Builder for rule configuration.
#[derive(Debug)]
pub struct RuleBuilder {
    priority: u32,
    family: Option<Family>,
    src: Option<(IpAddr, u8)>,
    dst: Option<(IpAddr, u8)>,
    fwmark: Option<u32>,
    fwmask: Option<u32>,
    iif: Option<String>,
    action: RuleAction,
    error: Option<RuleParseError>,
}

impl RuleBuilder {
    fn new(priority: u32) -> Self {
        Self {
            priority,
            family: None,
            src: None,
            dst: None,
            fwmark: None,
            fwmask: None,
            iif: None,
            action: RuleAction::default(),
            error: None,
        }
    }

    /// Make this an IPv4 rule.
    pub fn v4(self) -> Self {
        self.family(Family::Inet)
    }

    /// Make this an IPv6 rule.
    pub fn v6(self) -> Self {
        self.family(Family::Inet6)
    }

    fn family(mut self, family: Family) -> Self {
        self.require_family(family);
        self
    }

    fn require_family(&mut self, family: Family) {
        match self.family {
            Some(existing) if existing != family => {
                self.error.get_or_insert(RuleParseError::FamilyMismatch {
                    priority: self.priority,
                });
            }
            _ => self.family = Some(family),
        }
    }

    fn selector(&mut self, prefix: &str) -> Option<(IpAddr, u8)> {
        match parse_cidr(prefix) {
            Ok((addr, len)) => {
                self.require_family(Family::of(addr));
                Some((network_address(addr, len), len))
            }
            Err(e) => {
                self.error.get_or_insert(match e {
                    CidrError::MissingPrefix(s) => RuleParseError::MissingPrefix(s),
                    CidrError::InvalidAddress(s) => RuleParseError::InvalidAddress(s),
                    CidrError::InvalidPrefix(s) => RuleParseError::InvalidPrefix(s),
                    CidrError::PrefixTooLarge { prefix, max } => {
                        RuleParseError::PrefixTooLarge { prefix, max }
                    }
                });
                None
            }
        }
    }

    /// Match packets from the given source prefix.
    pub fn from(mut self, prefix: &str) -> Self {
        self.src = self.selector(prefix);
        self
    }

    /// Match packets to the given destination prefix.
    pub fn to(mut self, prefix: &str) -> Self {
        self.dst = self.selector(prefix);
        self
    }

    /// Match packets carrying `mark` under `mask`.
    pub fn fwmark(mut self, mark: u32, mask: u32) -> Self {
        self.fwmark = Some(mark);
        self.fwmask = Some(mask);
        self
    }

    /// Match packets arriving on the given interface.
    pub fn iif(mut self, dev: &str) -> Self {
        if dev.is_empty() || dev.len() >= IFNAMSIZ {
            self.error
                .get_or_insert(RuleParseError::InvalidInterface(dev.to_string()));
        }
        self.iif = Some(dev.to_string());
        self
    }

    /// Look up the given routing table.
    pub fn table(mut self, table: u32) -> Self {
        self.action = RuleAction::Lookup(table);
        self
    }

    /// Silently drop matching packets.
    pub fn blackhole(mut self) -> Self {
        self.action = RuleAction::Blackhole;
        self
    }

    /// Reject matching packets as unreachable.
    pub fn unreachable(mut self) -> Self {
        self.action = RuleAction::Unreachable;
        self
    }

    /// Reject matching packets as prohibited.
    pub fn prohibit(mut self) -> Self {
        self.action = RuleAction::Prohibit;
        self
    }

    fn build(self) -> Result<DeclaredRule, RuleParseError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(DeclaredRule {
            family: self.family.unwrap_or_default(),
            priority: self.priority,
            src: self.src,
            dst: self.dst,
            fwmark: self.fwmark,
            fwmask: self.fwmask,
            iif: self.iif,
            action: self.action,
        })
    }
}

// ============================================================================
// MTU
// ============================================================================

/// Declared interface MTU.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeclaredMtu {
    pub(crate) dev: String,
    pub(crate) mtu: u32,
}

impl DeclaredMtu {
    /// Get the device name.
    pub fn dev(&self) -> &str {
        &self.dev
    }

    /// Get the MTU value.
    pub fn mtu(&self) -> u32 {
        self.mtu
    }
}

impl fmt::Display for DeclaredMtu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mtu {}", self.dev, self.mtu)
    }
}
