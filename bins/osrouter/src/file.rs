//! Configuration file schema.

use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, bail};
use osrouter::NetworkConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<AddressEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<MtuEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressEntry {
    pub dev: String,
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteEntry {
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<u32>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub route_type: Option<RouteKind>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Unicast,
    Blackhole,
    Unreachable,
    Prohibit,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<FamilyKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fwmark: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fwmask: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iif: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleKind>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyKind {
    Inet,
    Inet6,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Lookup,
    Blackhole,
    Unreachable,
    Prohibit,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MtuEntry {
    pub dev: String,
    pub mtu: u32,
}

/// Read a configuration file, YAML unless the extension is `.json`.
pub fn load(path: &Path) -> anyhow::Result<NetworkConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let file = parse(&text, is_json(path)).with_context(|| format!("invalid {}", path.display()))?;
    file.into_config()
        .with_context(|| format!("invalid {}", path.display()))
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub fn parse(text: &str, json: bool) -> anyhow::Result<ConfigFile> {
    let file = if json {
        serde_json::from_str(text)?
    } else {
        serde_yaml::from_str(text)?
    };
    Ok(file)
}

impl ConfigFile {
    /// Convert into a validated configuration.
    pub fn into_config(self) -> anyhow::Result<NetworkConfig> {
        let mut config = NetworkConfig::new();

        for entry in &self.addresses {
            config = config.address(&entry.dev, &entry.address)?;
        }

        for entry in &self.routes {
            config = config.route(&entry.destination, |mut r| {
                if let Some(gw) = &entry.gateway {
                    r = r.via(gw);
                }
                if let Some(dev) = &entry.dev {
                    r = r.dev(dev);
                }
                if let Some(metric) = entry.metric {
                    r = r.metric(metric);
                }
                if let Some(table) = entry.table {
                    r = r.table(table);
                }
                match entry.route_type {
                    Some(RouteKind::Blackhole) => r.blackhole(),
                    Some(RouteKind::Unreachable) => r.unreachable(),
                    Some(RouteKind::Prohibit) => r.prohibit(),
                    Some(RouteKind::Unicast) | None => r,
                }
            })?;
        }

        for entry in &self.rules {
            if entry.fwmask.is_some() && entry.fwmark.is_none() {
                bail!("rule {}: fwmask without fwmark", entry.priority);
            }
            if entry.table.is_some() && !matches!(entry.action, None | Some(RuleKind::Lookup)) {
                bail!("rule {}: table only applies to lookup rules", entry.priority);
            }

            config = config.rule(entry.priority, |mut r| {
                match entry.family {
                    Some(FamilyKind::Inet) => r = r.v4(),
                    Some(FamilyKind::Inet6) => r = r.v6(),
                    None => {}
                }
                if let Some(from) = &entry.from {
                    r = r.from(from);
                }
                if let Some(to) = &entry.to {
                    r = r.to(to);
                }
                if let Some(mark) = entry.fwmark {
                    r = r.fwmark(mark, entry.fwmask.unwrap_or(u32::MAX));
                }
                if let Some(iif) = &entry.iif {
                    r = r.iif(iif);
                }
                if let Some(table) = entry.table {
                    r = r.table(table);
                }
                match entry.action {
                    Some(RuleKind::Blackhole) => r.blackhole(),
                    Some(RuleKind::Unreachable) => r.unreachable(),
                    Some(RuleKind::Prohibit) => r.prohibit(),
                    Some(RuleKind::Lookup) | None => r,
                }
            })?;
        }

        for server in &self.dns {
            config = config.dns(*server);
        }

        if let Some(mtu) = &self.mtu {
            config = config.mtu(&mtu.dev, mtu.mtu);
        }

        Ok(config)
    }
}
