//! Example command - generate example configuration files.

use clap::{Args, ValueEnum};

#[derive(Args)]
pub struct ExampleArgs {
    /// Show full example with all features
    #[arg(long)]
    pub full: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub format: OutputFormat,

    /// Example type to generate
    #[arg(short, long, value_enum, default_value = "tunnel")]
    pub example: ExampleType,
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, ValueEnum)]
pub enum ExampleType {
    /// Overlay tunnel with its own routing table
    Tunnel,
    /// Send all traffic through a tunnel except marked packets
    ExitNode,
    /// Drop traffic to private ranges
    Blackhole,
}

pub fn run(args: ExampleArgs) -> anyhow::Result<()> {
    let example = if args.full {
        FULL_EXAMPLE
    } else {
        match args.example {
            ExampleType::Tunnel => TUNNEL_EXAMPLE,
            ExampleType::ExitNode => EXIT_NODE_EXAMPLE,
            ExampleType::Blackhole => BLACKHOLE_EXAMPLE,
        }
    };

    match args.format {
        OutputFormat::Yaml => {
            println!("{}", example);
        }
        OutputFormat::Json => {
            // Convert YAML to JSON
            let value: serde_yaml::Value = serde_yaml::from_str(example)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

const TUNNEL_EXAMPLE: &str = r#"# Overlay tunnel
# Routes the overlay range through wg0 using table 52

addresses:
  - dev: wg0
    address: 100.64.0.1/32
  - dev: wg0
    address: fd7a:115c:a1e0::1/128

routes:
  - destination: 100.64.0.0/10
    dev: wg0
    table: 52
  - destination: fd7a:115c:a1e0::/48
    dev: wg0
    table: 52

rules:
  # Consult table 52 before main
  - priority: 5270
    table: 52
  - priority: 5270
    family: inet6
    table: 52

dns:
  - 100.100.100.100

mtu:
  dev: wg0
  mtu: 1280
"#;

const EXIT_NODE_EXAMPLE: &str = r#"# Exit node
# Default route through wg0, except for packets the tunnel itself
# sends (marked 0x80000)

addresses:
  - dev: wg0
    address: 100.64.0.1/32

routes:
  - destination: default
    dev: wg0
    table: 52

rules:
  # Tunnel traffic uses the main table
  - priority: 5210
    fwmark: 0x80000
    fwmask: 0xff0000
    table: 254
  # Everything else goes through table 52
  - priority: 5270
    table: 52
"#;

const BLACKHOLE_EXAMPLE: &str = r#"# Drop traffic to private ranges

routes:
  - destination: 10.0.0.0/8
    type: blackhole
  - destination: 172.16.0.0/12
    type: unreachable
  - destination: 192.168.0.0/16
    type: prohibit
"#;

const FULL_EXAMPLE: &str = r#"# Full configuration example
# This shows all supported configuration options

addresses:
  # Interface and address with prefix length
  - dev: wg0
    address: 100.64.0.1/32
  - dev: wg0
    address: fd7a:115c:a1e0::1/128

routes:
  # Directly connected through an interface
  - destination: 100.64.0.0/10
    dev: wg0
    table: 52

  # Via a gateway with a metric, in the main table
  - destination: 10.0.0.0/8
    gateway: 100.64.0.254
    dev: wg0
    metric: 100

  # Special route types: unicast (default), blackhole, unreachable, prohibit
  - destination: 192.0.2.0/24
    type: blackhole

rules:
  # Lookup is the default action; table defaults to main (254)
  - priority: 5210
    fwmark: 0x80000
    fwmask: 0xff0000
    table: 254

  # Source and destination selectors, input interface
  - priority: 5230
    from: 100.64.0.0/10
    to: 10.0.0.0/8
    iif: wg0
    table: 52

  # IPv6 rule without selectors needs an explicit family
  - priority: 5270
    family: inet6
    table: 52

  # Reject instead of lookup
  - priority: 5290
    from: 192.0.2.0/24
    action: unreachable

# Resolvers, in order
dns:
  - 100.100.100.100
  - fd7a:115c:a1e0::53

# At most one interface MTU
mtu:
  dev: wg0
  mtu: 1280
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file;

    #[test]
    fn test_examples_are_valid() {
        for example in [
            TUNNEL_EXAMPLE,
            EXIT_NODE_EXAMPLE,
            BLACKHOLE_EXAMPLE,
            FULL_EXAMPLE,
        ] {
            let config = file::parse(example, false).unwrap().into_config().unwrap();
            assert!(!config.is_empty());
        }
    }

    #[test]
    fn test_full_example_contents() {
        let config = file::parse(FULL_EXAMPLE, false)
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.addresses().len(), 2);
        assert_eq!(config.routes().len(), 3);
        assert_eq!(config.rules().len(), 4);
        assert_eq!(config.dns_servers().len(), 2);
        assert!(config.link_mtu().is_some());
    }
}
