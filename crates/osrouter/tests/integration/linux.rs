//! Linux applier integration tests.
//!
//! Each test runs in a private network namespace with a dummy interface.
//! Requires root.

use osrouter::platform::LinuxApplier;
use osrouter::{ErrorKind, Mutation, NetworkConfig, PlatformApplier, Reconciler};

use crate::common::{in_netns, ip};

fn setup_dummy() {
    ip(&["link", "add", "dummy0", "type", "dummy"]);
    ip(&["link", "set", "dummy0", "up"]);
}

fn desired() -> NetworkConfig {
    NetworkConfig::new()
        .address("dummy0", "100.64.0.1/24")
        .unwrap()
        .route("10.0.0.0/8", |r| r.dev("dummy0").table(52))
        .unwrap()
        .route("172.16.0.0/12", |r| r.via("100.64.0.254").metric(50))
        .unwrap()
        .rule(5270, |r| r.from("100.64.0.0/24").table(52))
        .unwrap()
        .mtu("dummy0", 1280)
}

#[test]
fn test_reconcile_and_clear() {
    require_root!();

    in_netns(|| async {
        setup_dummy();
        let reconciler = Reconciler::new(LinuxApplier::new());

        reconciler.set_desired(desired()).await.unwrap();

        let addrs = ip(&["-4", "addr", "show", "dev", "dummy0"]);
        assert!(addrs.contains("100.64.0.1/24"), "{addrs}");
        let routes = ip(&["route", "show", "table", "52"]);
        assert!(routes.contains("10.0.0.0/8 dev dummy0"), "{routes}");
        let routes = ip(&["route", "show"]);
        assert!(routes.contains("172.16.0.0/12 via 100.64.0.254"), "{routes}");
        assert!(routes.contains("metric 50"), "{routes}");
        let rules = ip(&["rule", "show"]);
        assert!(rules.contains("5270:"), "{rules}");
        assert!(rules.contains("from 100.64.0.0/24 lookup 52"), "{rules}");
        let link = ip(&["link", "show", "dev", "dummy0"]);
        assert!(link.contains("mtu 1280"), "{link}");

        reconciler.clear().await.unwrap();

        assert!(!ip(&["-4", "addr", "show", "dev", "dummy0"]).contains("100.64.0.1"));
        assert!(ip(&["route", "show", "table", "52"]).trim().is_empty());
        assert!(!ip(&["rule", "show"]).contains("5270"));
        assert!(reconciler.current().is_empty());
    });
}

#[test]
fn test_out_of_band_changes_are_tolerated() {
    require_root!();

    in_netns(|| async {
        setup_dummy();
        let reconciler = Reconciler::new(LinuxApplier::new());

        // Already present before the first batch
        ip(&["addr", "add", "100.64.0.1/24", "dev", "dummy0"]);
        reconciler.set_desired(desired()).await.unwrap();

        // Removed behind our back
        ip(&["route", "del", "10.0.0.0/8", "table", "52"]);
        reconciler.clear().await.unwrap();
        assert!(reconciler.current().is_empty());
    });
}

#[test]
fn test_kernel_errors_are_classified() {
    require_root!();

    in_netns(|| async {
        setup_dummy();
        let applier = LinuxApplier::new();

        let config = NetworkConfig::new()
            .route("10.0.0.0/8", |r| r.via("192.0.2.1"))
            .unwrap();
        let err = applier
            .apply(&Mutation::AddRoute(config.routes()[0].clone()))
            .await
            .unwrap_err();
        // Gateway is not reachable from any interface
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let config = NetworkConfig::new()
            .address("dummy0", "100.64.0.1/24")
            .unwrap();
        let add = Mutation::AddAddress(config.addresses()[0].clone());
        applier.apply(&add).await.unwrap();
        let err = applier.apply(&add).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let remove = Mutation::RemoveAddress(config.addresses()[0].clone());
        applier.apply(&remove).await.unwrap();
        let err = applier.apply(&remove).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    });
}
