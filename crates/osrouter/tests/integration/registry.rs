//! Platform registry integration tests.
//!
//! The registry is process-wide, so everything that touches the installed
//! table lives in a single test.

use osrouter::registry::{self, RegistryBuilder};
use osrouter::{Error, NetworkConfig, PlatformApplier, Reconciler};

fn scripted() -> Box<dyn PlatformApplier> {
    Box::new(crate::common::ScriptedApplier::default())
}

#[tokio::test]
async fn test_install_and_reconcile_through_registry() {
    assert!(matches!(
        Reconciler::for_platform("dry-run"),
        Err(Error::RegistryNotInstalled)
    ));

    let mut builder = RegistryBuilder::new();
    osrouter::platform::register_builtin(&mut builder);
    registry::register(&mut builder, "scripted", scripted);
    builder.install().unwrap();

    let installed = registry::global().unwrap();
    let platforms: Vec<_> = installed.platforms().collect();
    assert!(platforms.contains(&"dry-run"));
    assert!(platforms.contains(&"scripted"));

    let reconciler = Reconciler::for_platform("dry-run").unwrap();
    assert_eq!(reconciler.platform(), "dry-run");
    let desired = NetworkConfig::new().address("wg0", "100.64.0.1/32").unwrap();
    reconciler.set_desired(desired.clone()).await.unwrap();
    assert_eq!(reconciler.current(), desired);

    assert!(matches!(
        Reconciler::for_platform("plan9"),
        Err(Error::UnknownPlatform(id)) if id == "plan9"
    ));

    // Frozen after install
    let mut late = RegistryBuilder::new();
    late.register("late", scripted);
    assert!(matches!(late.install(), Err(Error::RegistryInstalled)));
    assert!(registry::global().unwrap().lookup("late").is_none());
}

#[test]
#[should_panic(expected = "registered twice")]
fn test_duplicate_platform_panics() {
    let mut builder = RegistryBuilder::new();
    registry::register(&mut builder, "scripted", scripted);
    registry::register(&mut builder, "scripted", scripted);
}
