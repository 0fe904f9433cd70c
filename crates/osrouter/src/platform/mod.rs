//! Built-in platform appliers.

pub mod dry_run;
#[cfg(target_os = "linux")]
pub mod linux;

use crate::applier::PlatformApplier;
use crate::registry::RegistryBuilder;

pub use dry_run::DryRunApplier;
#[cfg(target_os = "linux")]
pub use linux::LinuxApplier;

/// Register the appliers available on this target.
///
/// `dry-run` is always available; `linux` only on Linux.
pub fn register_builtin(builder: &mut RegistryBuilder) {
    builder.register(dry_run::PLATFORM_ID, new_dry_run);
    #[cfg(target_os = "linux")]
    {
        builder.register("linux", new_linux);
    }
}

fn new_dry_run() -> Box<dyn PlatformApplier> {
    Box::new(DryRunApplier::new())
}

#[cfg(target_os = "linux")]
fn new_linux() -> Box<dyn PlatformApplier> {
    Box::new(LinuxApplier::new())
}
