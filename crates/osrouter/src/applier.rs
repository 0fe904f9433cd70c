//! The seam between the reconciler and an operating system.

use async_trait::async_trait;

use crate::config::Mutation;
use crate::error::ApplyError;

/// Result of applying one mutation.
pub type ApplyResult = std::result::Result<(), ApplyError>;

/// Applies single mutations to the operating system.
///
/// Implementations must classify every failure with an
/// [`ErrorKind`](crate::ErrorKind) and, where they can tell, report whether
/// the OS changed anyway through [`AppliedState`](crate::AppliedState).
/// Removing something that is already gone should be reported as
/// [`ErrorKind::NotFound`](crate::ErrorKind::NotFound), and adding something
/// already present as [`ErrorKind::AlreadyExists`](crate::ErrorKind::AlreadyExists);
/// the reconciler treats both as success.
///
/// Calls are never concurrent for the same reconciler.
#[async_trait]
pub trait PlatformApplier: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Apply one mutation.
    async fn apply(&self, mutation: &Mutation) -> ApplyResult;
}

#[async_trait]
impl<T: PlatformApplier + ?Sized> PlatformApplier for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn apply(&self, mutation: &Mutation) -> ApplyResult {
        (**self).apply(mutation).await
    }
}

#[async_trait]
impl<T: PlatformApplier + ?Sized> PlatformApplier for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn apply(&self, mutation: &Mutation) -> ApplyResult {
        (**self).apply(mutation).await
    }
}
