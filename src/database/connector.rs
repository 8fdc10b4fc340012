use async_trait::async_trait;

use crate::error::Result;

/// Driver seam between the connection manager and a concrete database
/// client. The manager only ever creates, probes, and closes handles
/// through this trait, so it can be exercised against stub drivers.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// A live connection handle. Cloning shares the underlying connection;
    /// it never opens a new one.
    type Handle: Clone + Send + Sync + 'static;

    /// Establish a new connection. One attempt, no retries; the caller
    /// decides whether and when to try again.
    async fn connect(&self) -> Result<Self::Handle>;

    /// Lightweight liveness probe of an existing handle.
    async fn ping(&self, handle: &Self::Handle) -> Result<()>;

    /// Tear down a handle. Best-effort; callers log failures rather than
    /// propagate them during shutdown.
    async fn close(&self, handle: Self::Handle) -> Result<()>;
}
