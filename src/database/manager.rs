use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::database::Connector;
use crate::error::{AppError, Result};

/// Combined result of probing both connections. One side failing never
/// hides the other side's result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub native: bool,
    pub orm_connected: bool,
    pub latency_ms: u64,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.native && self.orm_connected
    }
}

/// One cached connection of a single kind.
///
/// The handle lives behind an async mutex that is held for the whole
/// connect, so concurrent callers on an empty slot queue up behind one
/// attempt instead of each opening their own connection. A failed attempt
/// leaves the slot empty and the next caller starts fresh.
struct ConnectionSlot<C: Connector> {
    connector: C,
    handle: Mutex<Option<C::Handle>>,
}

impl<C: Connector> ConnectionSlot<C> {
    fn new(connector: C) -> Self {
        Self {
            connector,
            handle: Mutex::new(None),
        }
    }

    /// Return the cached handle if it still answers a probe, otherwise
    /// (re)connect. Callers that arrive while a connect is in flight wait
    /// for it and then reuse its handle.
    async fn acquire(&self) -> Result<C::Handle> {
        let mut cached = self.handle.lock().await;

        if let Some(handle) = cached.as_ref() {
            match self.connector.ping(handle).await {
                Ok(()) => {
                    debug!("Reusing cached connection");
                    return Ok(handle.clone());
                }
                Err(e) => {
                    warn!("Cached connection failed liveness probe, reconnecting: {}", e);
                    *cached = None;
                }
            }
        }

        let handle = self.connector.connect().await?;
        *cached = Some(handle.clone());
        Ok(handle)
    }

    /// Probe the cached handle without connecting. A failed probe clears
    /// the slot so the next acquire reconnects; an empty slot reports
    /// not-connected.
    async fn probe(&self) -> bool {
        let mut cached = self.handle.lock().await;
        match cached.as_ref() {
            Some(handle) => match self.connector.ping(handle).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Liveness probe failed: {}", e);
                    *cached = None;
                    false
                }
            },
            None => false,
        }
    }

    /// Close and forget the cached handle, if any. Close failures are
    /// logged; shutdown is best-effort.
    async fn close(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = self.connector.close(handle).await {
                error!("Failed to close connection: {}", e);
            }
        }
    }
}

/// Owns the pooled native client and the document-mapper session, lazily
/// connected and reused across calls for the life of the process.
///
/// Cloning is cheap and shares the same cached connections, so one manager
/// constructed at startup can be handed to every request handler.
pub struct ConnectionManager<N: Connector, O: Connector> {
    inner: Arc<ManagerInner<N, O>>,
}

struct ManagerInner<N: Connector, O: Connector> {
    native: ConnectionSlot<N>,
    orm: ConnectionSlot<O>,
    connect_timeout: Duration,
}

impl<N: Connector, O: Connector> Clone for ConnectionManager<N, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N: Connector, O: Connector> ConnectionManager<N, O> {
    pub fn new(native: N, orm: O, connect_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                native: ConnectionSlot::new(native),
                orm: ConnectionSlot::new(orm),
                connect_timeout,
            }),
        }
    }

    /// Live native handle, connecting on first use.
    pub async fn connect_native(&self) -> Result<N::Handle> {
        self.inner.native.acquire().await
    }

    /// Live document-mapper session, connecting on first use. Its
    /// lifecycle is independent of the native client.
    pub async fn connect_orm(&self) -> Result<O::Handle> {
        self.inner.orm.acquire().await
    }

    /// Ensure both connections are live and return the native handle for
    /// direct queries, failing with a timeout error if the combined attempt
    /// takes too long.
    ///
    /// The timeout races the attempt but does not cancel it: the work runs
    /// in a spawned task and a late success still populates the cached
    /// slots for the next call.
    pub async fn db_connect(&self) -> Result<N::Handle> {
        let manager = self.clone();
        let attempt = tokio::spawn(async move {
            let (native, _session) =
                tokio::try_join!(manager.connect_native(), manager.connect_orm())?;
            Ok::<_, AppError>(native)
        });

        match tokio::time::timeout(self.inner.connect_timeout, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(AppError::InternalServerError(format!(
                "Connection task failed: {}",
                join_err
            ))),
            Err(_) => Err(AppError::ConnectionTimeout(format!(
                "Database connection not ready after {:?}",
                self.inner.connect_timeout
            ))),
        }
    }

    /// Probe both connections concurrently and report the combined
    /// wall-clock latency. Each side is judged independently.
    pub async fn check_health(&self) -> HealthReport {
        let started = Instant::now();
        let (native, orm_connected) =
            tokio::join!(self.inner.native.probe(), self.inner.orm.probe());

        let report = HealthReport {
            native,
            orm_connected,
            latency_ms: started.elapsed().as_millis() as u64,
            checked_at: Utc::now(),
        };
        debug!(
            "Health check: native={} orm={} ({}ms)",
            report.native, report.orm_connected, report.latency_ms
        );
        report
    }

    /// Graceful shutdown: close both connections concurrently and clear the
    /// cached state. Idempotent; once the slots are empty, repeated calls
    /// are no-ops, so multiple termination signals are harmless.
    pub async fn close_all(&self) {
        info!("🛑 Closing database connections...");
        tokio::join!(self.inner.native.close(), self.inner.orm.close());
        info!("✅ Database connections closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Stub driver that counts connects, pings, and closes, with switchable
    /// failure modes and an optional connect delay.
    #[derive(Clone, Default)]
    struct StubConnector {
        connects: Arc<AtomicUsize>,
        pings: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        fail_connect: Arc<AtomicBool>,
        fail_ping: Arc<AtomicBool>,
        connect_delay: Duration,
    }

    impl StubConnector {
        fn with_connect_delay(delay: Duration) -> Self {
            Self {
                connect_delay: delay,
                ..Self::default()
            }
        }

        fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        fn close_count(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for StubConnector {
        type Handle = usize;

        async fn connect(&self) -> Result<usize> {
            let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.connect_delay.is_zero() {
                tokio::time::sleep(self.connect_delay).await;
            }
            if self.fail_connect.load(Ordering::SeqCst) {
                return Err(AppError::DatabaseError("stub connect refused".to_string()));
            }
            Ok(attempt)
        }

        async fn ping(&self, _handle: &usize) -> Result<()> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.fail_ping.load(Ordering::SeqCst) {
                return Err(AppError::DatabaseError("stub ping refused".to_string()));
            }
            Ok(())
        }

        async fn close(&self, _handle: usize) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn make_manager(
        native: &StubConnector,
        orm: &StubConnector,
    ) -> ConnectionManager<StubConnector, StubConnector> {
        ConnectionManager::new(native.clone(), orm.clone(), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_sequential_calls_reuse_one_connection() {
        let native = StubConnector::default();
        let orm = StubConnector::default();
        let manager = make_manager(&native, &orm);

        let first = manager.connect_native().await.unwrap();
        let second = manager.connect_native().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(native.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_attempt() {
        let native = StubConnector::with_connect_delay(Duration::from_millis(20));
        let orm = StubConnector::default();
        let manager = make_manager(&native, &orm);

        let (a, b, c, d, e) = tokio::join!(
            manager.connect_native(),
            manager.connect_native(),
            manager.connect_native(),
            manager.connect_native(),
            manager.connect_native(),
        );

        let handles = [a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap(), e.unwrap()];
        assert_eq!(native.connect_count(), 1);
        assert!(handles.iter().all(|h| *h == handles[0]));
    }

    #[tokio::test]
    async fn test_failed_connect_clears_slot_for_retry() {
        let native = StubConnector::default();
        let orm = StubConnector::default();
        let manager = make_manager(&native, &orm);

        native.fail_connect.store(true, Ordering::SeqCst);
        assert!(manager.connect_native().await.is_err());
        assert_eq!(native.connect_count(), 1);

        native.fail_connect.store(false, Ordering::SeqCst);
        assert!(manager.connect_native().await.is_ok());
        assert_eq!(native.connect_count(), 2, "next call gets a fresh attempt");
    }

    #[tokio::test]
    async fn test_failed_probe_triggers_reconnect() {
        let native = StubConnector::default();
        let orm = StubConnector::default();
        let manager = make_manager(&native, &orm);

        manager.connect_native().await.unwrap();
        assert_eq!(native.connect_count(), 1);

        native.fail_ping.store(true, Ordering::SeqCst);
        let report = manager.check_health().await;
        assert!(!report.native);

        // The stale handle was dropped; the next acquire reconnects.
        native.fail_ping.store(false, Ordering::SeqCst);
        manager.connect_native().await.unwrap();
        assert_eq!(native.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_health_sides_fail_independently() {
        let native = StubConnector::default();
        let orm = StubConnector::default();
        let manager = make_manager(&native, &orm);

        let report = manager.check_health().await;
        assert!(!report.native, "nothing connected yet");
        assert!(!report.orm_connected);
        assert!(!report.is_healthy());

        manager.connect_native().await.unwrap();
        manager.connect_orm().await.unwrap();
        orm.fail_ping.store(true, Ordering::SeqCst);

        let report = manager.check_health().await;
        assert!(report.native, "native side unaffected by ORM failure");
        assert!(!report.orm_connected);
    }

    #[tokio::test]
    async fn test_orm_slot_is_independent() {
        let native = StubConnector::default();
        let orm = StubConnector::default();
        let manager = make_manager(&native, &orm);

        manager.connect_orm().await.unwrap();
        assert_eq!(orm.connect_count(), 1);
        assert_eq!(native.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_db_connect_establishes_both_and_returns_native() {
        let native = StubConnector::default();
        let orm = StubConnector::default();
        let manager = make_manager(&native, &orm);

        manager.db_connect().await.unwrap();
        assert_eq!(native.connect_count(), 1);
        assert_eq!(orm.connect_count(), 1);

        let report = manager.check_health().await;
        assert!(report.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_db_connect_times_out_without_cancelling() {
        let native = StubConnector::with_connect_delay(Duration::from_secs(30));
        let orm = StubConnector::default();
        let manager = ConnectionManager::new(native.clone(), orm.clone(), Duration::from_secs(10));

        let result = manager.db_connect().await;
        assert!(matches!(result, Err(AppError::ConnectionTimeout(_))));

        // The losing attempt keeps running and eventually fills the slot.
        tokio::time::sleep(Duration::from_secs(60)).await;
        manager.connect_native().await.unwrap();
        assert_eq!(native.connect_count(), 1, "late success was kept");
    }

    #[tokio::test]
    async fn test_close_all_is_idempotent() {
        let native = StubConnector::default();
        let orm = StubConnector::default();
        let manager = make_manager(&native, &orm);

        manager.connect_native().await.unwrap();
        manager.connect_orm().await.unwrap();

        manager.close_all().await;
        manager.close_all().await;

        assert_eq!(native.close_count(), 1, "each handle closed once");
        assert_eq!(orm.close_count(), 1);

        let report = manager.check_health().await;
        assert!(!report.native);
        assert!(!report.orm_connected);
    }
}
