//! Dual-mode database connection management: a pooled native client and a
//! document-mapper session, lazily connected, health-checked, and torn down
//! gracefully on process exit.

mod connector;
mod manager;
mod mongo;

pub use connector::Connector;
pub use manager::{ConnectionManager, HealthReport};
pub use mongo::{NativeConnector, OrmConnector, OrmSession};

/// The concrete manager wired to MongoDB, as used by the running service.
pub type MongoConnectionManager = ConnectionManager<NativeConnector, OrmConnector>;
