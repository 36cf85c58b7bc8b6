//! # ferrite-facade: a policy-gated master/replica command facade
//!
//! A blocking client for Redis-compatible stores that routes reads to a
//! replica and writes to the master, and refuses whole categories of
//! commands according to a per-instance allow-list.
//!
//! ## Features
//!
//! - **Action policy**: every operation is classified as one of seven
//!   [`Action`]s; calls outside the configured [`ActionPolicy`] fail with
//!   [`Error::AuthorizationDenied`] before a connection is borrowed
//! - **Read/write split**: reads prefer the replica pool and fall back to
//!   the master once; writes always go to the master
//! - **Connection pooling**: bounded, lazily filled pools that drop broken
//!   connections
//! - **Composite operations**: deduplicating list push, single-element list
//!   removal, counters with creation-time expiry, server-clock timestamps,
//!   pattern subscriptions and scoped transactions
//! - **RESP2 protocol** over plain TCP
//!
//! ## Quick Start
//!
//! ```ignore
//! use ferrite_facade::{CommandFacade, FacadeConfig};
//!
//! fn main() -> ferrite_facade::Result<()> {
//!     let config = FacadeConfig::from_file("facade.toml")?;
//!     let facade = CommandFacade::from_config(config)?;
//!
//!     facade.lpush_unique("tags", &["a", "b"], Some(3600))?;
//!     let now = facade.current_time()?;
//!     println!("server time = {}", now);
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod facade;
pub mod policy;
pub mod pool;
pub mod resp;
pub mod serializer;
pub mod supervisor;
pub mod types;

// ── Re-exports for ergonomic top-level usage ────────────────────────────────

pub use commands::geo::{GeoCoordinate, GeoRadiusOptions, GeoRadiusResponse, GeoSort, GeoUnit};
pub use commands::pubsub::{MessageHandler, Unsubscribe};
pub use commands::strings::SetOptions;
pub use config::{EndpointConfig, FacadeConfig, LogFormat, LoggingConfig, PolicyConfig, PoolSettings};
pub use error::{Error, Result};
pub use facade::{CommandFacade, Transaction};
pub use policy::{Action, ActionPolicy, Operation, Routing};
pub use pool::{Pool, PoolStats, PooledConnection};
pub use serializer::{JsonSerializer, Serializer};
pub use supervisor::ConnectionSupervisor;
pub use types::{ToArg, Value};
