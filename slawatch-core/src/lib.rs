//! Alert lifecycle and telemetry synchronization for the SLA risk console.
//!
//! The backend owns every alert and prediction; this crate keeps a
//! consistent, periodically refreshed view of it and issues the operator
//! commands (acknowledge, resolve, record action) against it.

pub mod alerts;
pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod feeds;
pub mod gateway;
pub mod models;
pub mod normalize;
pub mod scheduler;
pub mod session;

pub use alerts::{AlertController, AlertSnapshot};
pub use config::ConsoleConfig;
pub use context::Console;
pub use error::{ConsoleError, Result, SessionError};
pub use feeds::{Connectivity, ConnectivityMonitor, LiveFeed};
pub use gateway::{Gateway, RequestOptions};
pub use scheduler::{LoopState, Scheduler};
pub use session::{FileStore, KeyValueStore, KeyringStore, MemoryStore, SessionStore};
