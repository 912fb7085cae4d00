//! Offline cache gateway.
//!
//! Every outbound resource request goes through an `OfflineCacheGateway`,
//! which serves GETs from a local, disk-backed cache when it can and keeps
//! the menu usable without a network connection.
//!
//! Each deployment is a *generation*: a named cache populated from a fixed
//! asset manifest at install time. Activating a generation deletes every
//! other named cache; the cache name is the only versioning mechanism, so
//! changing core assets means bumping it.
//!
//! - `fetch`: requests, responses and the `Fetcher` network abstraction
//! - `storage`: named caches on disk
//! - `worker`: the install/activate/intercept lifecycle
//! - `registration`: active and waiting generations, control messages

pub mod error;
pub mod fetch;
pub mod registration;
pub mod storage;
pub mod worker;

pub use error::{CacheError, GatewayError, NetworkError};
pub use fetch::{Fetcher, HttpFetcher, Request, Response};
pub use registration::Registration;
pub use storage::{Cache, CacheEntry, CacheStorage};
pub use worker::{ControlMessage, GatewayOptions, InstallReport, OfflineCacheGateway, WorkerPhase};
