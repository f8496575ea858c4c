//! Cache strategy engine.
//!
//! Every outgoing GET over http(s) is classified and served either
//! cache-first (static assets) or network-first (API, pages, everything
//! else) against versioned cache generations:
//! - Generations are named `{prefix}-{kind}-{version}` and rotate when the
//!   precache manifest changes
//! - Activation deletes every cache that is not a current generation; there
//!   is no per-entry eviction
//! - Page navigations fall back to an offline placeholder document

mod generation;
mod layer;
mod route;
mod source;
mod storage;

pub use generation::{CacheGeneration, CacheKind, Generations};
pub use layer::{ActivationReport, CacheEngine, InstallReport};
pub use route::{Route, Router, Strategy};
pub use source::{CacheSource, Served};
pub use storage::{CacheStorage, NoopCacheStorage, SqliteCacheStorage};
