//! Application caches.
//!
//! - [`AppCache`]: string-keyed read-through cache contract, with [`ObjectCache`] as the
//!   in-memory store and [`NoAppCache`] as the pass-through.
//! - [`IsolatedCaches`]: one [`ObjectCache`] per entity type, created on demand.
//! - [`AppCaches`]: the process-wide registry (runtime cache, global isolated caches,
//!   published regions).
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! entity_ttl_seconds = 300
//! full_data_set_expires = false
//! published_ttl_seconds = 3600
//! # ... see config.rs for all options
//! ```

mod app_cache;
mod app_caches;
mod config;
mod isolated;
pub(crate) mod lock;
mod region;

pub use app_cache::{AppCache, AppCacheExt, CacheValue, Expiration, NoAppCache, ObjectCache};
pub(crate) use app_cache::{METRIC_FACTORY, METRIC_FACTORY_MS, METRIC_HIT, METRIC_MISS};
pub use app_caches::AppCaches;
pub use config::CacheConfig;
pub(crate) use config::{DEFAULT_ENTITY_TTL_SECS, DEFAULT_PUBLISHED_TTL_SECS};
pub use isolated::IsolatedCaches;
pub use region::CacheRegion;
