//! Configuration for the cache manager.
//!
//! # Example
//!
//! ```
//! use stream_cache::CacheConfig;
//!
//! // Minimal config (uses defaults)
//! let config = CacheConfig::default();
//! assert_eq!(config.writer_id, "local");
//! assert!(config.flush_on_shutdown);
//!
//! // Full config
//! let config = CacheConfig {
//!     writer_id: "device-7f3a".into(),
//!     scope_streams: Some(vec!["work".into(), "health".into()]),
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// Configuration for the cache manager.
///
/// All fields have sensible defaults. The config is injected into the
/// [`CacheManager`](crate::CacheManager) constructor; there is no
/// process-wide configuration state.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Attribution id stamped into `createdBy`/`modifiedBy` on local writes
    #[serde(default = "default_writer_id")]
    pub writer_id: String,

    /// Stream ids the initial access scope is restricted to.
    /// `None` means unrestricted. The scope widens adaptively as queries
    /// name streams outside it.
    #[serde(default)]
    pub scope_streams: Option<Vec<String>>,

    /// Flush both stores to the durable backend during shutdown
    #[serde(default = "default_flush_on_shutdown")]
    pub flush_on_shutdown: bool,
}

fn default_writer_id() -> String {
    "local".to_string()
}
fn default_flush_on_shutdown() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            writer_id: default_writer_id(),
            scope_streams: None,
            flush_on_shutdown: default_flush_on_shutdown(),
        }
    }
}
