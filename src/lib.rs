//! Schema Enhancer
//!
//! Fetches remote JSON-Schema documents, augments them with editor authoring
//! aids (autocompletion snippets, enum-derived suggestions, descriptions) and
//! caches the result where the editor's JSON language support picks it up.
//!
//! ## Pipelines
//!
//! Each enhancer runs the same pipeline, parameterized by its cache file name
//! and the setting holding its source URL:
//!
//! ```text
//! freshness check ──(stale / missing / forced)──▶ fetch ──▶ enhance ──▶ cache
//! ```
//!
//! - **Action snippets** (`sitescript.schema.json`): one snippet per site-script
//!   action, plus per-value snippets for enum-like string fields.
//! - **Serve configuration** (`serve.schema.json`): injects the `gulp serve`
//!   configuration definitions.
//!
//! ## Cache layout
//!
//! ```text
//! <cache_dir>/
//! ├── sitescript.schema.json
//! └── serve.schema.json
//! ```
//!
//! An artifact older than one week is refreshed on the next pass.

pub mod cache;
pub mod checksum;
pub mod config;
pub mod enhance;
pub mod error;
pub mod fetch;
pub mod freshness;
pub mod orchestrator;
pub mod schema;
pub mod telemetry;
pub mod watch;

pub use cache::{ArtifactId, CacheStore, FsCacheStore};
pub use checksum::Checksum;
pub use config::{EnhancerSettings, LayeredSettings, SettingsSource};
pub use enhance::{default_enhancers, ActionSnippetEnhancer, SchemaEnhancer, ServeConfigEnhancer};
pub use error::{EnhancerError, FetchError, MalformedSchemaError, Result};
pub use fetch::{HttpSchemaFetcher, SchemaFetcher};
pub use freshness::{check_status, FreshnessStatus, STALE_AFTER_MS};
pub use orchestrator::{EnhancerContext, Orchestrator, RefreshOutcome, RefreshReason};
pub use schema::{Schema, SchemaObject, Snippet, SnippetBody};
pub use telemetry::{NullTelemetry, TelemetryEvent, TelemetryProperties, TelemetrySink, TracingTelemetry};
pub use watch::ConfigWatcher;
