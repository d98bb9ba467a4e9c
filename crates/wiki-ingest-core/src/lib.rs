//! # Wiki Ingest Core
//!
//! Pure logic for the wiki ingestion engine: the character data model,
//! page extraction, identity keys, merge planning, and the catalog store
//! abstraction.
//!
//! This crate performs no network or disk I/O and carries no tokio,
//! sqlx, or HTTP dependencies. Fetching, scheduling, and persistence live
//! in the `wiki-ingest` application crate.
//!
//! ## Flow
//!
//! ```text
//! RawPage ──extract──▶ candidates ──merge(snapshot)──▶ MergePlan ──commit──▶ CatalogStore
//! ```

pub mod extract;
pub mod identity;
pub mod merge;
pub mod models;
pub mod store;

pub use extract::{Extraction, ExtractionError, Extractor};
pub use merge::{merge, MergeOptions, MergePlan};
pub use models::{CharacterRecord, IngestionRequest, IngestionResult, RawPage};
pub use store::{CatalogSnapshot, CatalogStore, CommitError};
