//! Shared types, error model, and configuration for omeka-harvest.
//!
//! This crate is the foundation depended on by all other harvest crates.
//! It provides:
//! - [`HarvestError`]: the unified error type
//! - Domain types ([`RawItem`], [`NormalizedItem`], [`FieldMap`], [`SortKey`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, FetchConfig, PipelineConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{HarvestError, Result};
pub use types::{
    DUBLIN_CORE_DATE_ELEMENT, ElementRef, ElementText, FieldMap, FileRecord, FileUrls, ItemFiles,
    ItemTypeRef, NormalizedItem, PartitionedItems, RawItem, SortKey, Thumbnail,
};
