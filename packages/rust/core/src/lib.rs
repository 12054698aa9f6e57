//! Harvest pipeline and domain logic for omeka-harvest.
//!
//! This crate turns raw Omeka pages into a filtered, sorted result set:
//! normalization, queries, thumbnail merging, sorting, and the end-to-end
//! [`Pipeline`] that drives them.

pub mod decade;
pub mod links;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod sort;

pub use decade::expand_decades;
pub use links::search_link;
pub use merge::merge_thumbnails;
pub use normalize::{normalize_all, normalize_item};
pub use pipeline::{Pipeline, PipelineOutput, ProgressReporter, SilentProgress, ThumbnailFailure};
pub use query::{Filter, Query, QueryValue, RANGE_FIELD, filter_items};
pub use sort::sort_items;
