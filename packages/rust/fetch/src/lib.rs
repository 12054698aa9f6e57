//! HTTP access to the Omeka API: transport, paging, and fan-out.
//!
//! This crate provides:
//! - [`transport`]: the [`Transport`] capability and its `reqwest` implementation
//! - [`retry`]: exponential backoff for transient failures
//! - [`pagination`]: page planning from the total-results header
//! - [`pages`]: concurrent, order-preserving page retrieval
//! - [`files`]: per-item image URL lookups

pub mod files;
pub mod pages;
pub mod pagination;
pub mod retry;
pub mod transport;

pub use files::{LookupReport, first_fullsize, lookup_thumbnails};
pub use pages::fetch_pages;
pub use pagination::{discover_pages, page_count, plan_pages, total_results};
pub use retry::{RetryPolicy, with_retry};
pub use transport::{HttpTransport, RequestOptions, Transport, TransportResponse, get_checked};
