//! End-to-end harvest: count → fetch pages → normalize → filter → thumbnails → merge → sort.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use harvest_fetch::{
    LookupReport, RequestOptions, Transport, discover_pages, fetch_pages, lookup_thumbnails,
};
use harvest_shared::{NormalizedItem, PipelineConfig, Result, SortKey};
use serde::Serialize;
use tracing::{Span, field, info, instrument};
use url::Url;
use uuid::Uuid;

use crate::links::search_link;
use crate::merge::merge_thumbnails;
use crate::normalize::normalize_all;
use crate::query::Query;
use crate::sort::sort_items;

/// A thumbnail lookup that failed; the item is kept without a thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThumbnailFailure {
    pub item_id: u64,
    pub error: String,
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Identifier of this run, also recorded on the tracing span.
    pub run_id: Uuid,
    /// Matching items, sorted.
    pub items: Vec<NormalizedItem>,
    /// Number of matching items.
    pub matched: usize,
    /// Total advertised by the API before filtering.
    pub total_results: u64,
    /// Number of result pages retrieved.
    pub pages_fetched: usize,
    pub thumbnail_failures: Vec<ThumbnailFailure>,
    /// Link to the same result set on the Omeka site.
    pub search_link: String,
    pub sort: SortKey,
    pub elapsed: Duration,
    pub completed_at: DateTime<Utc>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each results page arrives.
    fn page_fetched(&self, page: u32, current: usize, total: usize);
    /// Called as each thumbnail lookup settles.
    fn thumbnail_fetched(&self, item_id: u64, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, output: &PipelineOutput);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _page: u32, _current: usize, _total: usize) {}
    fn thumbnail_fetched(&self, _item_id: u64, _current: usize, _total: usize) {}
    fn done(&self, _output: &PipelineOutput) {}
}

/// The configured harvest pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    transport: Arc<dyn Transport>,
    items_url: Url,
    files_url: Url,
}

impl Pipeline {
    /// Validate `config` and bind it to `transport`.
    pub fn new(config: PipelineConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let items_url = config.items_url()?;
        let files_url = config.files_url()?;

        Ok(Self {
            config,
            transport,
            items_url,
            files_url,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline for `query`, ordering the result by `sort`.
    ///
    /// 1. Compile the query (no request is made if it is invalid)
    /// 2. Probe the total and plan pages
    /// 3. Fetch all pages concurrently
    /// 4. Normalize and partition, then drop non-matching items
    /// 5. Look up thumbnails for the remaining items with files
    /// 6. Merge and sort
    #[instrument(skip_all, fields(sort = %sort, run_id = field::Empty))]
    pub async fn run(
        &self,
        query: &Query,
        sort: SortKey,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutput> {
        let start = Instant::now();
        let run_id = Uuid::now_v7();
        Span::current().record("run_id", field::display(&run_id));

        info!(%run_id, fields = query.len(), "starting harvest");

        // --- Phase 1: Query ---
        progress.phase("Compiling query");
        let filter = query.compile(&self.config.field_map)?;
        let options = RequestOptions::from(&self.config.fetch);

        // --- Phase 2: Page plan ---
        progress.phase("Counting results");
        let (total_results, pages) = discover_pages(
            self.transport.as_ref(),
            &self.items_url,
            &self.config.total_results_header,
            self.config.page_size,
            &options,
        )
        .await?;

        // --- Phase 3: Pages ---
        let raw_items = if pages.is_empty() {
            info!("no results, skipping page fetch");
            Vec::new()
        } else {
            progress.phase("Fetching pages");
            fetch_pages(
                Arc::clone(&self.transport),
                &self.items_url,
                &pages,
                &options,
                &mut |page, current, total| progress.page_fetched(page, current, total),
            )
            .await?
        };

        // --- Phase 4: Normalize + filter ---
        progress.phase("Normalizing metadata");
        let mut partitioned = normalize_all(&raw_items, &self.config.field_map);
        let normalized = partitioned.len();
        partitioned.retain(|item| filter.matches(item));
        info!(normalized, matched = partitioned.len(), "applied query");

        // --- Phase 5: Thumbnails ---
        let lookups = if self.config.fetch.thumbnails && !partitioned.needs_thumbnail.is_empty() {
            progress.phase("Fetching thumbnails");
            let ids: Vec<u64> = partitioned.needs_thumbnail.iter().map(|i| i.id).collect();
            lookup_thumbnails(
                Arc::clone(&self.transport),
                &self.files_url,
                &ids,
                &options,
                &mut |item_id, current, total| progress.thumbnail_fetched(item_id, current, total),
            )
            .await
        } else {
            LookupReport::default()
        };

        // --- Phase 6: Merge + sort ---
        progress.phase("Sorting results");
        let mut items = merge_thumbnails(partitioned, &lookups.urls);
        sort_items(&mut items, sort);

        let link = search_link(
            &self.config.api_base_url,
            &items,
            sort,
            &self.config.field_map,
        );

        let output = PipelineOutput {
            run_id,
            matched: items.len(),
            items,
            total_results,
            pages_fetched: pages.len(),
            thumbnail_failures: lookups
                .failures
                .into_iter()
                .map(|(item_id, error)| ThumbnailFailure { item_id, error })
                .collect(),
            search_link: link,
            sort,
            elapsed: start.elapsed(),
            completed_at: Utc::now(),
        };

        progress.done(&output);

        info!(
            %run_id,
            total_results = output.total_results,
            pages = output.pages_fetched,
            matched = output.matched,
            thumbnail_failures = output.thumbnail_failures.len(),
            elapsed_ms = output.elapsed.as_millis(),
            "harvest complete"
        );

        Ok(output)
    }
}
