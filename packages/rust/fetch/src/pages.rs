//! Concurrent retrieval of every results page.
//!
//! Pages are requested in parallel (bounded by a semaphore) and reassembled by
//! page index, so output order never depends on which response lands first.

use std::collections::HashMap;
use std::sync::Arc;

use harvest_shared::{HarvestError, RawItem, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::transport::{RequestOptions, Transport, get_checked};

/// Query parameters for one page, sorted by id so page boundaries are stable.
fn page_params(page: u32) -> Vec<(String, String)> {
    vec![
        ("page".to_string(), page.to_string()),
        ("sort_by".to_string(), "id".to_string()),
        ("sort_order".to_string(), "asc".to_string()),
    ]
}

/// Fetch and decode a single page.
async fn fetch_page(
    transport: &dyn Transport,
    items_url: &Url,
    page: u32,
    options: &RequestOptions,
) -> Result<Vec<RawItem>> {
    let response = get_checked(transport, items_url, &page_params(page), options).await?;
    response.json::<Vec<RawItem>>()
}

/// Fetch every page in `pages` and concatenate their items in page order.
///
/// `on_page(page, completed, total)` is called as each page arrives. The first
/// page that fails (after retries) cancels the outstanding requests and is
/// returned as [`HarvestError::Fetch`] carrying that page number.
#[instrument(skip_all, fields(items_url = %items_url, pages = pages.len()))]
pub async fn fetch_pages(
    transport: Arc<dyn Transport>,
    items_url: &Url,
    pages: &[u32],
    options: &RequestOptions,
    on_page: &mut (dyn FnMut(u32, usize, usize) + Send),
) -> Result<Vec<RawItem>> {
    let total = pages.len();
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut task_pages = HashMap::new();

    for (index, &page) in pages.iter().enumerate() {
        let transport = Arc::clone(&transport);
        let semaphore = Arc::clone(&semaphore);
        let url = items_url.clone();
        let options = options.clone();

        let handle = tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => fetch_page(transport.as_ref(), &url, page, &options).await,
                Err(_) => Err(HarvestError::Network("request limiter closed".into())),
            };
            (index, page, result)
        });
        task_pages.insert(handle.id(), page);
    }

    let mut slots: Vec<Option<Vec<RawItem>>> = vec![None; total];
    let mut completed = 0;

    while let Some(joined) = tasks.join_next().await {
        let (index, page, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                let page = task_pages.get(&e.id()).copied().unwrap_or_default();
                (usize::MAX, page, Err(HarvestError::Network(format!("page task failed: {e}"))))
            }
        };

        match result {
            Ok(items) => {
                completed += 1;
                debug!(page, items = items.len(), completed, total, "page fetched");
                on_page(page, completed, total);
                slots[index] = Some(items);
            }
            Err(e) => {
                warn!(page, error = %e, "page fetch failed, cancelling remaining pages");
                tasks.abort_all();
                return Err(e.for_page(page));
            }
        }
    }

    let items: Vec<RawItem> = slots.into_iter().flatten().flatten().collect();
    info!(pages = total, items = items.len(), "all pages fetched");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::retry::RetryPolicy;
    use crate::transport::TransportResponse;

    /// Serves canned bodies per `page` parameter after a per-page delay.
    #[derive(Default)]
    struct ScriptedTransport {
        pages: HashMap<String, (Duration, u16, String)>,
        calls: Mutex<Vec<Vec<(String, String)>>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedTransport {
        fn page(mut self, page: u32, delay_ms: u64, status: u16, body: serde_json::Value) -> Self {
            self.pages.insert(
                page.to_string(),
                (Duration::from_millis(delay_ms), status, body.to_string()),
            );
            self
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, _url: &Url, params: &[(String, String)]) -> Result<TransportResponse> {
            self.calls.lock().unwrap().push(params.to_vec());
            let page = params
                .iter()
                .find(|(k, _)| k == "page")
                .map(|(_, v)| v.clone())
                .unwrap_or_default();

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let (delay, status, body) = self
                .pages
                .get(&page)
                .cloned()
                .unwrap_or((Duration::ZERO, 404, String::new()));
            tokio::time::sleep(delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(TransportResponse::new(status).with_body(body))
        }
    }

    fn items(ids: &[u64]) -> serde_json::Value {
        json!(ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>())
    }

    fn options(concurrency: usize) -> RequestOptions {
        RequestOptions {
            concurrency,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::none(),
        }
    }

    fn items_url() -> Url {
        Url::parse("https://omeka.example.org/api/items").unwrap()
    }

    fn ids(items: &[RawItem]) -> Vec<u64> {
        items.iter().map(|item| item.id).collect()
    }

    #[tokio::test]
    async fn output_follows_page_order_not_arrival_order() {
        let transport = ScriptedTransport::default()
            .page(1, 80, 200, items(&[1, 2]))
            .page(2, 0, 200, items(&[3, 4]))
            .page(3, 20, 200, items(&[5]));

        let mut arrivals = Vec::new();
        let result = fetch_pages(
            Arc::new(transport),
            &items_url(),
            &[1, 2, 3],
            &options(4),
            &mut |page, _, _| arrivals.push(page),
        )
        .await
        .unwrap();

        assert_eq!(ids(&result), vec![1, 2, 3, 4, 5]);
        assert_eq!(arrivals.len(), 3);
        assert_eq!(arrivals.last(), Some(&1));
    }

    #[tokio::test]
    async fn requests_carry_page_and_stable_sort() {
        let transport = Arc::new(ScriptedTransport::default().page(1, 0, 200, items(&[1])));

        fetch_pages(
            transport.clone(),
            &items_url(),
            &[1],
            &options(1),
            &mut |_, _, _| {},
        )
        .await
        .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            vec![
                ("page".to_string(), "1".to_string()),
                ("sort_by".to_string(), "id".to_string()),
                ("sort_order".to_string(), "asc".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failing_page_fails_whole_fetch_and_cancels_the_rest() {
        let transport = ScriptedTransport::default()
            .page(1, 0, 200, items(&[1]))
            .page(2, 0, 500, json!({"message": "boom"}))
            .page(3, 30_000, 200, items(&[3]));

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            fetch_pages(
                Arc::new(transport),
                &items_url(),
                &[1, 2, 3],
                &options(3),
                &mut |_, _, _| {},
            ),
        )
        .await
        .expect("a failed page must not wait for slow pages");

        match outcome.unwrap_err() {
            HarvestError::Fetch { page, source } => {
                assert_eq!(page, 2);
                assert!(matches!(*source, HarvestError::Http { status: 500, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_page_body_is_fetch_error() {
        let transport = ScriptedTransport::default().page(1, 0, 200, json!({"not": "an array"}));

        let err = fetch_pages(
            Arc::new(transport),
            &items_url(),
            &[1],
            &options(1),
            &mut |_, _, _| {},
        )
        .await
        .unwrap_err();

        match err {
            HarvestError::Fetch { page, source } => {
                assert_eq!(page, 1);
                assert!(matches!(*source, HarvestError::Parse { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fan_out_respects_concurrency_limit() {
        let mut transport = ScriptedTransport::default();
        for page in 1..=6 {
            transport = transport.page(page, 20, 200, items(&[u64::from(page)]));
        }
        let transport = Arc::new(transport);

        let result = fetch_pages(
            transport.clone(),
            &items_url(),
            &[1, 2, 3, 4, 5, 6],
            &options(2),
            &mut |_, _, _| {},
        )
        .await
        .unwrap();

        assert_eq!(ids(&result), vec![1, 2, 3, 4, 5, 6]);
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn no_pages_means_no_requests() {
        let transport = Arc::new(ScriptedTransport::default());
        let result = fetch_pages(
            transport.clone(),
            &items_url(),
            &[],
            &options(2),
            &mut |_, _, _| {},
        )
        .await
        .unwrap();

        assert!(result.is_empty());
        assert!(transport.calls.lock().unwrap().is_empty());
    }
}
