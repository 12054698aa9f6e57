//! Per-item file lookups used to fill in thumbnails.
//!
//! Results are keyed by item id. A lookup that fails after retries is
//! recorded in [`LookupReport::failures`] and never aborts the batch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use harvest_shared::{FileRecord, HarvestError, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::transport::{RequestOptions, Transport, get_checked};

/// Outcome of a batch of file lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupReport {
    /// Item id → full-size image URL, for items that have one.
    pub urls: HashMap<u64, String>,
    /// Items whose lookup failed, with the error message.
    pub failures: Vec<(u64, String)>,
}

/// Full-size URL of the first file, if any.
pub fn first_fullsize(files: &[FileRecord]) -> Option<String> {
    files
        .first()
        .and_then(|file| file.file_urls.fullsize.clone())
        .filter(|url| !url.is_empty())
}

async fn lookup_one(
    transport: &dyn Transport,
    files_url: &Url,
    item_id: u64,
    options: &RequestOptions,
) -> Result<Option<String>> {
    let params = [("item".to_string(), item_id.to_string())];
    let response = get_checked(transport, files_url, &params, options).await?;
    let files: Vec<FileRecord> = response.json()?;
    Ok(first_fullsize(&files))
}

/// Look up the thumbnail URL of every item in `item_ids`.
///
/// Duplicate ids are looked up once. `on_item(item_id, completed, total)` is
/// called as each lookup settles, successful or not.
#[instrument(skip_all, fields(files_url = %files_url, items = item_ids.len()))]
pub async fn lookup_thumbnails(
    transport: Arc<dyn Transport>,
    files_url: &Url,
    item_ids: &[u64],
    options: &RequestOptions,
    on_item: &mut (dyn FnMut(u64, usize, usize) + Send),
) -> LookupReport {
    let mut seen = HashSet::new();
    let unique: Vec<u64> = item_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    let total = unique.len();

    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut task_items = HashMap::new();

    for &item_id in &unique {
        let transport = Arc::clone(&transport);
        let semaphore = Arc::clone(&semaphore);
        let url = files_url.clone();
        let options = options.clone();

        let handle = tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => lookup_one(transport.as_ref(), &url, item_id, &options).await,
                Err(_) => Err(HarvestError::Network("request limiter closed".into())),
            };
            (item_id, result)
        });
        task_items.insert(handle.id(), item_id);
    }

    let mut report = LookupReport::default();
    let mut completed = 0;

    while let Some(joined) = tasks.join_next().await {
        let (item_id, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                let item_id = task_items.get(&e.id()).copied().unwrap_or_default();
                (item_id, Err(HarvestError::Network(format!("lookup task failed: {e}"))))
            }
        };

        match result {
            Ok(Some(url)) => {
                debug!(item_id, %url, "thumbnail found");
                report.urls.insert(item_id, url);
            }
            Ok(None) => debug!(item_id, "item has no full-size file"),
            Err(e) => {
                let e = e.for_item(item_id);
                warn!(item_id, error = %e, "thumbnail lookup failed");
                report.failures.push((item_id, e.to_string()));
            }
        }

        completed += 1;
        on_item(item_id, completed, total);
    }

    report.failures.sort_by_key(|(id, _)| *id);
    info!(
        looked_up = total,
        found = report.urls.len(),
        failed = report.failures.len(),
        "thumbnail lookups complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use harvest_shared::FileUrls;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::retry::RetryPolicy;
    use crate::transport::HttpTransport;

    fn options() -> RequestOptions {
        RequestOptions {
            concurrency: 4,
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::none(),
        }
    }

    fn files_body(fullsize: &str) -> serde_json::Value {
        json!([
            {"id": 1, "file_urls": {"original": "o.jpg", "fullsize": fullsize, "thumbnail": "t.jpg"}},
            {"id": 2, "file_urls": {"fullsize": "second.jpg"}}
        ])
    }

    async fn mount_files(server: &MockServer, item_id: u64, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/api/files"))
            .and(query_param("item", item_id.to_string()))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[test]
    fn first_fullsize_takes_first_record() {
        let files = vec![
            FileRecord {
                id: 1,
                file_urls: FileUrls {
                    fullsize: Some("a.jpg".into()),
                    ..Default::default()
                },
            },
            FileRecord {
                id: 2,
                file_urls: FileUrls {
                    fullsize: Some("b.jpg".into()),
                    ..Default::default()
                },
            },
        ];
        assert_eq!(first_fullsize(&files).as_deref(), Some("a.jpg"));
        assert_eq!(first_fullsize(&[]), None);
        assert_eq!(first_fullsize(&[FileRecord::default()]), None);
    }

    #[tokio::test]
    async fn lookups_are_keyed_by_item_id() {
        let server = MockServer::start().await;
        mount_files(
            &server,
            10,
            ResponseTemplate::new(200)
                .set_body_json(files_body("https://img/10.jpg"))
                .set_delay(Duration::from_millis(60)),
        )
        .await;
        mount_files(
            &server,
            20,
            ResponseTemplate::new(200).set_body_json(files_body("https://img/20.jpg")),
        )
        .await;
        mount_files(&server, 30, ResponseTemplate::new(200).set_body_json(json!([]))).await;

        let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
        let url = Url::parse(&format!("{}/api/files", server.uri())).unwrap();
        let mut settled = Vec::new();

        let report = lookup_thumbnails(
            transport,
            &url,
            &[10, 20, 30],
            &options(),
            &mut |id, _, _| settled.push(id),
        )
        .await;

        assert_eq!(report.urls.get(&10).map(String::as_str), Some("https://img/10.jpg"));
        assert_eq!(report.urls.get(&20).map(String::as_str), Some("https://img/20.jpg"));
        assert!(!report.urls.contains_key(&30));
        assert!(report.failures.is_empty());
        assert_eq!(settled.len(), 3);
    }

    #[tokio::test]
    async fn failed_lookup_is_reported_not_fatal() {
        let server = MockServer::start().await;
        mount_files(
            &server,
            1,
            ResponseTemplate::new(200).set_body_json(files_body("https://img/1.jpg")),
        )
        .await;
        mount_files(&server, 2, ResponseTemplate::new(500)).await;
        mount_files(&server, 3, ResponseTemplate::new(200).set_body_string("not json")).await;

        let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
        let url = Url::parse(&format!("{}/api/files", server.uri())).unwrap();

        let report = lookup_thumbnails(transport, &url, &[1, 2, 3], &options(), &mut |_, _, _| {}).await;

        assert_eq!(report.urls.len(), 1);
        let failed: Vec<u64> = report.failures.iter().map(|(id, _)| *id).collect();
        assert_eq!(failed, vec![2, 3]);
        assert!(report.failures[0].1.contains("item 2"));
    }

    #[tokio::test]
    async fn duplicate_ids_are_looked_up_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/files"))
            .and(query_param("item", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(files_body("https://img/5.jpg")))
            .expect(1)
            .mount(&server)
            .await;

        let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
        let url = Url::parse(&format!("{}/api/files", server.uri())).unwrap();

        let report = lookup_thumbnails(transport, &url, &[5, 5], &options(), &mut |_, _, _| {}).await;
        assert_eq!(report.urls.len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_makes_no_requests() {
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
        let url = Url::parse("http://127.0.0.1:9/api/files").unwrap();

        let report = lookup_thumbnails(transport, &url, &[], &options(), &mut |_, _, _| {}).await;
        assert_eq!(report, LookupReport::default());
    }
}
