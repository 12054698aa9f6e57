//! Page planning from the total-results header.
//!
//! Omeka reports the size of a result set in a response header rather than in
//! the body, so the first request is issued unfiltered just to read it.

use harvest_shared::{HarvestError, Result};
use tracing::{debug, info};
use url::Url;

use crate::transport::{RequestOptions, Transport, TransportResponse, get_checked};

/// Read the total result count from `header`.
pub fn total_results(response: &TransportResponse, header: &str) -> Result<u64> {
    let raw = response
        .header(header)
        .ok_or_else(|| HarvestError::protocol(format!("response has no '{header}' header")))?;

    raw.trim().parse::<u64>().map_err(|_| {
        HarvestError::protocol(format!(
            "'{header}' header is not a nonnegative integer: '{raw}'"
        ))
    })
}

/// Number of pages needed for `total` results at `page_size` per page.
pub fn page_count(total: u64, page_size: u32) -> Result<u32> {
    if page_size == 0 {
        return Err(HarvestError::config("page_size must be greater than zero"));
    }
    let pages = total.div_ceil(u64::from(page_size));
    u32::try_from(pages)
        .map_err(|_| HarvestError::protocol(format!("{total} results is too many pages to fetch")))
}

/// Pages `1..=ceil(total / page_size)`, in order. Empty when there are no results.
pub fn plan_pages(response: &TransportResponse, header: &str, page_size: u32) -> Result<Vec<u32>> {
    let total = total_results(response, header)?;
    Ok((1..=page_count(total, page_size)?).collect())
}

/// Issue the unfiltered probe request and plan the pages to fetch.
///
/// Returns the advertised total alongside the page plan.
pub async fn discover_pages(
    transport: &dyn Transport,
    items_url: &Url,
    header: &str,
    page_size: u32,
    options: &RequestOptions,
) -> Result<(u64, Vec<u32>)> {
    debug!(%items_url, "probing result count");
    let response = get_checked(transport, items_url, &[], options).await?;

    let total = total_results(&response, header)?;
    let pages: Vec<u32> = (1..=page_count(total, page_size)?).collect();

    info!(total, pages = pages.len(), page_size, "planned page fetch");
    Ok((total, pages))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "omeka-total-results";

    fn response_with_total(value: &str) -> TransportResponse {
        TransportResponse::new(200).with_header(HEADER, value)
    }

    #[test]
    fn plans_exact_page_sequence() {
        for (total, page_size, expected) in [
            ("0", 50, 0u32),
            ("1", 50, 1),
            ("50", 50, 1),
            ("51", 50, 2),
            ("4", 2, 2),
            ("125", 25, 5),
        ] {
            let pages = plan_pages(&response_with_total(total), HEADER, page_size).unwrap();
            assert_eq!(pages, (1..=expected).collect::<Vec<_>>(), "total={total}");
        }
    }

    #[test]
    fn zero_results_is_empty_plan() {
        let pages = plan_pages(&response_with_total("0"), HEADER, 50).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn surrounding_whitespace_is_accepted() {
        assert_eq!(total_results(&response_with_total(" 12 "), HEADER).unwrap(), 12);
    }

    #[test]
    fn missing_header_is_protocol_error() {
        let err = plan_pages(&TransportResponse::new(200), HEADER, 50).unwrap_err();
        assert!(matches!(err, HarvestError::Protocol { .. }));
        assert!(err.to_string().contains(HEADER));
    }

    #[test]
    fn malformed_header_is_protocol_error() {
        for bad in ["", "-3", "2.5", "many", "1e3"] {
            let err = plan_pages(&response_with_total(bad), HEADER, 50).unwrap_err();
            assert!(matches!(err, HarvestError::Protocol { .. }), "value {bad:?}");
        }
    }

    #[test]
    fn zero_page_size_is_config_error() {
        let err = page_count(10, 0).unwrap_err();
        assert!(matches!(err, HarvestError::Config { .. }));
    }
}
