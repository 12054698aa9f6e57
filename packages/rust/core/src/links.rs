//! Stable search link back to the Omeka site for a result set.

use harvest_shared::{DUBLIN_CORE_DATE_ELEMENT, FieldMap, NormalizedItem, SortKey};

/// Omeka element id the site's own search should sort by for `key`.
fn sort_element(key: SortKey, fields: &FieldMap) -> u64 {
    match key {
        SortKey::Date => DUBLIN_CORE_DATE_ELEMENT,
        SortKey::Title | SortKey::City | SortKey::State => fields
            .id_of(key.as_str())
            .unwrap_or(DUBLIN_CORE_DATE_ELEMENT),
    }
}

/// `<base>/find?range=<ids>&sort=<element>&order=a&layout=3`, listing the
/// items in their current order.
pub fn search_link(
    base_url: &str,
    items: &[NormalizedItem],
    key: SortKey,
    fields: &FieldMap,
) -> String {
    let ids = items
        .iter()
        .map(|item| item.id.to_string())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{}/find?range={ids}&sort={}&order=a&layout=3",
        base_url.trim_end_matches('/'),
        sort_element(key, fields)
    )
}
