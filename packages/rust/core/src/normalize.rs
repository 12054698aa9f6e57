//! Metadata normalization: positional element texts → fixed-shape records.
//!
//! Omeka stores each metadata value in `element_texts` at no fixed position;
//! the element id is the only stable handle. Each item gets a tag → value map
//! built once, then every configured field is resolved against it.

use std::collections::HashMap;

use harvest_shared::{FieldMap, NormalizedItem, PartitionedItems, RawItem, Thumbnail};
use tracing::debug;

/// Element id → text for one item. The first entry for an id wins.
fn element_values(item: &RawItem) -> HashMap<u64, &str> {
    let mut values = HashMap::with_capacity(item.element_texts.len());
    for entry in &item.element_texts {
        values.entry(entry.element.id).or_insert(entry.text.as_str());
    }
    values
}

/// Normalize one raw item. Never fails: absent fields stay `""`.
pub fn normalize_item(item: &RawItem, fields: &FieldMap) -> NormalizedItem {
    let values = element_values(item);

    let mut normalized = NormalizedItem {
        id: item.id,
        item_type: item
            .item_type
            .as_ref()
            .map(|t| t.id.to_string())
            .unwrap_or_default(),
        thumbnail: if item.files.count > 0 {
            Thumbnail::Pending
        } else {
            Thumbnail::Missing
        },
        ..Default::default()
    };

    for (name, element_id) in fields.iter() {
        let Some(text) = values.get(&element_id) else {
            continue;
        };
        let text = (*text).to_string();
        match name {
            FieldMap::TITLE => normalized.title = text,
            FieldMap::DATE => normalized.date = text,
            FieldMap::CITY => normalized.city = text,
            FieldMap::STATE => normalized.state = text,
            FieldMap::COUNTRY => normalized.country = text,
            other => {
                normalized.extras.insert(other.to_string(), text);
            }
        }
    }

    normalized
}

/// Normalize every item, splitting by whether a file lookup is needed.
pub fn normalize_all(items: &[RawItem], fields: &FieldMap) -> PartitionedItems {
    let mut partitioned = PartitionedItems::default();
    for item in items {
        partitioned.push(normalize_item(item, fields));
    }
    debug!(
        items = items.len(),
        needs_thumbnail = partitioned.needs_thumbnail.len(),
        "normalized items"
    );
    partitioned
}
