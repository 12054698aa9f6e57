//! Reattach looked-up thumbnails and recombine the partitions.

use std::collections::HashMap;

use harvest_shared::{NormalizedItem, PartitionedItems, Thumbnail};

/// Fill thumbnails from `urls` (keyed by item id) and concatenate the
/// thumbnail-bearing partition ahead of the rest.
///
/// Items whose lookup produced nothing end up with [`Thumbnail::Missing`].
/// The output always has exactly as many items as the input.
pub fn merge_thumbnails(
    partitioned: PartitionedItems,
    urls: &HashMap<u64, String>,
) -> Vec<NormalizedItem> {
    let PartitionedItems {
        needs_thumbnail,
        no_thumbnail,
    } = partitioned;

    let mut merged = Vec::with_capacity(needs_thumbnail.len() + no_thumbnail.len());
    merged.extend(needs_thumbnail.into_iter().map(|mut item| {
        item.thumbnail = match urls.get(&item.id) {
            Some(url) => Thumbnail::Url(url.clone()),
            None => Thumbnail::Missing,
        };
        item
    }));
    merged.extend(no_thumbnail);
    merged
}
