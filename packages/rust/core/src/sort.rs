//! Stable ordering of normalized items.

use harvest_shared::{NormalizedItem, SortKey};

/// Sort `items` ascending by `key`. Equal keys keep their input order.
///
/// Titles compare case-insensitively (upper-cased); other keys compare the
/// raw field text.
pub fn sort_items(items: &mut [NormalizedItem], key: SortKey) {
    match key {
        SortKey::Title => items.sort_by_cached_key(|item| item.title.to_uppercase()),
        SortKey::Date => items.sort_by(|a, b| a.date.cmp(&b.date)),
        SortKey::City => items.sort_by(|a, b| a.city.cmp(&b.city)),
        SortKey::State => items.sort_by(|a, b| a.state.cmp(&b.state)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, title: &str, date: &str, state: &str) -> NormalizedItem {
        NormalizedItem {
            id,
            title: title.into(),
            date: date.into(),
            state: state.into(),
            ..Default::default()
        }
    }

    fn ids(items: &[NormalizedItem]) -> Vec<u64> {
        items.iter().map(|i| i.id).collect()
    }

    fn sample() -> Vec<NormalizedItem> {
        vec![
            item(1, "minutes", "1855-01-02", "PA"),
            item(2, "Address", "1843-08-21", "NY"),
            item(3, "Minutes", "1843-08-21", "PA"),
            item(4, "", "", "OH"),
        ]
    }

    #[test]
    fn title_sort_ignores_case_and_is_stable() {
        let mut items = sample();
        sort_items(&mut items, SortKey::Title);
        assert_eq!(ids(&items), vec![4, 2, 1, 3]);
    }

    #[test]
    fn date_sort_uses_raw_strings_and_keeps_ties_in_order() {
        let mut items = sample();
        sort_items(&mut items, SortKey::Date);
        assert_eq!(ids(&items), vec![4, 2, 3, 1]);
    }

    #[test]
    fn ties_are_never_broken_by_id() {
        let mut items = vec![item(9, "", "", "PA"), item(1, "", "", "PA")];
        sort_items(&mut items, SortKey::State);
        assert_eq!(ids(&items), vec![9, 1]);
    }

    #[test]
    fn sorting_is_idempotent() {
        for key in SortKey::ALL {
            let mut once = sample();
            sort_items(&mut once, key);
            let mut twice = once.clone();
            sort_items(&mut twice, key);
            assert_eq!(once, twice, "{key}");
        }
    }
}
