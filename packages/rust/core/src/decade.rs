//! Decade range expansion for `range` queries.

use harvest_shared::{HarvestError, Result};

fn parse_year(year: &str) -> Result<u32> {
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HarvestError::validation(format!(
            "'{year}' is not a four-digit year"
        )));
    }
    year.parse()
        .map_err(|_| HarvestError::validation(format!("'{year}' is not a four-digit year")))
}

/// Decade prefixes (first three digits) covering `start..=end`, ascending.
///
/// `expand_decades("1840", "1860")` is `["184", "185", "186"]`.
pub fn expand_decades(start: &str, end: &str) -> Result<Vec<String>> {
    let first = parse_year(start)?;
    let last = parse_year(end)?;
    if last < first {
        return Err(HarvestError::validation(format!(
            "range end {end} is before start {start}"
        )));
    }

    Ok((first / 10..=last / 10)
        .map(|decade| format!("{decade:03}"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_inclusive_decades() {
        assert_eq!(expand_decades("1840", "1860").unwrap(), vec!["184", "185", "186"]);
        assert_eq!(expand_decades("1900", "1900").unwrap(), vec!["190"]);
        assert_eq!(expand_decades("1845", "1851").unwrap(), vec!["184", "185"]);
    }

    #[test]
    fn keeps_leading_zeros() {
        assert_eq!(expand_decades("0990", "1010").unwrap(), vec!["099", "100", "101"]);
    }

    #[test]
    fn rejects_reversed_range() {
        let err = expand_decades("1860", "1840").unwrap_err();
        assert!(matches!(err, HarvestError::Validation { .. }));
    }

    #[test]
    fn rejects_malformed_years() {
        for (start, end) in [("184", "1860"), ("18400", "1860"), ("18a0", "1860"), ("+840", "1860"), ("", "")] {
            assert!(
                matches!(expand_decades(start, end), Err(HarvestError::Validation { .. })),
                "{start:?}-{end:?}"
            );
        }
    }
}
