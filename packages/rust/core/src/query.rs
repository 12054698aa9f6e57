//! Declarative item queries.
//!
//! A [`Query`] maps field names to a value or a list of values. Fields are
//! ANDed together; the values of a list are ORed. The special `range` field
//! takes `"YYYY-YYYY"` and matches items whose year falls in any decade the
//! range touches.
//!
//! Queries are compiled against a [`FieldMap`] into a [`Filter`] before any
//! request is made, so a bad range or an unmapped field fails early.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::sync::LazyLock;

use harvest_shared::{FieldMap, HarvestError, NormalizedItem, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decade::expand_decades;

/// Query field holding a year range.
pub const RANGE_FIELD: &str = "range";

/// Fields answered directly from the item record.
const RECORD_FIELDS: [&str; 2] = ["id", "type"];

/// Fields derived from the `date` element.
const DATE_PART_FIELDS: [&str; 3] = ["year", "month", "day"];

static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{4})\s*-\s*(\d{4})\s*$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A single value or a set of alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl<S: Into<String>> From<Vec<S>> for QueryValue {
    fn from(values: Vec<S>) -> Self {
        Self::Many(values.into_iter().map(Into::into).collect())
    }
}

/// Field name → wanted value(s). Deserializes from a JSON or TOML table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(BTreeMap<String, QueryValue>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Set `field`, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<QueryValue>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&QueryValue> {
        self.0.get(field)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, QueryValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `other` onto this query; its fields win.
    pub fn merge(&mut self, other: Query) {
        self.0.extend(other.0);
    }

    /// Validate the query and turn it into a reusable [`Filter`].
    ///
    /// Fails with a validation error for a malformed `range`, and a config
    /// error for a metadata field the field map does not define. Unknown
    /// fields are skipped.
    pub fn compile(&self, fields: &FieldMap) -> Result<Filter> {
        let mut predicates = Vec::with_capacity(self.0.len());

        for (name, value) in &self.0 {
            if name == RANGE_FIELD {
                predicates.push(Predicate::Decades(compile_range(value)?));
                continue;
            }

            if !is_recognized(name, fields)? {
                debug!(field = %name, "ignoring unrecognized query field");
                continue;
            }

            let predicate = match value {
                QueryValue::One(wanted) => Predicate::Equals {
                    field: name.clone(),
                    value: wanted.clone(),
                },
                QueryValue::Many(wanted) => Predicate::AnyOf {
                    field: name.clone(),
                    values: wanted.clone(),
                },
            };
            predicates.push(predicate);
        }

        Ok(Filter { predicates })
    }
}

impl FromIterator<(String, QueryValue)> for Query {
    fn from_iter<I: IntoIterator<Item = (String, QueryValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Whether `name` can be answered for every item, given `fields`.
fn is_recognized(name: &str, fields: &FieldMap) -> Result<bool> {
    if RECORD_FIELDS.contains(&name) {
        return Ok(true);
    }

    let backing = if DATE_PART_FIELDS.contains(&name) {
        FieldMap::DATE
    } else {
        name
    };

    if fields.contains(backing) {
        return Ok(true);
    }
    if FieldMap::CORE_FIELDS.contains(&backing) {
        return Err(HarvestError::config(format!(
            "query uses '{name}' but the field map has no '{backing}' element"
        )));
    }
    Ok(false)
}

fn compile_range(value: &QueryValue) -> Result<Vec<String>> {
    let QueryValue::One(raw) = value else {
        return Err(HarvestError::validation(
            "range must be a single \"YYYY-YYYY\" string",
        ));
    };

    let captures = RANGE_RE.captures(raw).ok_or_else(|| {
        HarvestError::validation(format!("range '{raw}' is not of the form YYYY-YYYY"))
    })?;
    expand_decades(&captures[1], &captures[2])
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Equals { field: String, value: String },
    AnyOf { field: String, values: Vec<String> },
    Decades(Vec<String>),
}

impl Predicate {
    fn matches(&self, item: &NormalizedItem) -> bool {
        match self {
            Self::Equals { field, value } => item.field(field).is_some_and(|v| v == value.as_str()),
            Self::AnyOf { field, values } => item
                .field(field)
                .is_some_and(|v| values.iter().any(|wanted| v == wanted.as_str())),
            Self::Decades(prefixes) => {
                let year = item.year();
                prefixes.iter().any(|prefix| year.starts_with(prefix.as_str()))
            }
        }
    }
}

/// A compiled query. Matching is pure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    /// True iff every query field matches `item`. The empty filter matches all.
    pub fn matches(&self, item: &NormalizedItem) -> bool {
        self.predicates.iter().all(|p| p.matches(item))
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Items matching `filter`, in input order.
pub fn filter_items(items: Vec<NormalizedItem>, filter: &Filter) -> Vec<NormalizedItem> {
    items.into_iter().filter(|item| filter.matches(item)).collect()
}
