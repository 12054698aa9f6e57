//! Core domain types for omeka-harvest.
//!
//! Raw types mirror the Omeka Classic REST API (`/api/items`, `/api/files`).
//! Every wire field is optional: absent or `null` values decode to defaults so
//! that normalization never fails on sparse records.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::HarvestError;

/// Dublin Core "Date" element id, used as the sort element of search links.
pub const DUBLIN_CORE_DATE_ELEMENT: u64 = 40;

/// Decode `null` the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Raw API records
// ---------------------------------------------------------------------------

/// One item as returned by `GET /api/items`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(default)]
    pub item_type: Option<ItemTypeRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: ItemFiles,
    /// Metadata entries in no particular order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub element_texts: Vec<ElementText>,
}

/// Reference to the item's type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemTypeRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Summary of the files attached to an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFiles {
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u64,
    #[serde(default)]
    pub url: Option<String>,
}

/// A metadata value tagged with the element it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementText {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub element: ElementRef,
}

/// The element (field-identifier) of a metadata entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// One file as returned by `GET /api/files?item=<id>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_urls: FileUrls,
}

/// Derivative URLs Omeka generates for a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileUrls {
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub fullsize: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub square_thumbnail: Option<String>,
}

// ---------------------------------------------------------------------------
// FieldMap
// ---------------------------------------------------------------------------

/// Semantic field name → element id used by the source system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, u64>);

impl FieldMap {
    pub const TITLE: &'static str = "title";
    pub const DATE: &'static str = "date";
    pub const CITY: &'static str = "city";
    pub const STATE: &'static str = "state";
    pub const COUNTRY: &'static str = "country";

    /// Names with a dedicated slot on [`NormalizedItem`].
    pub const CORE_FIELDS: [&'static str; 5] = [
        Self::TITLE,
        Self::DATE,
        Self::CITY,
        Self::STATE,
        Self::COUNTRY,
    ];

    /// Build a map from explicit entries.
    pub fn new(entries: BTreeMap<String, u64>) -> Self {
        Self(entries)
    }

    /// Element id configured for `name`.
    pub fn id_of(&self, name: &str) -> Option<u64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that names are non-empty and no element id is claimed twice.
    pub fn validate(&self) -> crate::Result<()> {
        let mut seen: HashMap<u64, &str> = HashMap::new();
        for (name, id) in self.iter() {
            if name.trim().is_empty() {
                return Err(HarvestError::config("field map contains an empty field name"));
            }
            if let Some(previous) = seen.insert(id, name) {
                return Err(HarvestError::config(format!(
                    "element id {id} is mapped to both '{previous}' and '{name}'"
                )));
            }
        }
        Ok(())
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        [
            (Self::TITLE, 50),
            (Self::CITY, 108),
            (Self::STATE, 109),
            (Self::COUNTRY, 110),
            (Self::DATE, 111),
        ]
        .into_iter()
        .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

// ---------------------------------------------------------------------------
// Thumbnail
// ---------------------------------------------------------------------------

/// Thumbnail slot of a normalized item.
///
/// Starts as [`Thumbnail::Pending`] when the item has files, and is replaced
/// by the looked-up URL. Serializes as the URL, or `""` otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Thumbnail {
    #[default]
    Missing,
    Pending,
    Url(String),
}

impl Thumbnail {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            _ => None,
        }
    }
}

impl Serialize for Thumbnail {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_url().unwrap_or(""))
    }
}

// ---------------------------------------------------------------------------
// NormalizedItem
// ---------------------------------------------------------------------------

/// Fixed-shape record produced from a [`RawItem`].
///
/// Every text field defaults to `""` when the source lacks it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedItem {
    pub id: u64,
    #[serde(rename = "type")]
    pub item_type: String,
    pub title: String,
    /// `YYYY-MM-DD`, possibly partial.
    pub date: String,
    pub city: String,
    pub state: String,
    pub country: String,
    /// Values of configured fields beyond the fixed ones above.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
    pub thumbnail: Thumbnail,
}

impl NormalizedItem {
    fn date_part(&self, index: usize) -> &str {
        self.date.split('-').nth(index).unwrap_or("")
    }

    pub fn year(&self) -> &str {
        self.date_part(0)
    }

    pub fn month(&self) -> &str {
        self.date_part(1)
    }

    pub fn day(&self) -> &str {
        self.date_part(2)
    }

    /// Public page of the item on the Omeka site.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/items/show/{}", base_url.trim_end_matches('/'), self.id)
    }

    /// Look up a field by its query name.
    ///
    /// Covers the fixed slots, the date parts, `id`, `type` and any extra
    /// configured field. Returns `None` for names the item cannot answer.
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        let value = match name {
            "id" => return Some(Cow::Owned(self.id.to_string())),
            "type" => &self.item_type,
            FieldMap::TITLE => &self.title,
            FieldMap::DATE => &self.date,
            FieldMap::CITY => &self.city,
            FieldMap::STATE => &self.state,
            FieldMap::COUNTRY => &self.country,
            "year" => return Some(Cow::Borrowed(self.year())),
            "month" => return Some(Cow::Borrowed(self.month())),
            "day" => return Some(Cow::Borrowed(self.day())),
            other => return self.extras.get(other).map(|v| Cow::Borrowed(v.as_str())),
        };
        Some(Cow::Borrowed(value.as_str()))
    }
}

/// Normalized items split by whether a file lookup is still needed.
///
/// Each side keeps the order in which items were normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionedItems {
    pub needs_thumbnail: Vec<NormalizedItem>,
    pub no_thumbnail: Vec<NormalizedItem>,
}

impl PartitionedItems {
    /// Route an item to its side of the partition.
    pub fn push(&mut self, item: NormalizedItem) {
        if item.thumbnail.is_pending() {
            self.needs_thumbnail.push(item);
        } else {
            self.no_thumbnail.push(item);
        }
    }

    /// Keep only items matching `keep`, on both sides, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&NormalizedItem) -> bool) {
        self.needs_thumbnail.retain(|item| keep(item));
        self.no_thumbnail.retain(|item| keep(item));
    }

    pub fn len(&self) -> usize {
        self.needs_thumbnail.len() + self.no_thumbnail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// SortKey
// ---------------------------------------------------------------------------

/// Field the result set is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Title,
    Date,
    City,
    State,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [Self::Title, Self::Date, Self::City, Self::State];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Date => "date",
            Self::City => "city",
            Self::State => "state",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = HarvestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| {
                HarvestError::validation(format!(
                    "unknown sort key '{s}': expected one of title, date, city, state"
                ))
            })
    }
}
