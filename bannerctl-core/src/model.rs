//! Banner, slider and relation types

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BannerError, Result};

/// Position written for every newly inserted relation row
pub const DEFAULT_POSITION: i32 = 1;

/// Store-assigned banner identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BannerId(i64);

impl BannerId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for BannerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BannerId {
    type Err = BannerError;

    fn from_str(s: &str) -> Result<Self> {
        parse_positive("banner_id", s).map(Self)
    }
}

/// Slider identity, referenced only as a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SliderId(i64);

impl SliderId {
    pub const MIN: Self = Self(1);
    pub const MAX: Self = Self(i64::MAX);

    /// Create a slider id, rejecting zero and negative values.
    pub fn new(id: i64) -> Result<Self> {
        if id <= 0 {
            return Err(BannerError::validation(
                "slider_id",
                format!("{id} is not a positive integer"),
            ));
        }
        Ok(Self(id))
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SliderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for SliderId {
    type Error = BannerError;

    fn try_from(id: i64) -> Result<Self> {
        Self::new(id)
    }
}

impl From<SliderId> for i64 {
    fn from(id: SliderId) -> Self {
        id.0
    }
}

impl FromStr for SliderId {
    type Err = BannerError;

    fn from_str(s: &str) -> Result<Self> {
        parse_positive("slider_id", s).map(Self)
    }
}

fn parse_positive(field: &'static str, raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| BannerError::validation(field, format!("'{trimmed}' is not an integer")))?;
    if value <= 0 {
        return Err(BannerError::validation(
            field,
            format!("{value} is not a positive integer"),
        ));
    }
    Ok(value)
}

/// Caller intent for a banner's slider relations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliderSelection {
    /// Leave persisted relations untouched
    #[default]
    Unspecified,
    /// Relations should be exactly this set
    Ids(BTreeSet<SliderId>),
}

impl SliderSelection {
    /// Desired set from already-validated ids. Duplicates collapse.
    pub fn ids(ids: impl IntoIterator<Item = SliderId>) -> Self {
        Self::Ids(ids.into_iter().collect())
    }

    /// Desired set that removes every relation
    pub fn none() -> Self {
        Self::Ids(BTreeSet::new())
    }

    /// Parse raw identifiers. Any malformed entry fails the whole selection.
    pub fn parse<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .map(|s| s.as_ref().parse::<SliderId>())
            .collect::<Result<BTreeSet<_>>>()
            .map(Self::Ids)
    }

    /// Validate integer identifiers.
    pub fn from_raw_ids(raw: impl IntoIterator<Item = i64>) -> Result<Self> {
        raw.into_iter()
            .map(SliderId::new)
            .collect::<Result<BTreeSet<_>>>()
            .map(Self::Ids)
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, Self::Unspecified)
    }

    pub fn as_set(&self) -> Option<&BTreeSet<SliderId>> {
        match self {
            Self::Unspecified => None,
            Self::Ids(ids) => Some(ids),
        }
    }
}

/// Whether a save creates a new banner or updates an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Create,
    Update,
}

/// Persisted banner columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerRow {
    pub name: String,
    pub url: Option<String>,
    pub image: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Banner row as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBanner {
    pub id: BannerId,
    pub row: BannerRow,
}

/// Timestamps the store holds after an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One join-table row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationRow {
    pub banner_id: BannerId,
    pub slider_id: SliderId,
    pub position: i32,
}

/// A banner together with its relation intent and reconciliation output.
///
/// Identity and timestamps are owned by the save path: callers can read
/// them but never set them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    id: Option<BannerId>,
    pub name: String,
    pub url: Option<String>,
    pub image: Option<String>,
    pub enabled: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,

    /// Relations the caller wants after the next save
    #[serde(skip)]
    pub desired_sliders: SliderSelection,
    #[serde(skip)]
    previous_sliders: Option<BTreeSet<SliderId>>,
    #[serde(skip)]
    changed: bool,
    #[serde(skip)]
    affected_sliders: BTreeSet<SliderId>,
}

impl Banner {
    /// New, unsaved banner with no relation intent.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            url: None,
            image: None,
            enabled: true,
            created_at: None,
            updated_at: None,
            desired_sliders: SliderSelection::Unspecified,
            previous_sliders: None,
            changed: false,
            affected_sliders: BTreeSet::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_sliders(mut self, sliders: SliderSelection) -> Self {
        self.desired_sliders = sliders;
        self
    }

    /// Rebuild a banner from its stored row.
    pub fn from_stored(stored: StoredBanner) -> Self {
        let StoredBanner { id, row } = stored;
        Self {
            id: Some(id),
            name: row.name,
            url: row.url,
            image: row.image,
            enabled: row.enabled,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
            desired_sliders: SliderSelection::Unspecified,
            previous_sliders: None,
            changed: false,
            affected_sliders: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> Option<BannerId> {
        self.id
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Relations persisted before the last reconciliation, if loaded
    pub fn previous_sliders(&self) -> Option<&BTreeSet<SliderId>> {
        self.previous_sliders.as_ref()
    }

    /// Whether the last reconciliation wrote to the join table
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Sliders inserted or deleted by the last reconciliation
    pub fn affected_sliders(&self) -> &BTreeSet<SliderId> {
        &self.affected_sliders
    }

    pub(crate) fn assign_id(&mut self, id: BannerId) -> Result<()> {
        match self.id {
            Some(existing) if existing != id => Err(BannerError::invalid_state(format!(
                "banner {existing} cannot be re-assigned id {id}"
            ))),
            _ => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    pub(crate) fn set_timestamps(&mut self, stamps: Timestamps) {
        self.created_at = Some(stamps.created_at);
        self.updated_at = Some(stamps.updated_at);
    }

    pub(crate) fn set_previous_sliders(&mut self, previous: BTreeSet<SliderId>) {
        self.previous_sliders = Some(previous);
    }

    pub(crate) fn record_outcome(&mut self, affected: BTreeSet<SliderId>) {
        self.changed = !affected.is_empty();
        self.affected_sliders = affected;
    }

    /// Columns to write, stamped with the given times.
    pub(crate) fn to_row(&self, stamps: Timestamps) -> BannerRow {
        BannerRow {
            name: self.name.clone(),
            url: self.url.clone(),
            image: self.image.clone(),
            enabled: self.enabled,
            created_at: stamps.created_at,
            updated_at: stamps.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slider(id: i64) -> SliderId {
        SliderId::new(id).unwrap()
    }

    #[test]
    fn parse_collapses_duplicates() {
        let selection = SliderSelection::parse(["3", " 1", "3"]).unwrap();
        assert_eq!(
            selection.as_set().unwrap(),
            &BTreeSet::from([slider(1), slider(3)])
        );
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        let err = SliderSelection::parse(["1", "two"]).unwrap_err();
        assert!(matches!(err, BannerError::Validation { field: "slider_id", .. }));

        let err = SliderSelection::from_raw_ids([4, 0]).unwrap_err();
        assert!(err.to_string().contains("positive"));

        assert!("-3".parse::<SliderId>().is_err());
        assert!("".parse::<BannerId>().is_err());
    }

    #[test]
    fn deserialized_selection_validates_ids() {
        let selection: SliderSelection = serde_json::from_str(r#"{"ids":[12,11,12]}"#).unwrap();
        assert_eq!(selection, SliderSelection::ids([slider(11), slider(12)]));

        let err = serde_json::from_str::<SliderSelection>(r#"{"ids":[11,0]}"#).unwrap_err();
        assert!(err.to_string().contains("not a positive integer"));
        assert!(serde_json::from_str::<SliderId>("-4").is_err());
        assert_eq!(serde_json::to_string(&slider(9)).unwrap(), "9");
    }

    #[test]
    fn new_banner_has_no_intent() {
        let banner = Banner::new("spring sale");
        assert!(banner.id().is_none());
        assert!(banner.desired_sliders.is_unspecified());
        assert!(!banner.changed());
        assert!(banner.previous_sliders().is_none());
    }

    #[test]
    fn assigned_id_is_immutable() {
        let mut banner = Banner::new("b");
        banner.assign_id(BannerId::new(5)).unwrap();
        banner.assign_id(BannerId::new(5)).unwrap();
        let err = banner.assign_id(BannerId::new(6)).unwrap_err();
        assert!(matches!(err, BannerError::InvalidState { .. }));
        assert_eq!(banner.id(), Some(BannerId::new(5)));
    }
}
