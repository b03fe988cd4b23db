//! Data models for the insights client.
//!
//! This module contains the wire shapes returned by the school backend,
//! the ingested content records, and the derived projections produced
//! by the insights aggregator.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The three content types a school publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    News,
    Events,
    Gallery,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::News => write!(f, "News"),
            Category::Events => write!(f, "Events"),
            Category::Gallery => write!(f, "Gallery"),
        }
    }
}

impl Category {
    /// Every category, in report order.
    pub const ALL: [Category; 3] = [Category::News, Category::Events, Category::Gallery];

    /// REST collection path on the backend.
    pub fn path(&self) -> &'static str {
        match self {
            Category::News => "news",
            Category::Events => "events",
            Category::Gallery => "gallery",
        }
    }

    /// Title used for an activity entry whose item has no title.
    pub fn fallback_title(&self) -> &'static str {
        match self {
            Category::News => "News update",
            Category::Events => "Event update",
            Category::Gallery => "Gallery update",
        }
    }

    /// Chart colour for this category.
    pub fn color(&self) -> &'static str {
        match self {
            Category::News => "#0ea5e9",
            Category::Events => "#14b8a6",
            Category::Gallery => "#f59e0b",
        }
    }

    /// Label of the dashboard stat card.
    pub fn stat_label(&self) -> &'static str {
        match self {
            Category::News => "News Feed",
            Category::Events => "Events Count",
            Category::Gallery => "Gallery Items",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "news" => Ok(Category::News),
            "events" | "event" => Ok(Category::Events),
            "gallery" => Ok(Category::Gallery),
            other => Err(format!(
                "Unknown category '{}' (expected news, events or gallery)",
                other
            )),
        }
    }
}

/// Trailing window length for date-based projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum RangeDays {
    Week,
    #[default]
    Month,
    Quarter,
}

impl RangeDays {
    pub fn days(&self) -> u32 {
        match self {
            RangeDays::Week => 7,
            RangeDays::Month => 30,
            RangeDays::Quarter => 90,
        }
    }
}

impl TryFrom<u32> for RangeDays {
    type Error = String;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            7 => Ok(RangeDays::Week),
            30 => Ok(RangeDays::Month),
            90 => Ok(RangeDays::Quarter),
            other => Err(format!("Range must be 7, 30 or 90 days, got {}", other)),
        }
    }
}

impl From<RangeDays> for u32 {
    fn from(range: RangeDays) -> Self {
        range.days()
    }
}

impl fmt::Display for RangeDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}D", self.days())
    }
}

/// Which projection the report leads with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum InsightView {
    /// Per-day activity counts
    #[default]
    Timeline,
    /// Share of each category in the backend totals
    Split,
    /// Totals against items inside the window
    Volume,
}

impl fmt::Display for InsightView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsightView::Timeline => write!(f, "Timeline"),
            InsightView::Split => write!(f, "Content Split"),
            InsightView::Volume => write!(f, "Volume"),
        }
    }
}

/// A raw date field as the backend sends it.
///
/// Strings are the usual shape; numbers are epoch milliseconds. Anything
/// else is kept so the item counts as dated-but-unparseable instead of
/// failing the whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
    Text(String),
    Millis(i64),
    Other(serde_json::Value),
}

impl DateValue {
    /// Empty strings, zero and `false` count as absent.
    pub fn is_blank(&self) -> bool {
        match self {
            DateValue::Text(text) => text.trim().is_empty(),
            DateValue::Millis(ms) => *ms == 0,
            DateValue::Other(value) => matches!(
                value,
                serde_json::Value::Null | serde_json::Value::Bool(false)
            ),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DateValue::Text(text) => Some(text),
            DateValue::Millis(_) | DateValue::Other(_) => None,
        }
    }
}

impl From<&str> for DateValue {
    fn from(text: &str) -> Self {
        DateValue::Text(text.to_string())
    }
}

/// Reads strings and numbers as text and drops any other JSON type.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(text)) => Some(text),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// A content item as the backend sends it.
///
/// Only the fields the insights need are kept; everything else is ignored.
/// Mongo documents may carry both `_id` and the `id` virtual, so the two
/// are read separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        rename = "_id",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub object_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<DateValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateValue>,
}

impl ContentItem {
    /// `id` when present, otherwise `_id`.
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().or(self.object_id.as_deref())
    }
}

/// Pagination metadata attached to a collection page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    #[allow(dead_code)] // Response field, single-page fetches never follow it
    pub total_pages: Option<u64>,
}

/// One page of a content collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionPage {
    #[serde(default)]
    pub data: Vec<ContentItem>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl CollectionPage {
    /// Authoritative item count: the backend total when it reports a
    /// positive one, otherwise the number of fetched items.
    pub fn total_count(&self) -> u64 {
        self.pagination
            .and_then(|p| p.total)
            .filter(|total| *total > 0)
            .unwrap_or(self.data.len() as u64)
    }

    /// True when the backend holds more items than this page carries.
    pub fn is_truncated(&self) -> bool {
        self.total_count() > self.data.len() as u64
    }
}

/// A content item after ingestion, with its activity date resolved once.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub category: Category,
    pub id: Option<String>,
    pub title: Option<String>,
    /// `None` when the item carries no date or the chosen one is malformed.
    pub activity_date: Option<DateTime<Utc>>,
}

impl ContentRecord {
    /// Title for display, falling back to "<Category> update".
    pub fn display_title(&self) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .unwrap_or_else(|| self.category.fallback_title().to_string())
    }
}

/// Activity counts for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineRow {
    pub day: NaiveDate,
    /// `MM-DD`, the axis label.
    pub day_label: String,
    #[serde(rename = "News")]
    pub news: usize,
    #[serde(rename = "Events")]
    pub events: usize,
    #[serde(rename = "Gallery")]
    pub gallery: usize,
}

impl TimelineRow {
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            day_label: day.format("%m-%d").to_string(),
            news: 0,
            events: 0,
            gallery: 0,
        }
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::News => self.news,
            Category::Events => self.events,
            Category::Gallery => self.gallery,
        }
    }

    pub fn bump(&mut self, category: Category) {
        match category {
            Category::News => self.news += 1,
            Category::Events => self.events += 1,
            Category::Gallery => self.gallery += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.news + self.events + self.gallery
    }
}

/// Slice of the category split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDatum {
    pub category: Category,
    pub value: u64,
    pub color: String,
}

/// Total items against items inside the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDatum {
    pub category: Category,
    pub total: u64,
    pub window: usize,
    /// Fewer items were fetched than the backend reports.
    pub truncated: bool,
}

/// One line of the recent activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub date: DateTime<Utc>,
}

/// All projections for one range selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub generated_at: DateTime<FixedOffset>,
    pub range_days: RangeDays,
    /// Series label for the in-window volume bars.
    pub window_label: String,
    pub timeline: Vec<TimelineRow>,
    pub split: Vec<SplitDatum>,
    pub volume: Vec<VolumeDatum>,
    pub recent: Vec<ActivityEntry>,
}

impl Insights {
    /// Number of items that fell inside the window across all categories.
    pub fn window_total(&self) -> usize {
        self.volume.iter().map(|v| v.window).sum()
    }
}

/// Feature toggles chosen by the school.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolFeatures {
    #[serde(default)]
    pub news: bool,
    #[serde(default)]
    pub events: bool,
    #[serde(default)]
    pub gallery: bool,
}

impl SchoolFeatures {
    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::News => self.news,
            Category::Events => self.events,
            Category::Gallery => self.gallery,
        }
    }

    pub fn set(&mut self, category: Category, enabled: bool) {
        match category {
            Category::News => self.news = enabled,
            Category::Events => self.events = enabled,
            Category::Gallery => self.gallery = enabled,
        }
    }
}

/// The signed-in school as the backend describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolProfile {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        rename = "_id",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_name: Option<String>,
    #[serde(default)]
    pub features: SchoolFeatures,
}

impl SchoolProfile {
    /// `id` when present, otherwise `_id`.
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().or(self.object_id.as_deref())
    }

    pub fn display_name(&self) -> &str {
        self.school_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("School Panel")
    }
}

/// One dashboard stat card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroStat {
    pub category: Category,
    pub label: String,
    pub value: u64,
}

/// Dashboard header: school name plus the enabled stat cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroStats {
    pub school_name: String,
    pub stats: Vec<HeroStat>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_order_and_labels() {
        assert_eq!(
            Category::ALL,
            [Category::News, Category::Events, Category::Gallery]
        );
        assert_eq!(Category::Events.to_string(), "Events");
        assert_eq!(Category::Events.fallback_title(), "Event update");
        assert_eq!(Category::Gallery.path(), "gallery");
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("NEWS".parse::<Category>(), Ok(Category::News));
        assert_eq!("event".parse::<Category>(), Ok(Category::Events));
        assert!("blog".parse::<Category>().is_err());
    }

    #[test]
    fn test_range_days_conversion() {
        assert_eq!(RangeDays::try_from(7), Ok(RangeDays::Week));
        assert_eq!(RangeDays::try_from(90), Ok(RangeDays::Quarter));
        assert!(RangeDays::try_from(14).is_err());
        assert_eq!(RangeDays::default().days(), 30);
        assert_eq!(RangeDays::Week.to_string(), "7D");
    }

    #[test]
    fn test_content_item_accepts_mongo_shape() {
        let json = r#"{
            "_id": "abc123",
            "title": "Sports day",
            "fromDate": "2026-10-01",
            "toDate": "2026-10-02",
            "location": "Field",
            "images": []
        }"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.identifier(), Some("abc123"));
        assert_eq!(item.from_date, Some(DateValue::from("2026-10-01")));
        assert!(item.created_at.is_none());
    }

    #[test]
    fn test_content_item_with_id_and_virtual_id() {
        let page: CollectionPage = serde_json::from_str(
            r#"{"data":[{"_id":"abc","id":"abc","title":"Open day","createdAt":"2026-10-18T08:00:00Z"}],"pagination":{"total":1}}"#,
        )
        .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].identifier(), Some("abc"));
        assert_eq!(page.total_count(), 1);

        let profile: SchoolProfile =
            serde_json::from_str(r#"{"_id":"s1","id":"s1","schoolName":"Hillside"}"#).unwrap();
        assert_eq!(profile.identifier(), Some("s1"));
    }

    #[test]
    fn test_odd_field_types_do_not_fail_the_page() {
        let page: CollectionPage = serde_json::from_str(
            r#"{"data":[
                {"_id":{"$oid":"x"},"title":42,"createdAt":1760774400000},
                {"title":["not","text"],"createdAt":{"when":"today"},"date":"2026-10-18"},
                {"createdAt":null,"fromDate":"2026-10-01"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(page.data.len(), 3);

        let epoch = &page.data[0];
        assert!(epoch.object_id.is_none());
        assert_eq!(epoch.title.as_deref(), Some("42"));
        assert_eq!(epoch.created_at, Some(DateValue::Millis(1_760_774_400_000)));

        let object_date = &page.data[1];
        assert!(object_date.title.is_none());
        assert!(matches!(object_date.created_at, Some(DateValue::Other(_))));

        assert!(page.data[2].created_at.is_none());
    }

    #[test]
    fn test_date_value_blankness() {
        assert!(DateValue::from("  ").is_blank());
        assert!(DateValue::Millis(0).is_blank());
        assert!(DateValue::Other(serde_json::Value::Bool(false)).is_blank());
        assert!(!DateValue::Millis(1).is_blank());
        assert!(!DateValue::Other(serde_json::json!({"a": 1})).is_blank());
    }

    #[test]
    fn test_collection_page_total_count() {
        let page: CollectionPage = serde_json::from_str(
            r#"{"data":[{"title":"a"},{"title":"b"}],"pagination":{"total":42,"totalPages":5}}"#,
        )
        .unwrap();
        assert_eq!(page.total_count(), 42);
        assert!(page.is_truncated());

        let no_meta: CollectionPage = serde_json::from_str(r#"{"data":[{"title":"a"}]}"#).unwrap();
        assert_eq!(no_meta.total_count(), 1);
        assert!(!no_meta.is_truncated());

        let zero_total: CollectionPage =
            serde_json::from_str(r#"{"data":[{}],"pagination":{"total":0}}"#).unwrap();
        assert_eq!(zero_total.total_count(), 1);
    }

    #[test]
    fn test_display_title_fallback() {
        let record = ContentRecord {
            category: Category::Gallery,
            id: None,
            title: Some("  ".to_string()),
            activity_date: None,
        };
        assert_eq!(record.display_title(), "Gallery update");
    }

    #[test]
    fn test_timeline_row_bump() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let mut row = TimelineRow::empty(day);
        assert_eq!(row.day_label, "03-09");
        row.bump(Category::Events);
        row.bump(Category::Events);
        row.bump(Category::News);
        assert_eq!(row.count(Category::Events), 2);
        assert_eq!(row.count(Category::Gallery), 0);
        assert_eq!(row.total(), 3);
    }

    #[test]
    fn test_school_features_default_disabled() {
        let profile: SchoolProfile =
            serde_json::from_str(r#"{"schoolName":"Hillside"}"#).unwrap();
        for category in Category::ALL {
            assert!(!profile.features.is_enabled(category));
        }
        assert_eq!(profile.display_name(), "Hillside");
        assert_eq!(SchoolProfile::default().display_name(), "School Panel");
    }
}
