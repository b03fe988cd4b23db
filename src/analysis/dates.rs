//! Activity date resolution and trailing day windows.
//!
//! Every date-based projection goes through [`extract_date`] and
//! [`Window`], so an item is either dated the same way everywhere or
//! treated as dateless everywhere. Local wall-clock rules come from the
//! caller's [`TimeZone`], so windows and day buckets follow DST changes.

use crate::models::{Category, CollectionPage, ContentItem, ContentRecord, DateValue};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Naive timestamp layouts, read in the caller's local time zone.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Returns the raw activity date of an item.
///
/// Fields are consulted in the order `createdAt`, `fromDate`, `date`,
/// `updatedAt`; the first present, non-blank one wins even if it later
/// fails to parse.
pub fn extract_date(item: &ContentItem) -> Option<&DateValue> {
    [
        &item.created_at,
        &item.from_date,
        &item.date,
        &item.updated_at,
    ]
    .into_iter()
    .filter_map(Option::as_ref)
    .find(|value| !value.is_blank())
}

/// Resolve a wall-clock time in `tz`.
///
/// Ambiguous times take the earlier instant; times skipped by a DST jump
/// move forward by the size of a typical jump.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(*naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a backend date string.
///
/// RFC 3339 timestamps keep their own offset, naive timestamps are read in
/// `tz`, and bare `YYYY-MM-DD` dates mean UTC midnight.
pub fn parse_date_text<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return resolve_local(tz, &naive);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// Parse any raw date value. Numbers are epoch milliseconds; other JSON
/// types never parse.
pub fn parse_activity_date<Tz: TimeZone>(raw: &DateValue, tz: &Tz) -> Option<DateTime<Utc>> {
    match raw {
        DateValue::Text(text) => parse_date_text(text, tz),
        DateValue::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
        DateValue::Other(_) => None,
    }
}

/// Ingest one wire item, resolving its activity date once.
pub fn ingest<Tz: TimeZone>(category: Category, item: &ContentItem, tz: &Tz) -> ContentRecord {
    ContentRecord {
        category,
        id: item.identifier().map(String::from),
        title: item.title.clone(),
        activity_date: extract_date(item).and_then(|raw| parse_activity_date(raw, tz)),
    }
}

/// Ingest every item of a page.
pub fn ingest_page<Tz: TimeZone>(
    category: Category,
    page: &CollectionPage,
    tz: &Tz,
) -> Vec<ContentRecord> {
    page.data
        .iter()
        .map(|item| ingest(category, item, tz))
        .collect()
}

/// The trailing `days`-day interval ending at `now`.
///
/// The lower bound is local midnight of the first day in `tz`, the upper
/// bound is `now` itself, so items dated later today are not yet inside.
#[derive(Debug, Clone)]
pub struct Window<Tz: TimeZone> {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tz: Tz,
}

impl<Tz: TimeZone> Window<Tz> {
    pub fn trailing(days: u32, now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let last_day = now.date_naive();
        let first_day = last_day - Duration::days(i64::from(days.max(1)) - 1);
        let midnight = first_day.and_time(NaiveTime::MIN);
        let start = resolve_local(&tz, &midnight)
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight));

        Self {
            first_day,
            last_day,
            start,
            end: now.with_timezone(&Utc),
            tz,
        }
    }

    pub fn contains(&self, date: &DateTime<Utc>) -> bool {
        *date >= self.start && *date <= self.end
    }

    /// Calendar day of `date` on the local wall clock.
    pub fn day_of(&self, date: &DateTime<Utc>) -> NaiveDate {
        date.with_timezone(&self.tz).date_naive()
    }

    /// Every day of the window, oldest first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.first_day;
        let span = (self.last_day - self.first_day).num_days();
        (0..=span).map(move |i| first + Duration::days(i))
    }
}

/// True iff `raw` parses to a moment inside the trailing `days`-day window.
///
/// Absent or malformed dates are never inside.
#[allow(dead_code)]
pub fn within_days<Tz: TimeZone>(raw: Option<&str>, days: u32, now: &DateTime<Tz>) -> bool {
    raw.and_then(|value| parse_date_text(value, &now.timezone()))
        .map(|date| Window::trailing(days, now).contains(&date))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use chrono_tz::Europe::Berlin;

    fn utc_now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-10-18T15:00:00Z").unwrap()
    }

    fn item(
        created: Option<&str>,
        from: Option<&str>,
        date: Option<&str>,
        updated: Option<&str>,
    ) -> ContentItem {
        ContentItem {
            created_at: created.map(DateValue::from),
            from_date: from.map(DateValue::from),
            date: date.map(DateValue::from),
            updated_at: updated.map(DateValue::from),
            ..ContentItem::default()
        }
    }

    fn raw(item: &ContentItem) -> Option<&str> {
        extract_date(item).and_then(DateValue::as_text)
    }

    #[test]
    fn test_extract_date_precedence() {
        let all = item(Some("c"), Some("f"), Some("d"), Some("u"));
        assert_eq!(raw(&all), Some("c"));

        let no_created = item(None, Some("f"), Some("d"), Some("u"));
        assert_eq!(raw(&no_created), Some("f"));

        let only_updated = item(None, None, None, Some("u"));
        assert_eq!(raw(&only_updated), Some("u"));

        let blank_created = item(Some(""), None, Some("d"), None);
        assert_eq!(raw(&blank_created), Some("d"));

        assert_eq!(extract_date(&ContentItem::default()), None);
    }

    #[test]
    fn test_parse_activity_date_formats() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        let rfc = parse_date_text("2026-10-18T09:30:00.000Z", &utc).unwrap();
        assert_eq!(rfc.to_rfc3339(), "2026-10-18T09:30:00+00:00");

        let naive = parse_date_text("2026-10-18T09:30:00", &plus_two).unwrap();
        assert_eq!(naive.to_rfc3339(), "2026-10-18T07:30:00+00:00");

        let spaced = parse_date_text("2026-10-18 09:30", &utc).unwrap();
        assert_eq!(spaced.to_rfc3339(), "2026-10-18T09:30:00+00:00");

        let bare = parse_date_text("2026-10-18", &plus_two).unwrap();
        assert_eq!(bare.to_rfc3339(), "2026-10-18T00:00:00+00:00");

        assert!(parse_date_text("not-a-date", &utc).is_none());
        assert!(parse_date_text("2026-13-40", &utc).is_none());
    }

    #[test]
    fn test_epoch_millis_and_other_types() {
        let epoch = parse_activity_date(&DateValue::Millis(1_760_774_400_000), &Utc).unwrap();
        assert_eq!(epoch.to_rfc3339(), "2025-10-18T08:00:00+00:00");

        let object = DateValue::Other(serde_json::json!({"when": "today"}));
        assert!(parse_activity_date(&object, &Utc).is_none());

        let record = ingest(
            Category::News,
            &ContentItem {
                created_at: Some(object),
                from_date: Some(DateValue::from("2026-10-18")),
                ..ContentItem::default()
            },
            &Utc,
        );
        assert!(record.activity_date.is_none());
    }

    #[test]
    fn test_malformed_first_field_makes_item_dateless() {
        let bad_created = item(Some("not-a-date"), Some("2026-10-18"), None, None);
        let record = ingest(Category::Events, &bad_created, &Utc);
        assert!(record.activity_date.is_none());
    }

    #[test]
    fn test_window_bounds() {
        let window = Window::trailing(7, &utc_now());
        assert_eq!(window.first_day, NaiveDate::from_ymd_opt(2026, 10, 12).unwrap());
        assert_eq!(window.last_day, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(window.start.to_rfc3339(), "2026-10-12T00:00:00+00:00");
        assert_eq!(window.days().count(), 7);
    }

    #[test]
    fn test_window_uses_local_midnight() {
        let now = DateTime::parse_from_rfc3339("2026-10-18T01:00:00+05:30").unwrap();
        let window = Window::trailing(1, &now);
        assert_eq!(window.start.to_rfc3339(), "2026-10-17T18:30:00+00:00");

        let late_utc_yesterday = DateTime::parse_from_rfc3339("2026-10-17T19:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(window.contains(&late_utc_yesterday));
        assert_eq!(
            window.day_of(&late_utc_yesterday),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
        );
    }

    #[test]
    fn test_window_across_dst_change() {
        // Berlin leaves summer time on 2026-10-25.
        let now = Berlin.with_ymd_and_hms(2026, 11, 2, 12, 0, 0).unwrap();
        let window = Window::trailing(30, &now);

        assert_eq!(window.first_day, NaiveDate::from_ymd_opt(2026, 10, 4).unwrap());
        assert_eq!(window.start.to_rfc3339(), "2026-10-03T22:00:00+00:00");

        let first_morning = Berlin
            .with_ymd_and_hms(2026, 10, 4, 0, 30, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert!(window.contains(&first_morning));
        assert_eq!(window.day_of(&first_morning), window.first_day);

        let before = Berlin
            .with_ymd_and_hms(2026, 10, 3, 23, 59, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert!(!window.contains(&before));
    }

    #[test]
    fn test_naive_times_follow_local_dst() {
        let summer = parse_date_text("2026-07-01T09:00:00", &Berlin).unwrap();
        assert_eq!(summer.to_rfc3339(), "2026-07-01T07:00:00+00:00");

        let winter = parse_date_text("2026-12-01T09:00:00", &Berlin).unwrap();
        assert_eq!(winter.to_rfc3339(), "2026-12-01T08:00:00+00:00");
    }

    #[test]
    fn test_within_days() {
        let now = utc_now();
        assert!(within_days(Some("2026-10-18T14:59:59Z"), 7, &now));
        assert!(within_days(Some("2026-10-12T00:00:00Z"), 7, &now));
        assert!(!within_days(Some("2026-10-11T23:59:59Z"), 7, &now));
        assert!(!within_days(Some("2026-10-18T15:00:01Z"), 7, &now));
        assert!(within_days(Some("2026-09-19"), 30, &now));
        assert!(!within_days(Some("not-a-date"), 90, &now));
        assert!(!within_days(None, 90, &now));
    }
}
