//! Content insights aggregation.
//!
//! Turns the three fetched collections into the timeline, split and volume
//! projections plus the recent activity feed. Everything here is pure: the
//! same sources, range and `now` always give the same [`Insights`].

use crate::analysis::dates::{ingest_page, Window};
use crate::models::{
    ActivityEntry, Category, CollectionPage, ContentRecord, HeroStat, HeroStats, Insights,
    RangeDays, SchoolProfile, SplitDatum, TimelineRow, VolumeDatum,
};
use chrono::{DateTime, NaiveDate, TimeZone};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Length of the recent activity feed.
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

/// Latest known state of one collection fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceState {
    Loading,
    Ready(CollectionPage),
    Failed(String),
}

impl SourceState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SourceState::Loading)
    }

    /// The fetched page, if the fetch succeeded.
    pub fn page(&self) -> Option<&CollectionPage> {
        match self {
            SourceState::Ready(page) => Some(page),
            SourceState::Loading | SourceState::Failed(_) => None,
        }
    }
}

impl<E: std::fmt::Display> From<Result<CollectionPage, E>> for SourceState {
    fn from(result: Result<CollectionPage, E>) -> Self {
        match result {
            Ok(page) => SourceState::Ready(page),
            Err(e) => SourceState::Failed(e.to_string()),
        }
    }
}

/// The three collections the insights are derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightSources {
    pub news: SourceState,
    pub events: SourceState,
    pub gallery: SourceState,
}

impl Default for InsightSources {
    fn default() -> Self {
        Self {
            news: SourceState::Loading,
            events: SourceState::Loading,
            gallery: SourceState::Loading,
        }
    }
}

impl InsightSources {
    pub fn get(&self, category: Category) -> &SourceState {
        match category {
            Category::News => &self.news,
            Category::Events => &self.events,
            Category::Gallery => &self.gallery,
        }
    }

    /// Combined loading flag: any source still in flight.
    pub fn is_loading(&self) -> bool {
        Category::ALL.iter().any(|c| self.get(*c).is_loading())
    }
}

/// Result of an aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum InsightsOutcome {
    /// At least one source has not resolved yet; nothing partial is shown.
    Loading,
    Ready(Insights),
}

/// One category's fetched data after ingestion.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub category: Category,
    /// Backend total, or the fetched length when the backend gives none.
    pub total: u64,
    pub truncated: bool,
    pub records: Vec<ContentRecord>,
}

impl CategoryInput {
    /// Failed sources come through as empty collections.
    pub fn from_source<Tz: TimeZone>(category: Category, source: &SourceState, tz: &Tz) -> Self {
        if let SourceState::Failed(reason) = source {
            warn!("{} could not be fetched, treating it as empty: {}", category, reason);
        }

        let empty = CollectionPage::default();
        let page = source.page().unwrap_or(&empty);

        Self {
            category,
            total: page.total_count(),
            truncated: page.is_truncated(),
            records: ingest_page(category, page, tz),
        }
    }

    /// Records whose activity date falls inside `window`.
    pub fn in_window<'a, Tz: TimeZone>(
        &'a self,
        window: &'a Window<Tz>,
    ) -> impl Iterator<Item = &'a ContentRecord> {
        self.records
            .iter()
            .filter(move |r| r.activity_date.map_or(false, |d| window.contains(&d)))
    }
}

/// Ingest all three sources, in category order.
pub fn ingest_sources<Tz: TimeZone>(sources: &InsightSources, tz: &Tz) -> Vec<CategoryInput> {
    Category::ALL
        .iter()
        .map(|category| CategoryInput::from_source(*category, sources.get(*category), tz))
        .collect()
}

/// Build the dense per-day timeline for `window`, oldest day first.
///
/// Records dated outside the window have no row to land in and are
/// skipped.
pub fn build_timeline<'a, I, Tz>(records: I, window: &Window<Tz>) -> Vec<TimelineRow>
where
    I: IntoIterator<Item = &'a ContentRecord>,
    Tz: TimeZone,
{
    let mut rows: BTreeMap<NaiveDate, TimelineRow> = window
        .days()
        .map(|day| (day, TimelineRow::empty(day)))
        .collect();

    for record in records {
        let Some(date) = record.activity_date else {
            continue;
        };
        if let Some(row) = rows.get_mut(&window.day_of(&date)) {
            row.bump(record.category);
        }
    }

    rows.into_values().collect()
}

/// Category split over the backend totals.
pub fn build_split(inputs: &[CategoryInput]) -> Vec<SplitDatum> {
    inputs
        .iter()
        .map(|input| SplitDatum {
            category: input.category,
            value: input.total,
            color: input.category.color().to_string(),
        })
        .collect()
}

/// Totals paired with the number of items inside `window`.
pub fn build_volume<Tz: TimeZone>(
    inputs: &[CategoryInput],
    window: &Window<Tz>,
) -> Vec<VolumeDatum> {
    inputs
        .iter()
        .map(|input| VolumeDatum {
            category: input.category,
            total: input.total,
            window: input.in_window(window).count(),
            truncated: input.truncated,
        })
        .collect()
}

/// The `limit` most recent dated records across all categories, newest
/// first.
pub fn recent_activity(inputs: &[CategoryInput], limit: usize) -> Vec<ActivityEntry> {
    let mut entries: Vec<ActivityEntry> = inputs
        .iter()
        .flat_map(|input| input.records.iter())
        .filter_map(|record| {
            record.activity_date.map(|date| ActivityEntry {
                category: record.category,
                id: record.id.clone(),
                title: record.display_title(),
                date,
            })
        })
        .collect();

    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries.truncate(limit);
    entries
}

/// Compute every projection for `range`, or report the combined loading
/// state.
pub fn aggregate<Tz: TimeZone>(
    sources: &InsightSources,
    range: RangeDays,
    now: DateTime<Tz>,
    recent_limit: usize,
) -> InsightsOutcome {
    if sources.is_loading() {
        debug!("Insights sources still loading");
        return InsightsOutcome::Loading;
    }

    let inputs = ingest_sources(sources, &now.timezone());
    let window = Window::trailing(range.days(), &now);

    let window_ref = &window;
    let timeline = build_timeline(
        inputs.iter().flat_map(move |i| i.in_window(window_ref)),
        &window,
    );
    let split = build_split(&inputs);
    let volume = build_volume(&inputs, &window);
    let recent = recent_activity(&inputs, recent_limit);

    debug!(
        "Aggregated {} records into {} timeline rows ({} in window, {} recent)",
        inputs.iter().map(|i| i.records.len()).sum::<usize>(),
        timeline.len(),
        volume.iter().map(|v| v.window).sum::<usize>(),
        recent.len()
    );

    InsightsOutcome::Ready(Insights {
        generated_at: now.fixed_offset(),
        range_days: range,
        window_label: format!("Items in last {}d", range.days()),
        timeline,
        split,
        volume,
        recent,
    })
}

/// Dashboard stat cards for the categories the school has enabled.
///
/// Unlike the split, a missing backend total shows as zero.
pub fn build_hero_stats(profile: &SchoolProfile, sources: &InsightSources) -> HeroStats {
    let stats = Category::ALL
        .iter()
        .filter(|category| profile.features.is_enabled(**category))
        .map(|category| HeroStat {
            category: *category,
            label: category.stat_label().to_string(),
            value: sources
                .get(*category)
                .page()
                .and_then(|page| page.pagination)
                .and_then(|p| p.total)
                .unwrap_or(0),
        })
        .collect();

    HeroStats {
        school_name: profile.display_name().to_string(),
        stats,
    }
}
