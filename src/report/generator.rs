//! Report generation.
//!
//! Renders insights and dashboard stats as Markdown, JSON or plain
//! terminal text. The active view only decides which projection comes
//! first; every projection is always rendered.

use crate::models::{
    ActivityEntry, Category, HeroStats, InsightView, Insights, SplitDatum, TimelineRow,
    VolumeDatum,
};
use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

/// Shown in place of an empty recent activity feed.
pub const EMPTY_ACTIVITY_MESSAGE: &str = "No recent items yet.";

/// Longest bar in the text timeline.
const TEXT_BAR_WIDTH: usize = 30;

/// Projections in display order, active view first.
fn view_order(active: InsightView) -> [InsightView; 3] {
    use InsightView::{Split, Timeline, Volume};

    match active {
        Timeline => [Timeline, Split, Volume],
        Split => [Split, Timeline, Volume],
        Volume => [Volume, Timeline, Split],
    }
}

fn local_time(date: &DateTime<Utc>, offset: &FixedOffset) -> String {
    date.with_timezone(offset).format("%Y-%m-%d %H:%M").to_string()
}

fn percentage(value: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        value as f64 * 100.0 / total as f64
    }
}

/// Generate a complete Markdown insights report.
pub fn generate_markdown_report(insights: &Insights, view: InsightView) -> String {
    let mut output = String::new();

    output.push_str("# Content Insights\n\n");
    output.push_str(&generate_metadata_section(insights, view));

    for section in view_order(view) {
        let rendered = match section {
            InsightView::Timeline => generate_timeline_section(&insights.timeline),
            InsightView::Split => generate_split_section(&insights.split),
            InsightView::Volume => {
                generate_volume_section(&insights.volume, &insights.window_label)
            }
        };
        output.push_str(&rendered);
    }

    output.push_str(&generate_recent_section(
        &insights.recent,
        insights.generated_at.offset(),
    ));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(insights: &Insights, view: InsightView) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "- **Generated:** {}\n",
        insights.generated_at.format("%Y-%m-%d %H:%M:%S %:z")
    ));
    section.push_str(&format!(
        "- **Range:** last {} days\n",
        insights.range_days.days()
    ));
    section.push_str(&format!("- **View:** {}\n", view));
    section.push_str(&format!(
        "- **Items in window:** {}\n",
        insights.window_total()
    ));
    section.push('\n');

    section
}

/// Generate the per-day timeline table.
fn generate_timeline_section(rows: &[TimelineRow]) -> String {
    let mut section = String::new();

    section.push_str("## Timeline\n\n");
    section.push_str("| Day | News | Events | Gallery |\n");
    section.push_str("|:---|:---:|:---:|:---:|\n");

    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            row.day_label,
            row.count(Category::News),
            row.count(Category::Events),
            row.count(Category::Gallery)
        ));
    }
    section.push('\n');

    section
}

/// Generate the category split table.
fn generate_split_section(split: &[SplitDatum]) -> String {
    let mut section = String::new();
    let total: u64 = split.iter().map(|s| s.value).sum();

    section.push_str("## Content Split\n\n");
    section.push_str("| Category | Items | Share |\n");
    section.push_str("|:---|:---:|:---:|\n");

    for datum in split {
        section.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            datum.category,
            datum.value,
            percentage(datum.value, total)
        ));
    }
    section.push('\n');

    section
}

/// Generate the volume table.
fn generate_volume_section(volume: &[VolumeDatum], window_label: &str) -> String {
    let mut section = String::new();

    section.push_str("## Volume\n\n");
    section.push_str(&format!("| Category | Total items | {} |\n", window_label));
    section.push_str("|:---|:---:|:---:|\n");

    for datum in volume {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            datum.category, datum.total, datum.window
        ));
    }
    section.push('\n');

    let truncated: Vec<String> = volume
        .iter()
        .filter(|v| v.truncated)
        .map(|v| v.category.to_string())
        .collect();
    if !truncated.is_empty() {
        section.push_str(&format!(
            "> Totals come from the backend; window counts only cover the fetched items ({}).\n\n",
            truncated.join(", ")
        ));
    }

    section
}

/// Generate the recent activity list.
fn generate_recent_section(recent: &[ActivityEntry], offset: &FixedOffset) -> String {
    let mut section = String::new();

    section.push_str("## Recent Activity\n\n");

    if recent.is_empty() {
        section.push_str(EMPTY_ACTIVITY_MESSAGE);
        section.push_str("\n\n");
        return section;
    }

    for entry in recent {
        section.push_str(&format!(
            "- **{}** {} _({})_\n",
            entry.category,
            entry.title,
            local_time(&entry.date, offset)
        ));
    }
    section.push('\n');

    section
}

/// Generate a plain text insights report for the terminal.
pub fn generate_text_report(insights: &Insights, view: InsightView) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "Content insights, last {} days ({} items in window)",
        insights.range_days.days(),
        insights.window_total()
    ));

    for section in view_order(view) {
        lines.push(String::new());
        match section {
            InsightView::Timeline => {
                lines.push("Timeline".to_string());
                let peak = insights
                    .timeline
                    .iter()
                    .map(TimelineRow::total)
                    .max()
                    .unwrap_or(0)
                    .max(1);
                for row in &insights.timeline {
                    let bar = row.total() * TEXT_BAR_WIDTH / peak;
                    lines.push(format!(
                        "  {}  {:<width$} N{} E{} G{}",
                        row.day_label,
                        "#".repeat(bar),
                        row.news,
                        row.events,
                        row.gallery,
                        width = TEXT_BAR_WIDTH
                    ));
                }
            }
            InsightView::Split => {
                lines.push("Content split".to_string());
                let total: u64 = insights.split.iter().map(|s| s.value).sum();
                for datum in &insights.split {
                    lines.push(format!(
                        "  {:<8} {:>6}  {:>5.1}%",
                        datum.category.to_string(),
                        datum.value,
                        percentage(datum.value, total)
                    ));
                }
            }
            InsightView::Volume => {
                lines.push(format!("Volume (total / {})", insights.window_label));
                for datum in &insights.volume {
                    lines.push(format!(
                        "  {:<8} {:>6} / {}",
                        datum.category.to_string(),
                        datum.total,
                        datum.window
                    ));
                }
            }
        }
    }

    lines.push(String::new());
    lines.push("Recent activity".to_string());
    if insights.recent.is_empty() {
        lines.push(format!("  {}", EMPTY_ACTIVITY_MESSAGE));
    }
    for entry in &insights.recent {
        lines.push(format!(
            "  [{}] {} ({})",
            entry.category,
            entry.title,
            local_time(&entry.date, insights.generated_at.offset())
        ));
    }

    lines.join("\n") + "\n"
}

#[derive(Serialize)]
struct InsightsDocument<'a> {
    view: InsightView,
    #[serde(flatten)]
    insights: &'a Insights,
}

/// Generate a JSON insights report.
pub fn generate_json_report(insights: &Insights, view: InsightView) -> Result<String> {
    serde_json::to_string_pretty(&InsightsDocument { view, insights }).map_err(Into::into)
}

/// Generate the dashboard stats in Markdown.
pub fn generate_stats_markdown(hero: &HeroStats) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", hero.school_name));

    if hero.stats.is_empty() {
        output.push_str("No content features are enabled for this school.\n");
        return output;
    }

    output.push_str("| Stat | Value |\n");
    output.push_str("|:---|:---:|\n");
    for stat in &hero.stats {
        output.push_str(&format!("| {} | {} |\n", stat.label, stat.value));
    }

    output
}

/// Generate the dashboard stats as plain text.
pub fn generate_stats_text(hero: &HeroStats) -> String {
    let mut lines = vec![hero.school_name.clone()];

    if hero.stats.is_empty() {
        lines.push("  No content features are enabled.".to_string());
    }
    for stat in &hero.stats {
        lines.push(format!("  {:<14} {}", stat.label, stat.value));
    }

    lines.join("\n") + "\n"
}

/// Generate the dashboard stats as JSON.
pub fn generate_stats_json(hero: &HeroStats) -> Result<String> {
    serde_json::to_string_pretty(hero).map_err(Into::into)
}
