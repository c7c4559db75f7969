//! Daily workload aggregation.
//!
//! Everything here is a pure derivation over the item list and the effective
//! day. Stored due dates are never touched: overdue items are only *shown*
//! under today.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::day::Day;
use crate::models::{Category, Language, ReviewItem};
use crate::schedule::{project_schedule, EntryKind};

/// What is due (or overdue) on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStats {
    pub count: usize,
    pub total_minutes: u64,
    pub time_string: String,
    pub has_tasks: bool,
}

pub fn daily_stats(items: &[ReviewItem], today: Day) -> DailyStats {
    let due: Vec<&ReviewItem> = items.iter().filter(|item| item.is_due_on(today)).collect();
    let total_minutes: u64 = due.iter().map(|item| u64::from(item.original_duration)).sum();

    debug!(day = %today, count = due.len(), total_minutes, "computed daily stats");

    DailyStats {
        count: due.len(),
        total_minutes,
        time_string: format_minutes(total_minutes),
        has_tasks: !due.is_empty(),
    }
}

/// `"{h}h {m}m"` when there is at least an hour, else `"{m}m"`.
pub fn format_minutes(total: u64) -> String {
    let hours = total / 60;
    let minutes = total % 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Unarchived items bucketed by the day they should be shown under.
///
/// Overdue items land in today's bucket. Items are sorted by stored due date
/// before bucketing, so overdue items lead today's list.
pub fn group_by_effective_date(items: &[ReviewItem], today: Day) -> BTreeMap<Day, Vec<&ReviewItem>> {
    let mut active: Vec<&ReviewItem> = items.iter().filter(|item| !item.is_archived).collect();
    active.sort_by_key(|item| item.next_due_date);

    let mut groups: BTreeMap<Day, Vec<&ReviewItem>> = BTreeMap::new();
    for item in active {
        let key = item.next_due_date.max(today);
        groups.entry(key).or_default().push(item);
    }
    groups
}

// ══════════════════════════════════════════════════════════════════════════
// Agenda Lookup
// ══════════════════════════════════════════════════════════════════════════

/// Narrows the agenda to one language and/or one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgendaFilter {
    pub language: Option<Language>,
    pub category: Option<Category>,
}

impl AgendaFilter {
    pub fn matches(&self, item: &ReviewItem) -> bool {
        self.language.map_or(true, |lang| item.language == lang)
            && self.category.map_or(true, |cat| item.category == cat)
    }

    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.category.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgendaEntry<'a> {
    pub item: &'a ReviewItem,
    pub stage: u8,
    pub kind: EntryKind,
}

/// Day-to-entries lookup built from every matching item's projection.
pub fn calendar_lookup<'a>(
    items: &'a [ReviewItem],
    filter: &AgendaFilter,
) -> BTreeMap<Day, Vec<AgendaEntry<'a>>> {
    let mut map: BTreeMap<Day, Vec<AgendaEntry<'a>>> = BTreeMap::new();

    for item in items.iter().filter(|item| filter.matches(item)) {
        for entry in project_schedule(item) {
            map.entry(entry.date).or_default().push(AgendaEntry {
                item,
                stage: entry.stage,
                kind: entry.kind,
            });
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::log_item;

    fn day(y: i32, m: u32, d: u32) -> Day {
        Day::from_ymd(y, m, d).unwrap()
    }

    fn due_on(topic: &str, due: Day, minutes: i64) -> ReviewItem {
        let mut item = log_item(topic, None, Language::English, Category::Lexis, minutes, due.add_days(-1)).unwrap();
        item.next_due_date = due;
        item
    }

    #[test]
    fn test_daily_stats_counts_due_and_overdue() {
        let t = day(2024, 6, 10);
        let items = vec![
            due_on("overdue", t.add_days(-1), 20),
            due_on("today", t, 30),
            due_on("tomorrow", t.add_days(1), 40),
        ];

        let stats = daily_stats(&items, t);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_minutes, 50);
        assert_eq!(stats.time_string, "50m");
        assert!(stats.has_tasks);
    }

    #[test]
    fn test_daily_stats_ignores_archived() {
        let t = day(2024, 6, 10);
        let mut done = due_on("done", t, 90);
        done.is_archived = true;

        let stats = daily_stats(&[done], t);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.time_string, "0m");
        assert!(!stats.has_tasks);
    }

    #[test]
    fn test_daily_stats_with_huge_durations() {
        let t = day(2024, 6, 10);
        let items = vec![due_on("marathon", t, 3_000_000_000), due_on("ultra", t, 3_000_000_000)];

        let stats = daily_stats(&items, t);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_minutes, 6_000_000_000);
        assert_eq!(stats.time_string, "100000000h 0m");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0), "0m");
        assert_eq!(format_minutes(59), "59m");
        assert_eq!(format_minutes(60), "1h 0m");
        assert_eq!(format_minutes(135), "2h 15m");
    }

    #[test]
    fn test_grouping_pulls_overdue_into_today() {
        let t = day(2024, 6, 10);
        let mut archived = due_on("archived", t, 10);
        archived.is_archived = true;
        let items = vec![
            due_on("later", t.add_days(3), 10),
            due_on("today", t, 10),
            due_on("overdue", t.add_days(-4), 10),
            archived,
        ];

        let groups = group_by_effective_date(&items, t);
        let keys: Vec<Day> = groups.keys().copied().collect();
        assert_eq!(keys, [t, t.add_days(3)]);

        let today: Vec<&str> = groups[&t].iter().map(|i| i.topic.as_str()).collect();
        assert_eq!(today, ["overdue", "today"]);

        // Display shift only.
        assert_eq!(groups[&t][0].next_due_date, t.add_days(-4));
    }

    #[test]
    fn test_calendar_lookup_with_filters() {
        let d = day(2024, 6, 3);
        let english = log_item("Phrasal verbs", None, Language::English, Category::Lexis, 20, d).unwrap();
        let german = log_item("Kasus", None, Language::German, Category::Grammar, 30, d).unwrap();
        let items = vec![english, german];

        let all = calendar_lookup(&items, &AgendaFilter::default());
        assert_eq!(all.len(), 5);
        assert_eq!(all[&d.add_days(1)].len(), 2);
        assert_eq!(all[&d.add_days(1)][0].kind, EntryKind::Actual);
        assert_eq!(all[&d.add_days(25)][0].stage, 5);

        let only_german = AgendaFilter {
            language: Some(Language::German),
            category: None,
        };
        let filtered = calendar_lookup(&items, &only_german);
        assert!(filtered.values().flatten().all(|e| e.item.topic == "Kasus"));

        let nothing = AgendaFilter {
            language: Some(Language::German),
            category: Some(Category::Lexis),
        };
        assert!(calendar_lookup(&items, &nothing).is_empty());
    }
}
