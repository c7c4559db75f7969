//! The five-stage repetition ladder.
//!
//! Items are logged at stage 1 and climb one stage per completed review. The
//! gap to the next review depends only on the stage just completed:
//!
//! | completed stage | days until next review |
//! |-----------------|------------------------|
//! | 0               | 1                      |
//! | 1               | 1                      |
//! | 2               | 5                      |
//! | 3               | 7                      |
//! | 4               | 11                     |
//! | 5+              | none (graduated)       |
//!
//! Completed on time, the cumulative offsets from logging are 1, 2, 7, 14
//! and 25 days. Completing the review at stage 4 graduates the item, so the
//! day-25 entry only appears in projections as the graduation date.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::day::Day;
use crate::error::{BookerError, Result};
use crate::models::{Category, Language, ReviewItem};

/// Stage at which an item graduates and is archived.
pub const FINAL_STAGE: u8 = 5;

/// Days from a completed stage to the next review, indexed by stage.
const INTERVALS: [i64; FINAL_STAGE as usize] = [1, 1, 5, 7, 11];

/// Share of a grammar session set aside for fluency drilling.
const FLUENCY_SHARE: f64 = 0.3;

/// Days until the next review after completing `stage`, or `None` once the
/// ladder is exhausted.
pub fn interval_for_stage(stage: u8) -> Option<i64> {
    INTERVALS.get(stage as usize).copied()
}

/// Whether an item sitting at `stage` has no further review.
pub fn is_terminal(stage: u8) -> bool {
    interval_for_stage(stage).is_none()
}

/// Create a freshly logged item.
///
/// Logging counts as the first exposure, so the item starts at stage 1 and
/// comes due one interval after `today`.
pub fn log_item(
    topic: &str,
    description: Option<&str>,
    language: Language,
    category: Category,
    duration_minutes: i64,
    today: Day,
) -> Result<ReviewItem> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(BookerError::EmptyTopic);
    }
    let original_duration = u32::try_from(duration_minutes)
        .ok()
        .filter(|minutes| *minutes > 0)
        .ok_or(BookerError::InvalidDuration(duration_minutes))?;

    let description = description
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    let first_gap = interval_for_stage(0).unwrap_or(1);

    Ok(ReviewItem {
        id: Uuid::new_v4().to_string(),
        topic: topic.to_string(),
        description,
        language,
        category,
        original_duration,
        created_at: today,
        next_due_date: today.add_days(first_gap),
        stage: 1,
        is_archived: false,
    })
}

/// Advance an item by one completed review on `today`.
///
/// The next due date is anchored on the day of completion, not on the old due
/// date, so early and late reviews both re-base the schedule. Reaching the
/// final stage archives the item and freezes its due date.
pub fn complete_review(item: &ReviewItem, today: Day) -> ReviewItem {
    let next_stage = item.stage.saturating_add(1);
    let mut updated = item.clone();
    updated.stage = next_stage;

    match interval_for_stage(item.stage) {
        Some(days) if !is_terminal(next_stage) => {
            updated.next_due_date = today.add_days(days);
            updated.is_archived = false;
        }
        _ => {
            updated.is_archived = true;
        }
    }

    debug!(
        id = %item.id,
        from = item.stage,
        to = updated.stage,
        due = %updated.next_due_date,
        "review completed"
    );
    updated
}

/// Advisory split of a session into main study and fluency drilling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSplit {
    pub main: u32,
    pub secondary: u32,
    pub has_split: bool,
}

pub fn time_split(duration_minutes: u32, category: Category) -> TimeSplit {
    if category.has_fluency_split() {
        let secondary = (duration_minutes as f64 * FLUENCY_SHARE).round() as u32;
        TimeSplit {
            main: duration_minutes - secondary,
            secondary,
            has_split: true,
        }
    } else {
        TimeSplit {
            main: duration_minutes,
            secondary: 0,
            has_split: false,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Projection
// ══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// The real, stored due date.
    Actual,
    /// A simulated date assuming every earlier review happens on time.
    Projected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionEntry {
    pub date: Day,
    pub stage: u8,
    pub kind: EntryKind,
}

/// The item's remaining timeline: its real due date followed by the dates it
/// would reach if every review were completed exactly when due.
pub fn project_schedule(item: &ReviewItem) -> Vec<ProjectionEntry> {
    if item.is_archived {
        return Vec::new();
    }

    let mut date = item.next_due_date;
    let mut stage = item.stage;
    let mut entries = vec![ProjectionEntry {
        date,
        stage,
        kind: EntryKind::Actual,
    }];

    // Bounded by the ladder length even for stages outside 0..=5.
    for _ in 0..FINAL_STAGE {
        if stage >= FINAL_STAGE {
            break;
        }
        let Some(days) = interval_for_stage(stage) else {
            break;
        };
        date = date.add_days(days);
        stage += 1;
        entries.push(ProjectionEntry {
            date,
            stage,
            kind: EntryKind::Projected,
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> Day {
        Day::from_ymd(y, m, d).unwrap()
    }

    fn fresh(today: Day) -> ReviewItem {
        log_item("Past simple", Some("irregular verbs"), Language::English, Category::Grammar, 30, today)
            .unwrap()
    }

    #[test]
    fn test_interval_table() {
        assert_eq!(interval_for_stage(0), Some(1));
        assert_eq!(interval_for_stage(1), Some(1));
        assert_eq!(interval_for_stage(2), Some(5));
        assert_eq!(interval_for_stage(3), Some(7));
        assert_eq!(interval_for_stage(4), Some(11));
        assert_eq!(interval_for_stage(5), None);
        assert_eq!(interval_for_stage(200), None);
    }

    #[test]
    fn test_table_matches_cumulative_offsets() {
        let cumulative: Vec<i64> = (0..FINAL_STAGE)
            .scan(0, |total, stage| {
                *total += interval_for_stage(stage).unwrap();
                Some(*total)
            })
            .collect();
        assert_eq!(cumulative, [1, 2, 7, 14, 25]);
    }

    #[test]
    fn test_log_item() {
        let today = day(2024, 6, 3);
        let item = fresh(today);
        assert_eq!(item.stage, 1);
        assert_eq!(item.created_at, today);
        assert_eq!(item.next_due_date, day(2024, 6, 4));
        assert!(!item.is_archived);
        assert_eq!(item.original_duration, 30);
        assert_eq!(item.description.as_deref(), Some("irregular verbs"));
    }

    #[test]
    fn test_log_item_validation() {
        let today = day(2024, 6, 3);
        assert!(matches!(
            log_item("   ", None, Language::German, Category::Lexis, 30, today),
            Err(BookerError::EmptyTopic)
        ));
        assert!(matches!(
            log_item("Dativ", None, Language::German, Category::Lexis, 0, today),
            Err(BookerError::InvalidDuration(0))
        ));
        assert!(matches!(
            log_item("Dativ", None, Language::German, Category::Lexis, -15, today),
            Err(BookerError::InvalidDuration(-15))
        ));
    }

    #[test]
    fn test_log_item_trims_and_drops_blank_description() {
        let item = log_item("  Dativ ", Some("  "), Language::German, Category::Lexis, 10, day(2024, 1, 1))
            .unwrap();
        assert_eq!(item.topic, "Dativ");
        assert_eq!(item.description, None);
    }

    #[test]
    fn test_complete_on_time() {
        let d = day(2024, 6, 3);
        let item = fresh(d);
        let next = complete_review(&item, d.add_days(1));
        assert_eq!(next.stage, 2);
        assert_eq!(next.next_due_date, d.add_days(2));
        assert!(!next.is_archived);
    }

    #[test]
    fn test_complete_reanchors_on_completion_day() {
        let d = day(2024, 6, 3);
        let mut item = fresh(d);
        item.stage = 2;
        item.next_due_date = d.add_days(2);

        let late = complete_review(&item, d.add_days(6));
        assert_eq!(late.next_due_date, d.add_days(11));

        let early = complete_review(&item, d);
        assert_eq!(early.next_due_date, d.add_days(5));
    }

    #[test]
    fn test_completing_stage_four_graduates() {
        let d = day(2024, 6, 3);
        let mut item = fresh(d);
        item.stage = 4;
        item.next_due_date = d.add_days(14);

        let done = complete_review(&item, d.add_days(20));
        assert_eq!(done.stage, 5);
        assert!(done.is_archived);
        assert_eq!(done.next_due_date, d.add_days(14));
    }

    #[test]
    fn test_completing_out_of_range_stage_archives() {
        let d = day(2024, 6, 3);
        let mut item = fresh(d);
        item.stage = 9;
        let done = complete_review(&item, d);
        assert_eq!(done.stage, 10);
        assert!(done.is_archived);
        assert_eq!(done.next_due_date, item.next_due_date);
    }

    #[test]
    fn test_time_split() {
        assert_eq!(
            time_split(100, Category::Grammar),
            TimeSplit { main: 70, secondary: 30, has_split: true }
        );
        assert_eq!(
            time_split(100, Category::Lexis),
            TimeSplit { main: 100, secondary: 0, has_split: false }
        );
        assert_eq!(time_split(50, Category::Grammar), TimeSplit { main: 35, secondary: 15, has_split: true });
        assert_eq!(time_split(20, Category::NonVerbal).main, 20);
    }

    #[test]
    fn test_projection_of_fresh_item() {
        let d = day(2024, 6, 3);
        let entries = project_schedule(&fresh(d));

        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].kind, EntryKind::Actual);
        assert!(entries[1..].iter().all(|e| e.kind == EntryKind::Projected));
        assert_eq!(entries.last().unwrap().stage, 5);

        let deltas: Vec<i64> = entries.windows(2).map(|w| w[1].date.days_since(w[0].date)).collect();
        assert_eq!(deltas, [1, 5, 7, 11]);
        assert_eq!(entries.last().unwrap().date, d.add_days(25));
    }

    #[test]
    fn test_projection_edge_cases() {
        let d = day(2024, 6, 3);
        let mut item = fresh(d);

        item.is_archived = true;
        assert!(project_schedule(&item).is_empty());

        item.is_archived = false;
        item.stage = 42;
        let entries = project_schedule(&item);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Actual);

        item.stage = 0;
        assert_eq!(project_schedule(&item).len(), 6);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_item() -> impl Strategy<Value = ReviewItem> {
            (0u8..=8, any::<bool>(), -400i64..400, 1u32..240).prop_map(|(stage, archived, offset, minutes)| {
                let created = Day::from_ymd(2024, 1, 1).unwrap();
                let mut item =
                    log_item("topic", None, Language::French, Category::Lexis, minutes as i64, created).unwrap();
                item.stage = stage;
                item.is_archived = archived;
                item.next_due_date = created.add_days(offset);
                item
            })
        }

        proptest! {
            #[test]
            fn prop_completion_advances_exactly_one_stage(item in arb_item(), gap in -30i64..60) {
                let today = item.next_due_date.add_days(gap);
                let next = complete_review(&item, today);
                prop_assert_eq!(next.stage, item.stage + 1);
                prop_assert_eq!(&next.id, &item.id);
            }

            #[test]
            fn prop_archived_iff_terminal_after_completion(item in arb_item(), gap in 0i64..60) {
                let next = complete_review(&item, item.next_due_date.add_days(gap));
                prop_assert_eq!(next.is_archived, is_terminal(next.stage));
                if next.is_archived {
                    prop_assert_eq!(next.next_due_date, item.next_due_date);
                }
            }

            #[test]
            fn prop_projection_is_bounded_and_ascending(item in arb_item()) {
                let entries = project_schedule(&item);
                prop_assert!(entries.len() <= FINAL_STAGE as usize + 1);
                prop_assert!(entries.windows(2).all(|w| w[0].date < w[1].date));
                prop_assert!(entries.iter().all(|e| e.stage <= FINAL_STAGE || e.kind == EntryKind::Actual));
            }

            #[test]
            fn prop_time_split_sums_to_duration(minutes in 1u32..10_000) {
                for category in Category::all() {
                    let split = time_split(minutes, *category);
                    prop_assert_eq!(split.main + split.secondary, minutes);
                }
            }
        }
    }
}
