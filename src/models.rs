//! Data models for review items and the item collection.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::day::Day;
use crate::error::{BookerError, Result};
use crate::schedule;

/// Language an item was studied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(alias = "Angielski")]
    English,
    #[serde(alias = "Hiszpański")]
    Spanish,
    #[serde(alias = "Niemiecki")]
    German,
    #[serde(alias = "Francuski")]
    French,
    #[serde(alias = "Włoski")]
    Italian,
    #[serde(alias = "Inny")]
    Other,
}

impl Language {
    pub fn all() -> &'static [Language] {
        &[
            Self::English,
            Self::Spanish,
            Self::German,
            Self::French,
            Self::Italian,
            Self::Other,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Spanish => "Spanish",
            Self::German => "German",
            Self::French => "French",
            Self::Italian => "Italian",
            Self::Other => "Other",
        }
    }

    /// Two-letter abbreviation for compact rows.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "EN",
            Self::Spanish => "ES",
            Self::German => "DE",
            Self::French => "FR",
            Self::Italian => "IT",
            Self::Other => "??",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Self::English => Self::Spanish,
            Self::Spanish => Self::German,
            Self::German => Self::French,
            Self::French => Self::Italian,
            Self::Italian => Self::Other,
            Self::Other => Self::English,
        }
    }
}

impl FromStr for Language {
    type Err = BookerError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|lang| lang.name().to_lowercase() == wanted || lang.code().to_lowercase() == wanted)
            .ok_or_else(|| BookerError::UnknownTag {
                kind: "language",
                value: s.to_string(),
            })
    }
}

/// Kind of material an item covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(alias = "Gramatyka")]
    Grammar,
    #[serde(alias = "Leksyka")]
    Lexis,
    #[serde(alias = "Niewerbalność")]
    NonVerbal,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[Self::Grammar, Self::Lexis, Self::NonVerbal]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Grammar => "Grammar",
            Self::Lexis => "Lexis",
            Self::NonVerbal => "Non-verbal",
        }
    }

    /// Grammar sessions set part of their time aside for fluency drilling.
    pub fn has_fluency_split(&self) -> bool {
        matches!(self, Self::Grammar)
    }

    pub fn next(&self) -> Self {
        match self {
            Self::Grammar => Self::Lexis,
            Self::Lexis => Self::NonVerbal,
            Self::NonVerbal => Self::Grammar,
        }
    }
}

impl FromStr for Category {
    type Err = BookerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "grammar" => Ok(Self::Grammar),
            "lexis" | "vocabulary" => Ok(Self::Lexis),
            "nonverbal" => Ok(Self::NonVerbal),
            _ => Err(BookerError::UnknownTag {
                kind: "category",
                value: s.to_string(),
            }),
        }
    }
}

/// Study-time presets offered when logging a session, in minutes.
pub const DURATION_PRESETS: [u32; 7] = [10, 15, 20, 30, 60, 90, 120];

/// Short label for a duration: "15 min", "1h", "1.5h".
///
/// Anything not on a half-hour boundary falls back to exact hours and minutes.
pub fn duration_label(minutes: u32) -> String {
    if minutes < 60 {
        format!("{} min", minutes)
    } else if minutes % 60 == 0 {
        format!("{}h", minutes / 60)
    } else if minutes % 30 == 0 {
        format!("{}.5h", minutes / 60)
    } else {
        crate::daily::format_minutes(u64::from(minutes))
    }
}

/// One learning artifact under spaced repetition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub id: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub language: Language,
    #[serde(alias = "tag")]
    pub category: Category,
    pub original_duration: u32,
    pub created_at: Day,
    pub next_due_date: Day,
    pub stage: u8,
    pub is_archived: bool,
}

impl ReviewItem {
    /// Due or overdue as of `today`.
    pub fn is_due_on(&self, today: Day) -> bool {
        !self.is_archived && self.next_due_date <= today
    }

    pub fn is_overdue_on(&self, today: Day) -> bool {
        !self.is_archived && self.next_due_date < today
    }

    pub fn stage_label(&self) -> String {
        stage_label(self.stage)
    }
}

pub fn stage_label(stage: u8) -> String {
    match stage {
        0 => "New".to_string(),
        s if s >= schedule::FINAL_STAGE => format!("Review {} (final)", schedule::FINAL_STAGE),
        s => format!("Review {}", s),
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Item Collection
// ══════════════════════════════════════════════════════════════════════════

/// The learner's items, keyed by id.
///
/// Changes replace whole items; nothing hands out mutable references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCollection {
    items: Vec<ReviewItem>,
}

impl ItemCollection {
    pub fn new(items: Vec<ReviewItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[ReviewItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ReviewItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn add(&mut self, item: ReviewItem) {
        info!(id = %item.id, topic = %item.topic, due = %item.next_due_date, "logged item");
        self.items.push(item);
    }

    /// Mark the item complete on `today` and return its new state.
    pub fn complete(&mut self, id: &str, today: Day) -> Result<&ReviewItem> {
        let idx = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| BookerError::NotFound(id.to_string()))?;

        let updated = schedule::complete_review(&self.items[idx], today);
        info!(
            id,
            stage = updated.stage,
            archived = updated.is_archived,
            due = %updated.next_due_date,
            "completed review"
        );
        self.items[idx] = updated;
        Ok(&self.items[idx])
    }

    pub fn remove(&mut self, id: &str) -> Result<ReviewItem> {
        let idx = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| BookerError::NotFound(id.to_string()))?;
        info!(id, "deleted item");
        Ok(self.items.remove(idx))
    }

    /// Swap in an entirely new set of items.
    pub fn replace_all(&mut self, items: Vec<ReviewItem>) {
        info!(count = items.len(), "replaced collection");
        self.items = items;
    }

    /// Unarchived items ordered by due date.
    pub fn active(&self) -> Vec<&ReviewItem> {
        let mut active: Vec<&ReviewItem> = self.items.iter().filter(|i| !i.is_archived).collect();
        active.sort_by_key(|item| item.next_due_date);
        active
    }

    /// Archived items, most recently created first.
    pub fn archived(&self) -> Vec<&ReviewItem> {
        let mut archived: Vec<&ReviewItem> = self.items.iter().filter(|i| i.is_archived).collect();
        archived.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        archived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::log_item;

    fn day(y: i32, m: u32, d: u32) -> Day {
        Day::from_ymd(y, m, d).unwrap()
    }

    fn sample(topic: &str, today: Day) -> ReviewItem {
        log_item(topic, None, Language::Spanish, Category::Lexis, 20, today).unwrap()
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("german".parse::<Language>().unwrap(), Language::German);
        assert_eq!("IT".parse::<Language>().unwrap(), Language::Italian);
        assert!(matches!(
            "klingon".parse::<Language>(),
            Err(BookerError::UnknownTag { kind: "language", .. })
        ));
    }

    #[test]
    fn test_category_parsing_and_split_rule() {
        assert_eq!("non-verbal".parse::<Category>().unwrap(), Category::NonVerbal);
        assert_eq!("Grammar".parse::<Category>().unwrap(), Category::Grammar);
        assert!("poetry".parse::<Category>().is_err());
        assert!(Category::Grammar.has_fluency_split());
        assert!(!Category::Lexis.has_fluency_split());
        assert!(!Category::NonVerbal.has_fluency_split());
    }

    #[test]
    fn test_cycles_visit_every_variant() {
        let mut lang = Language::English;
        for _ in 0..Language::all().len() {
            lang = lang.next();
        }
        assert_eq!(lang, Language::English);
        assert_eq!(Category::NonVerbal.next(), Category::Grammar);
    }

    #[test]
    fn test_duration_labels() {
        assert_eq!(duration_label(15), "15 min");
        assert_eq!(duration_label(60), "1h");
        assert_eq!(duration_label(90), "1.5h");
        assert_eq!(duration_label(120), "2h");
        assert_eq!(duration_label(150), "2.5h");
        // Off-preset values stay exact.
        assert_eq!(duration_label(61), "1h 1m");
        assert_eq!(duration_label(100), "1h 40m");
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(stage_label(0), "New");
        assert_eq!(stage_label(3), "Review 3");
        assert_eq!(stage_label(5), "Review 5 (final)");
    }

    #[test]
    fn test_legacy_item_json_is_accepted() {
        let json = r#"{
            "id": "abc",
            "topic": "Subjuntivo",
            "language": "Hiszpański",
            "originalDuration": 30,
            "tag": "Gramatyka",
            "createdAt": 1717365600000,
            "nextDueDate": "2024-06-04",
            "stage": 1,
            "isArchived": false
        }"#;
        let item: ReviewItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.language, Language::Spanish);
        assert_eq!(item.category, Category::Grammar);
        assert_eq!(item.description, None);
        assert_eq!(item.next_due_date, day(2024, 6, 4));
    }

    #[test]
    fn test_collection_complete_and_remove() {
        let today = day(2024, 6, 3);
        let mut items = ItemCollection::default();
        let item = sample("Ser vs estar", today);
        let id = item.id.clone();
        items.add(item);

        let updated = items.complete(&id, today.add_days(1)).unwrap();
        assert_eq!(updated.stage, 2);
        assert_eq!(updated.next_due_date, today.add_days(2));

        assert!(matches!(items.complete("missing", today), Err(BookerError::NotFound(_))));
        assert_eq!(items.remove(&id).unwrap().id, id);
        assert!(items.is_empty());
    }

    #[test]
    fn test_active_and_archived_ordering() {
        let today = day(2024, 6, 3);
        let mut early = sample("early", today.add_days(-3));
        early.next_due_date = today.add_days(-1);
        let late = sample("late", today);
        let mut done_old = sample("done old", today.add_days(-40));
        done_old.is_archived = true;
        let mut done_new = sample("done new", today.add_days(-30));
        done_new.is_archived = true;

        let items = ItemCollection::new(vec![late, done_old, early, done_new]);
        let active: Vec<&str> = items.active().iter().map(|i| i.topic.as_str()).collect();
        assert_eq!(active, ["early", "late"]);
        let archived: Vec<&str> = items.archived().iter().map(|i| i.topic.as_str()).collect();
        assert_eq!(archived, ["done new", "done old"]);
    }
}
