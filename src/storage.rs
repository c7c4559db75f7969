//! Storage module for saving and loading review items.
//!
//! Items are written to two independent backends: a pretty-printed JSON file
//! (the primary) and a small SQLite key-value table (the fallback). Loading
//! prefers the primary and only consults the fallback when the primary is
//! missing or unreadable.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::day::Day;
use crate::error::{BookerError, Result};
use crate::models::{ItemCollection, ReviewItem};

const ITEMS_FILE: &str = "items.json";
const DATABASE_FILE: &str = "booker.db";
const ITEMS_KEY: &str = "items";
const REMINDER_KEY: &str = "last_notification";

/// Load/save contract for the item collection.
pub trait ItemStore {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the backend holds nothing yet.
    fn load(&self) -> Result<Option<Vec<ReviewItem>>>;

    fn save(&self, items: &[ReviewItem]) -> Result<()>;
}

// ══════════════════════════════════════════════════════════════════════════
// JSON File Store
// ══════════════════════════════════════════════════════════════════════════

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ItemStore for JsonFileStore {
    fn name(&self) -> &'static str {
        "json"
    }

    fn load(&self) -> Result<Option<Vec<ReviewItem>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)?;
        let items: Vec<ReviewItem> = serde_json::from_str(&json)?;
        Ok(Some(items))
    }

    fn save(&self, items: &[ReviewItem]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(items)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════
// SQLite Key-Value Store
// ══════════════════════════════════════════════════════════════════════════

/// Key-value table holding a serialized copy of the items plus small bits
/// of app state such as the reminder marker.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// In-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, Local::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl ItemStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn load(&self) -> Result<Option<Vec<ReviewItem>>> {
        match self.get(ITEMS_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, items: &[ReviewItem]) -> Result<()> {
        let json = serde_json::to_string(items)?;
        self.set(ITEMS_KEY, &json)
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Two-Tier Store
// ══════════════════════════════════════════════════════════════════════════

/// Primary store with a fallback consulted only when the primary has nothing
/// usable.
pub struct DualStore<P, F> {
    primary: P,
    fallback: F,
}

impl<P: ItemStore, F: ItemStore> DualStore<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

impl<P: ItemStore, F: ItemStore> ItemStore for DualStore<P, F> {
    fn name(&self) -> &'static str {
        "dual"
    }

    fn load(&self) -> Result<Option<Vec<ReviewItem>>> {
        match self.primary.load() {
            Ok(Some(items)) => {
                debug!(store = self.primary.name(), count = items.len(), "loaded items");
                return Ok(Some(items));
            }
            Ok(None) => debug!(store = self.primary.name(), "primary store empty"),
            Err(e) => warn!(
                store = self.primary.name(),
                error = %e,
                "primary store unreadable, trying fallback"
            ),
        }

        let loaded = self.fallback.load()?;
        if let Some(ref items) = loaded {
            info!(store = self.fallback.name(), count = items.len(), "loaded items from fallback");
        }
        Ok(loaded)
    }

    /// Writes both backends. A fallback failure is logged, not returned.
    fn save(&self, items: &[ReviewItem]) -> Result<()> {
        let primary = self.primary.save(items);
        if let Err(e) = self.fallback.save(items) {
            warn!(store = self.fallback.name(), error = %e, "fallback save failed");
        }
        primary
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Import / Export
// ══════════════════════════════════════════════════════════════════════════

/// Human-editable text block holding the whole collection.
pub fn export_items(items: &[ReviewItem]) -> Result<String> {
    Ok(serde_json::to_string_pretty(items)?)
}

/// Parse an exported text block. The payload must be a JSON list of items.
///
/// Every item must have a non-blank topic and a positive duration; one bad
/// item rejects the whole block.
pub fn import_items(text: &str) -> Result<Vec<ReviewItem>> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(BookerError::MalformedImport)?;
    if !value.is_array() {
        return Err(BookerError::NotAList);
    }
    let items: Vec<ReviewItem> = serde_json::from_value(value).map_err(BookerError::MalformedImport)?;
    for item in &items {
        validate_imported(item)?;
    }
    Ok(items)
}

// Stage is left alone: legacy archives carry stages past the final one.
fn validate_imported(item: &ReviewItem) -> Result<()> {
    let reason = if item.topic.trim().is_empty() {
        "has a blank topic"
    } else if item.original_duration == 0 {
        "has a zero duration"
    } else {
        return Ok(());
    };
    warn!(id = %item.id, reason, "rejecting import");
    Err(BookerError::InvalidItem {
        id: item.id.clone(),
        reason,
    })
}

/// Replace the collection with the parsed text block, or leave it untouched
/// if the text is rejected.
pub fn import_into(collection: &mut ItemCollection, text: &str) -> Result<usize> {
    let items = import_items(text)?;
    let count = items.len();
    collection.replace_all(items);
    Ok(count)
}

// ══════════════════════════════════════════════════════════════════════════
// App Storage
// ══════════════════════════════════════════════════════════════════════════

/// Everything Booker keeps on disk, rooted at one data directory.
pub struct BookerStorage {
    data_dir: PathBuf,
    items: DualStore<JsonFileStore, SqliteStore>,
}

impl BookerStorage {
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir)?;

        let primary = JsonFileStore::new(data_dir.join(ITEMS_FILE));
        let fallback = SqliteStore::open(&data_dir.join(DATABASE_FILE))?;
        debug!(dir = %data_dir.display(), "opened storage");

        Ok(Self {
            data_dir,
            items: DualStore::new(primary, fallback),
        })
    }

    /// Get default storage location.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("booker")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("booker.log")
    }

    /// Load the collection; an empty collection when nothing is stored yet.
    pub fn load(&self) -> Result<ItemCollection> {
        let items = self.items.load()?.unwrap_or_default();
        Ok(ItemCollection::new(items))
    }

    pub fn save(&self, collection: &ItemCollection) -> Result<()> {
        self.items.save(collection.items())?;
        debug!(count = collection.len(), "saved items");
        Ok(())
    }

    /// Day the daily reminder last fired, if ever.
    pub fn last_reminder(&self) -> Result<Option<Day>> {
        Ok(self
            .items
            .fallback()
            .get(REMINDER_KEY)?
            .and_then(|key| crate::day::parse_day(&key)))
    }

    pub fn set_last_reminder(&self, day: Day) -> Result<()> {
        self.items.fallback().set(REMINDER_KEY, &day.key())
    }

    /// Write the export text block to a file.
    pub fn export_to(&self, path: &Path, collection: &ItemCollection) -> Result<usize> {
        let text = export_items(collection.items())?;
        fs::write(path, text)?;
        info!(path = %path.display(), count = collection.len(), "exported items");
        Ok(collection.len())
    }

    /// Read a text block from a file and replace the collection with it.
    pub fn import_from(&self, path: &Path, collection: &mut ItemCollection) -> Result<usize> {
        let text = fs::read_to_string(path)?;
        let count = import_into(collection, &text)?;
        info!(path = %path.display(), count, "imported items");
        Ok(count)
    }

    /// Get default export path.
    pub fn default_export_path() -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!("booker_export_{}.json", timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Language};
    use crate::schedule::{complete_review, log_item};
    use tempfile::TempDir;

    fn day(y: i32, m: u32, d: u32) -> Day {
        Day::from_ymd(y, m, d).unwrap()
    }

    fn sample_items() -> Vec<ReviewItem> {
        let d = day(2024, 6, 3);
        let a = log_item("Subjuntivo", Some("triggers"), Language::Spanish, Category::Grammar, 30, d).unwrap();
        let b = log_item("Food words", None, Language::Italian, Category::Lexis, 15, d).unwrap();
        let c = complete_review(&b, d.add_days(1));
        vec![a, c]
    }

    fn create_test_storage() -> (BookerStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = BookerStorage::open(temp_dir.path().to_path_buf()).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_json_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("nested").join("items.json"));
        assert!(store.load().unwrap().is_none());

        let items = sample_items();
        store.save(&items).unwrap();
        assert_eq!(store.load().unwrap(), Some(items));
    }

    #[test]
    fn test_sqlite_store_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load().unwrap().is_none());

        let items = sample_items();
        store.save(&items).unwrap();
        store.save(&items).unwrap();
        assert_eq!(store.load().unwrap(), Some(items));
    }

    #[test]
    fn test_dual_store_prefers_primary() {
        let temp_dir = TempDir::new().unwrap();
        let primary = JsonFileStore::new(temp_dir.path().join("items.json"));
        let fallback = SqliteStore::in_memory().unwrap();

        let items = sample_items();
        primary.save(&items[..1]).unwrap();
        fallback.save(&items).unwrap();

        let dual = DualStore::new(primary, fallback);
        assert_eq!(dual.load().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_dual_store_falls_back_when_primary_missing_or_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("items.json");
        let fallback = SqliteStore::in_memory().unwrap();
        let items = sample_items();
        fallback.save(&items).unwrap();

        let dual = DualStore::new(JsonFileStore::new(path.clone()), fallback);
        assert_eq!(dual.load().unwrap(), Some(items.clone()));

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(dual.load().unwrap(), Some(items));
    }

    #[test]
    fn test_dual_store_save_writes_both() {
        let temp_dir = TempDir::new().unwrap();
        let dual = DualStore::new(
            JsonFileStore::new(temp_dir.path().join("items.json")),
            SqliteStore::in_memory().unwrap(),
        );
        let items = sample_items();
        dual.save(&items).unwrap();

        assert_eq!(dual.primary().load().unwrap(), Some(items.clone()));
        assert_eq!(dual.fallback().load().unwrap(), Some(items));
    }

    #[test]
    fn test_storage_load_empty_and_reminder_marker() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.load().unwrap().is_empty());
        assert_eq!(storage.last_reminder().unwrap(), None);

        storage.set_last_reminder(day(2024, 6, 3)).unwrap();
        assert_eq!(storage.last_reminder().unwrap(), Some(day(2024, 6, 3)));
    }

    #[test]
    fn test_storage_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let collection = ItemCollection::new(sample_items());
        {
            let storage = BookerStorage::open(temp_dir.path().to_path_buf()).unwrap();
            storage.save(&collection).unwrap();
        }
        let reopened = BookerStorage::open(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.load().unwrap(), collection);
    }

    #[test]
    fn test_import_rejects_non_list() {
        let mut collection = ItemCollection::new(sample_items());
        let before = collection.clone();

        assert!(matches!(
            import_into(&mut collection, r#"{"items": []}"#),
            Err(BookerError::NotAList)
        ));
        assert!(matches!(
            import_into(&mut collection, "definitely not json"),
            Err(BookerError::MalformedImport(_))
        ));
        assert!(matches!(
            import_into(&mut collection, r#"[{"id": "x"}]"#),
            Err(BookerError::MalformedImport(_))
        ));
        assert_eq!(collection, before);
    }

    #[test]
    fn test_import_rejects_unschedulable_items() {
        let mut collection = ItemCollection::new(sample_items());
        let before = collection.clone();

        let blank_topic = r#"[{"id":"x","topic":"  ","language":"English","category":"Lexis",
            "originalDuration":0,"createdAt":"2024-06-03","nextDueDate":"2024-06-04",
            "stage":1,"isArchived":false}]"#;
        assert!(matches!(
            import_into(&mut collection, blank_topic),
            Err(BookerError::InvalidItem { ref id, .. }) if id == "x"
        ));

        let mut items = sample_items();
        items[1].original_duration = 0;
        let zero_duration = export_items(&items).unwrap();
        assert!(matches!(
            import_into(&mut collection, &zero_duration),
            Err(BookerError::InvalidItem { .. })
        ));
        assert_eq!(collection, before);

        // Archived legacy items past the final stage still import.
        let mut items = sample_items();
        items[0].stage = 7;
        items[0].is_archived = true;
        let legacy = export_items(&items).unwrap();
        assert_eq!(import_into(&mut collection, &legacy).unwrap(), 2);
    }

    #[test]
    fn test_export_import_replaces_whole_collection() {
        let items = sample_items();
        let text = export_items(&items).unwrap();

        let mut collection = ItemCollection::new(sample_items()[..1].to_vec());
        assert_eq!(import_into(&mut collection, &text).unwrap(), 2);
        assert_eq!(collection.items(), items.as_slice());

        assert_eq!(import_into(&mut collection, "[]").unwrap(), 0);
        assert!(collection.is_empty());
    }

    #[test]
    fn test_export_and_import_files() {
        let (storage, temp) = create_test_storage();
        let collection = ItemCollection::new(sample_items());
        let path = temp.path().join("export.json");

        assert_eq!(storage.export_to(&path, &collection).unwrap(), 2);

        let mut restored = ItemCollection::default();
        storage.import_from(&path, &mut restored).unwrap();
        assert_eq!(restored, collection);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_language() -> impl Strategy<Value = Language> {
            prop::sample::select(Language::all().to_vec())
        }

        fn arb_category() -> impl Strategy<Value = Category> {
            prop::sample::select(Category::all().to_vec())
        }

        fn arb_item() -> impl Strategy<Value = ReviewItem> {
            (
                "[a-zA-Z0-9][a-zA-Z0-9 ]{0,23}",
                prop::option::of(".{0,40}"),
                arb_language(),
                arb_category(),
                1u32..600,
                -2000i64..2000,
                0i64..40,
                0u8..=6,
                any::<bool>(),
            )
                .prop_map(|(topic, description, language, category, minutes, created, gap, stage, archived)| {
                    let created_at = day(2024, 1, 1).add_days(created);
                    ReviewItem {
                        id: uuid::Uuid::new_v4().to_string(),
                        topic,
                        description,
                        language,
                        category,
                        original_duration: minutes,
                        created_at,
                        next_due_date: created_at.add_days(gap),
                        stage,
                        is_archived: archived,
                    }
                })
        }

        proptest! {
            #[test]
            fn prop_save_then_load_is_lossless(items in prop::collection::vec(arb_item(), 0..12)) {
                let store = SqliteStore::in_memory().unwrap();
                store.save(&items).unwrap();
                prop_assert_eq!(store.load().unwrap(), Some(items.clone()));

                let text = export_items(&items).unwrap();
                prop_assert_eq!(import_items(&text).unwrap(), items);
            }
        }
    }
}
