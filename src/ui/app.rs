//! Main application state and logic.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{block::BorderType, Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};
use tracing::{info, warn};

use super::theme::{icons, Theme};
use super::widgets::{item_line, ItemDetails, KeyHints, Logo, TodayBanner};
use crate::config::Config;
use crate::daily::{calendar_lookup, daily_stats, group_by_effective_date, AgendaFilter};
use crate::day::{Day, SimClock};
use crate::error::BookerError;
use crate::models::{duration_label, stage_label, Category, ItemCollection, Language, DURATION_PRESETS};
use crate::notify::{send_report, DailyReminder, Notifier, Permission, QueueNotifier, ReminderOutcome};
use crate::schedule::{log_item, EntryKind};
use crate::storage::{export_items, BookerStorage};

// ══════════════════════════════════════════════════════════════════════════
// Application State
// ══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Schedule,
    AddItem,
    Agenda,
    Archive,
    Data,
    Testing,
}

impl Screen {
    const TABS: [Screen; 6] = [
        Screen::Schedule,
        Screen::AddItem,
        Screen::Agenda,
        Screen::Archive,
        Screen::Data,
        Screen::Testing,
    ];

    fn title(&self) -> &'static str {
        match self {
            Screen::Schedule => "Schedule",
            Screen::AddItem => "Log session",
            Screen::Agenda => "Agenda",
            Screen::Archive => "Archive",
            Screen::Data => "Data",
            Screen::Testing => "Testing",
        }
    }

    fn index(&self) -> usize {
        Self::TABS.iter().position(|s| s == self).unwrap_or(0)
    }

    fn next(&self) -> Self {
        Self::TABS[(self.index() + 1) % Self::TABS.len()]
    }

    fn prev(&self) -> Self {
        Self::TABS[(self.index() + Self::TABS.len() - 1) % Self::TABS.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Topic,
    Description,
    Language,
    Category,
    Duration,
}

impl FormField {
    fn next(&self) -> Self {
        match self {
            Self::Topic => Self::Description,
            Self::Description => Self::Language,
            Self::Language => Self::Category,
            Self::Category => Self::Duration,
            Self::Duration => Self::Topic,
        }
    }

    fn prev(&self) -> Self {
        match self {
            Self::Topic => Self::Duration,
            Self::Description => Self::Topic,
            Self::Language => Self::Description,
            Self::Category => Self::Language,
            Self::Duration => Self::Category,
        }
    }
}

/// Input for a new study session.
#[derive(Debug, Clone)]
pub struct ItemForm {
    pub topic: String,
    pub description: String,
    pub language: Language,
    pub category: Category,
    pub duration_idx: usize,
    focus: FormField,
}

impl ItemForm {
    fn from_config(config: &Config) -> Self {
        let duration_idx = DURATION_PRESETS
            .iter()
            .position(|m| *m == config.default_duration)
            .unwrap_or(3);
        Self {
            topic: String::new(),
            description: String::new(),
            language: config.default_language,
            category: config.default_category,
            duration_idx,
            focus: FormField::Topic,
        }
    }

    pub fn duration(&self) -> u32 {
        DURATION_PRESETS[self.duration_idx % DURATION_PRESETS.len()]
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            FormField::Topic => Some(&mut self.topic),
            FormField::Description => Some(&mut self.description),
            _ => None,
        }
    }

    fn cycle(&mut self, forward: bool) {
        let len = DURATION_PRESETS.len();
        match self.focus {
            FormField::Language => {
                self.language = if forward {
                    self.language.next()
                } else {
                    // Walk forward len-1 times to step back one.
                    (1..Language::all().len()).fold(self.language, |l, _| l.next())
                };
            }
            FormField::Category => {
                self.category = if forward {
                    self.category.next()
                } else {
                    self.category.next().next()
                };
            }
            FormField::Duration => {
                self.duration_idx = if forward {
                    (self.duration_idx + 1) % len
                } else {
                    (self.duration_idx + len - 1) % len
                };
            }
            FormField::Topic | FormField::Description => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScheduleRow {
    Header(Day),
    Item { id: String, bucket: Day },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusKind {
    Info,
    Warning,
    Error,
}

pub struct App {
    pub screen: Screen,
    pub running: bool,

    // Config and theme
    pub config: Config,
    pub theme: Theme,

    // Storage and items
    pub storage: BookerStorage,
    pub items: ItemCollection,

    // Effective "today"
    pub clock: SimClock,

    // Reminders
    notifier: QueueNotifier,
    reminder: DailyReminder,
    last_reminder_check: Instant,

    // Schedule and archive lists
    schedule_state: ListState,
    archive_state: ListState,
    delete_pending: bool,

    // Add item form
    pub form: ItemForm,

    // Agenda
    agenda_filter: AgendaFilter,
    agenda_scroll: u16,

    // Data import/export
    pub import_path: String,
    editing_import_path: bool,
    export_scroll: u16,

    // Status message (shown temporarily)
    status_message: Option<(String, Instant, StatusKind)>,
}

impl App {
    pub fn new(storage: BookerStorage, config: Config, clock: SimClock) -> Self {
        let theme = Theme::from_name(&config.theme);
        let mut status_message = None;

        let items = match storage.load() {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "could not load saved items");
                status_message = Some((
                    format!("Could not load saved items: {}", e),
                    Instant::now(),
                    StatusKind::Error,
                ));
                ItemCollection::default()
            }
        };

        let last_fired = storage.last_reminder().unwrap_or_else(|e| {
            warn!(error = %e, "could not read reminder marker");
            None
        });

        let mut app = Self {
            screen: Screen::Schedule,
            running: true,
            notifier: QueueNotifier::from_enabled(config.notifications),
            reminder: DailyReminder::new(last_fired),
            last_reminder_check: Instant::now(),
            form: ItemForm::from_config(&config),
            config,
            theme,
            storage,
            items,
            clock,
            schedule_state: ListState::default(),
            archive_state: ListState::default(),
            delete_pending: false,
            agenda_filter: AgendaFilter::default(),
            agenda_scroll: 0,
            import_path: String::new(),
            editing_import_path: false,
            export_scroll: 0,
            status_message,
        };
        app.clamp_selections();
        app.run_reminder_check();
        app
    }

    pub fn today(&self) -> Day {
        self.clock.today()
    }

    fn set_status(&mut self, message: String) {
        self.status_message = Some((message, Instant::now(), StatusKind::Info));
    }

    fn set_warning(&mut self, message: String) {
        self.status_message = Some((message, Instant::now(), StatusKind::Warning));
    }

    fn set_error(&mut self, context: &str, error: &BookerError) {
        let kind = if error.is_user_error() {
            StatusKind::Warning
        } else {
            StatusKind::Error
        };
        self.status_message = Some((format!("{}: {}", context, error), Instant::now(), kind));
    }

    pub fn cycle_theme(&mut self) {
        let new_theme_name = self.theme.name.next();
        self.theme = Theme::new(new_theme_name);
        self.config.theme = new_theme_name.as_str().to_string();
        if let Err(e) = self.config.save() {
            warn!(error = %e, "could not save config");
        }
        self.set_status(format!("Theme: {}", new_theme_name.display_name()));
    }

    fn persist(&mut self) {
        if let Err(e) = self.storage.save(&self.items) {
            warn!(error = %e, "save failed");
            self.set_error("Save failed", &e);
        }
    }

    /// Persist, re-run the reminder check and fix up list selections.
    fn after_change(&mut self) {
        self.persist();
        self.run_reminder_check();
        self.clamp_selections();
    }

    // ══════════════════════════════════════════════════════════════════════
    // Reminders
    // ══════════════════════════════════════════════════════════════════════

    fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.config.reminder_interval_minutes.max(1).saturating_mul(60))
    }

    pub fn run_reminder_check(&mut self) {
        self.last_reminder_check = Instant::now();
        let today = self.today();

        if let ReminderOutcome::Sent(stats) = self.reminder.check(self.items.items(), today, &mut self.notifier) {
            info!(day = %today, count = stats.count, "daily reminder sent");
            if let Err(e) = self.storage.set_last_reminder(today) {
                warn!(error = %e, "could not store reminder marker");
            }
        }
        self.show_notices();
    }

    fn show_notices(&mut self) {
        for notice in self.notifier.drain() {
            let body = notice.body.replace('\n', " · ");
            self.set_status(format!("{} {}: {}", icons::BELL, notice.title, body));
        }
    }

    pub fn request_permission(&mut self) {
        let permission = self.notifier.request_permission();
        self.config.notifications = permission == Permission::Granted;
        if let Err(e) = self.config.save() {
            warn!(error = %e, "could not save config");
        }
        self.set_status(format!("Notifications: {}", permission.name()));
        self.run_reminder_check();
    }

    pub fn block_notifications(&mut self) {
        self.notifier.deny();
        self.config.notifications = false;
        if let Err(e) = self.config.save() {
            warn!(error = %e, "could not save config");
        }
        self.set_status(format!("Notifications: {}", self.notifier.permission().name()));
    }

    pub fn send_test_notification(&mut self) {
        if self.notifier.permission() != Permission::Granted {
            self.set_warning("Enable notifications first (p)".to_string());
            return;
        }
        let today = self.today();
        send_report(self.items.items(), today, &mut self.notifier);
        self.show_notices();
    }

    pub fn advance_day(&mut self) {
        self.clock.advance_day();
        self.set_status(format!("Simulating {} (+{} days)", self.today(), self.clock.offset()));
        self.run_reminder_check();
        self.clamp_selections();
    }

    pub fn reset_date(&mut self) {
        self.clock.reset();
        self.set_status(format!("Back to the real date: {}", self.today()));
        self.run_reminder_check();
        self.clamp_selections();
    }

    // ══════════════════════════════════════════════════════════════════════
    // Schedule
    // ══════════════════════════════════════════════════════════════════════

    fn schedule_rows(&self) -> Vec<ScheduleRow> {
        let mut rows = Vec::new();
        for (bucket, items) in group_by_effective_date(self.items.items(), self.today()) {
            rows.push(ScheduleRow::Header(bucket));
            rows.extend(items.into_iter().map(|item| ScheduleRow::Item {
                id: item.id.clone(),
                bucket,
            }));
        }
        rows
    }

    fn selected_schedule_row(&self) -> Option<ScheduleRow> {
        let idx = self.schedule_state.selected()?;
        self.schedule_rows().into_iter().nth(idx)
    }

    fn select_first_schedule_item(&mut self) {
        let first = self
            .schedule_rows()
            .iter()
            .position(|row| matches!(row, ScheduleRow::Item { .. }));
        self.schedule_state.select(first);
    }

    /// Move the selection to the next item row in `step` direction, skipping headers.
    fn move_schedule_selection(&mut self, step: isize) {
        self.delete_pending = false;
        let rows = self.schedule_rows();
        let items: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| matches!(row, ScheduleRow::Item { .. }))
            .map(|(i, _)| i)
            .collect();
        if items.is_empty() {
            self.schedule_state.select(None);
            return;
        }

        let current = self
            .schedule_state
            .selected()
            .and_then(|sel| items.iter().position(|i| *i == sel))
            .unwrap_or(0) as isize;
        let len = items.len() as isize;
        let next = (current + step).rem_euclid(len) as usize;
        self.schedule_state.select(Some(items[next]));
    }

    fn clamp_selections(&mut self) {
        let rows = self.schedule_rows();
        let valid = self
            .schedule_state
            .selected()
            .and_then(|i| rows.get(i))
            .is_some_and(|row| matches!(row, ScheduleRow::Item { .. }));
        if !valid {
            self.select_first_schedule_item();
        }

        let archived = self.items.archived().len();
        match self.archive_state.selected() {
            _ if archived == 0 => self.archive_state.select(None),
            Some(i) if i >= archived => self.archive_state.select(Some(archived - 1)),
            None => self.archive_state.select(Some(0)),
            _ => {}
        }
    }

    pub fn complete_selected(&mut self) {
        let today = self.today();
        let Some(ScheduleRow::Item { id, bucket }) = self.selected_schedule_row() else {
            return;
        };
        if bucket > today {
            self.set_warning(format!("Not due yet: opens {}", bucket.relative_label(today)));
            return;
        }

        let message = match self.items.complete(&id, today) {
            Ok(item) if item.is_archived => format!("{} '{}' graduated to the archive", icons::CHECK, item.topic),
            Ok(item) => format!(
                "{} '{}' is now at {}, next review {}",
                icons::CHECK,
                item.topic,
                item.stage_label(),
                item.next_due_date.relative_label(today)
            ),
            Err(e) => {
                self.set_error("Could not complete review", &e);
                return;
            }
        };
        self.set_status(message);
        self.after_change();
    }

    pub fn delete_selected(&mut self) {
        let Some(ScheduleRow::Item { id, .. }) = self.selected_schedule_row() else {
            return;
        };
        if !self.delete_pending {
            self.delete_pending = true;
            return;
        }
        self.delete_pending = false;

        match self.items.remove(&id) {
            Ok(item) => {
                self.set_status(format!("Deleted '{}'", item.topic));
                self.after_change();
            }
            Err(e) => self.set_error("Delete failed", &e),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Add Item
    // ══════════════════════════════════════════════════════════════════════

    pub fn submit_form(&mut self) {
        let today = self.today();
        let description = Some(self.form.description.as_str());
        let result = log_item(
            &self.form.topic,
            description,
            self.form.language,
            self.form.category,
            i64::from(self.form.duration()),
            today,
        );

        match result {
            Ok(item) => {
                self.set_status(format!(
                    "Logged '{}', first review {}",
                    item.topic,
                    item.next_due_date.relative_label(today)
                ));
                self.items.add(item);
                self.form.topic.clear();
                self.form.description.clear();
                self.form.focus = FormField::Topic;
                self.after_change();
            }
            Err(e) => self.set_error("Cannot log session", &e),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Data
    // ══════════════════════════════════════════════════════════════════════

    pub fn export_data(&mut self) {
        let path = BookerStorage::default_export_path();
        match self.storage.export_to(&path, &self.items) {
            Ok(count) => self.set_status(format!("Exported {} items to {}", count, path.display())),
            Err(e) => self.set_error("Export failed", &e),
        }
    }

    pub fn import_data(&mut self) {
        let path = PathBuf::from(self.import_path.trim());
        if path.as_os_str().is_empty() {
            self.set_warning("Type the path of an export file first".to_string());
            return;
        }

        match self.storage.import_from(&path, &mut self.items) {
            Ok(count) => {
                self.set_status(format!("Imported {} items", count));
                self.import_path.clear();
                self.after_change();
            }
            Err(e) => self.set_error("Import failed", &e),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Event Handling
    // ══════════════════════════════════════════════════════════════════════

    pub fn handle_events(&mut self) -> anyhow::Result<()> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key.code);
                }
            }
        }

        if self.last_reminder_check.elapsed() >= self.reminder_interval() {
            self.run_reminder_check();
        }
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        match self.screen {
            Screen::Schedule => self.handle_schedule_keys(key),
            Screen::AddItem => self.handle_add_item_keys(key),
            Screen::Agenda => self.handle_agenda_keys(key),
            Screen::Archive => self.handle_archive_keys(key),
            Screen::Data => self.handle_data_keys(key),
            Screen::Testing => self.handle_testing_keys(key),
        }
    }

    /// Keys shared by every screen that is not capturing text.
    fn handle_global_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Esc => self.screen = Screen::Schedule,
            KeyCode::Tab => self.screen = self.screen.next(),
            KeyCode::BackTab => self.screen = self.screen.prev(),
            KeyCode::Char('t') => self.cycle_theme(),
            KeyCode::Char('a') => self.screen = Screen::AddItem,
            _ => {}
        }
    }

    fn handle_schedule_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Up | KeyCode::Char('k') => self.move_schedule_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_schedule_selection(1),
            KeyCode::Enter | KeyCode::Char('c') => {
                self.delete_pending = false;
                self.complete_selected();
            }
            KeyCode::Char('d') => self.delete_selected(),
            KeyCode::Esc => self.delete_pending = false,
            other => {
                self.delete_pending = false;
                self.handle_global_keys(other);
            }
        }
    }

    fn handle_add_item_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => self.screen = Screen::Schedule,
            KeyCode::Tab | KeyCode::Down => self.form.focus = self.form.focus.next(),
            KeyCode::BackTab | KeyCode::Up => self.form.focus = self.form.focus.prev(),
            KeyCode::Left => self.form.cycle(false),
            KeyCode::Right => self.form.cycle(true),
            KeyCode::Enter => {
                if self.form.focus == FormField::Topic {
                    self.form.focus = FormField::Description;
                } else {
                    self.submit_form();
                }
            }
            KeyCode::Char(c) => {
                if let Some(text) = self.form.text_mut() {
                    text.push(c);
                } else if c == ' ' {
                    self.form.cycle(true);
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = self.form.text_mut() {
                    text.pop();
                }
            }
            _ => {}
        }
    }

    fn handle_agenda_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Up | KeyCode::Char('k') => self.agenda_scroll = self.agenda_scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.agenda_scroll = self.agenda_scroll.saturating_add(1),
            KeyCode::Char('l') => {
                self.agenda_filter.language = cycle_language_filter(self.agenda_filter.language);
                self.agenda_scroll = 0;
            }
            KeyCode::Char('c') => {
                self.agenda_filter.category = cycle_category_filter(self.agenda_filter.category);
                self.agenda_scroll = 0;
            }
            other => self.handle_global_keys(other),
        }
    }

    fn handle_archive_keys(&mut self, key: KeyCode) {
        let len = self.items.archived().len();
        match key {
            KeyCode::Up | KeyCode::Char('k') if len > 0 => {
                let i = self.archive_state.selected().unwrap_or(0);
                self.archive_state.select(Some(if i == 0 { len - 1 } else { i - 1 }));
            }
            KeyCode::Down | KeyCode::Char('j') if len > 0 => {
                let i = self.archive_state.selected().unwrap_or(0);
                self.archive_state.select(Some(if i + 1 >= len { 0 } else { i + 1 }));
            }
            other => self.handle_global_keys(other),
        }
    }

    fn handle_data_keys(&mut self, key: KeyCode) {
        if self.editing_import_path {
            match key {
                KeyCode::Esc => self.editing_import_path = false,
                KeyCode::Enter => {
                    self.editing_import_path = false;
                    self.import_data();
                }
                KeyCode::Char(c) => self.import_path.push(c),
                KeyCode::Backspace => {
                    self.import_path.pop();
                }
                _ => {}
            }
            return;
        }

        match key {
            KeyCode::Char('e') => self.export_data(),
            KeyCode::Char('i') => self.editing_import_path = true,
            KeyCode::Up | KeyCode::Char('k') => self.export_scroll = self.export_scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.export_scroll = self.export_scroll.saturating_add(1),
            other => self.handle_global_keys(other),
        }
    }

    fn handle_testing_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('+') | KeyCode::Char(']') => self.advance_day(),
            KeyCode::Char('0') => self.reset_date(),
            KeyCode::Char('p') => self.request_permission(),
            KeyCode::Char('b') => self.block_notifications(),
            KeyCode::Char('n') => self.send_test_notification(),
            other => self.handle_global_keys(other),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Rendering
    // ══════════════════════════════════════════════════════════════════════

    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();

        // Clear with background
        frame.render_widget(Clear, area);
        frame.render_widget(
            Block::default().style(Style::default().bg(self.theme.colors.bg_dark)),
            area,
        );

        let banner_height = if self.clock.is_simulated() { 1 } else { 0 };
        let chunks = Layout::vertical([
            Constraint::Length(banner_height), // Simulation banner
            Constraint::Length(3),             // Tabs
            Constraint::Min(8),                // Screen content
            Constraint::Length(1),             // Status
            Constraint::Length(2),             // Hints
        ])
        .split(area);

        if self.clock.is_simulated() {
            let banner = Paragraph::new(format!(
                "Simulation mode: {} (+{} days)",
                self.today(),
                self.clock.offset()
            ))
            .alignment(Alignment::Center)
            .style(self.theme.banner());
            frame.render_widget(banner, chunks[0]);
        }

        self.render_tabs(frame, chunks[1]);

        match self.screen {
            Screen::Schedule => self.render_schedule(frame, chunks[2]),
            Screen::AddItem => self.render_add_item(frame, chunks[2]),
            Screen::Agenda => self.render_agenda(frame, chunks[2]),
            Screen::Archive => self.render_archive(frame, chunks[2]),
            Screen::Data => self.render_data(frame, chunks[2]),
            Screen::Testing => self.render_testing(frame, chunks[2]),
        }

        self.render_status(frame, chunks[3]);
        self.render_hints(frame, chunks[4]);
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = Screen::TABS.iter().map(|s| Line::from(s.title())).collect();
        let tabs = Tabs::new(titles)
            .select(self.screen.index())
            .style(self.theme.muted())
            .highlight_style(self.theme.highlight().add_modifier(Modifier::UNDERLINED))
            .divider(Span::styled("│", self.theme.dim()))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(self.theme.colors.primary))
                    .title(format!(" {} Booker ", icons::BOOK))
                    .title_style(self.theme.title()),
            );
        frame.render_widget(tabs, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        // Show status message if recent (within 8 seconds)
        if let Some((ref msg, time, kind)) = self.status_message {
            if time.elapsed().as_secs() < 8 {
                let color = match kind {
                    StatusKind::Info => self.theme.colors.success,
                    StatusKind::Warning => self.theme.colors.warning,
                    StatusKind::Error => self.theme.colors.error,
                };
                let status = Paragraph::new(msg.as_str())
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(color));
                frame.render_widget(status, area);
            }
        }
    }

    fn render_hints(&self, frame: &mut Frame, area: Rect) {
        let hints: &[(&str, &str)] = match self.screen {
            Screen::Schedule if self.delete_pending => &[("d", "confirm delete"), ("any", "cancel")],
            Screen::Schedule => &[
                ("j/k", "nav"),
                ("Enter", "done"),
                ("a", "log"),
                ("d", "delete"),
                ("Tab", "next view"),
                ("t", "theme"),
                ("q", "quit"),
            ],
            Screen::AddItem => &[
                ("Tab", "next field"),
                ("←/→", "change"),
                ("Enter", "save"),
                ("Esc", "back"),
            ],
            Screen::Agenda => &[
                ("j/k", "scroll"),
                ("l", "language"),
                ("c", "category"),
                ("Tab", "next view"),
                ("q", "quit"),
            ],
            Screen::Archive => &[("j/k", "nav"), ("Tab", "next view"), ("q", "quit")],
            Screen::Data if self.editing_import_path => &[("Enter", "import"), ("Esc", "cancel")],
            Screen::Data => &[
                ("e", "export"),
                ("i", "import"),
                ("j/k", "scroll"),
                ("Tab", "next view"),
                ("q", "quit"),
            ],
            Screen::Testing => &[
                ("+", "next day"),
                ("0", "reset date"),
                ("p", "allow"),
                ("b", "block"),
                ("n", "test notification"),
                ("q", "quit"),
            ],
        };
        frame.render_widget(KeyHints::new(hints, &self.theme), area);
    }

    fn render_schedule(&mut self, frame: &mut Frame, area: Rect) {
        let today = self.today();
        let chunks = Layout::vertical([
            Constraint::Length(3), // Today banner
            Constraint::Min(5),    // Items
        ])
        .split(area);

        let stats = daily_stats(self.items.items(), today);
        frame.render_widget(TodayBanner::new(&stats, &self.theme), chunks[0]);

        let rows = self.schedule_rows();
        if rows.is_empty() {
            let empty = Layout::vertical([Constraint::Length(9), Constraint::Min(1)]).split(chunks[1]);
            frame.render_widget(Logo::new(&self.theme), empty[0]);
            let hint = Paragraph::new("No reviews scheduled. Press a to log a study session.")
                .alignment(Alignment::Center)
                .style(self.theme.muted());
            frame.render_widget(hint, empty[1]);
            return;
        }

        let main = Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).split(chunks[1]);
        let topic_width = (main[0].width as usize).saturating_sub(36).max(8);

        let list_items: Vec<ListItem> = rows
            .iter()
            .map(|row| match row {
                ScheduleRow::Header(bucket) => {
                    let style = if *bucket == today {
                        self.theme.highlight()
                    } else {
                        self.theme.muted().add_modifier(Modifier::BOLD)
                    };
                    ListItem::new(Line::from(Span::styled(bucket.relative_label(today), style)))
                }
                ScheduleRow::Item { id, .. } => match self.items.get(id) {
                    Some(item) => {
                        let mut line = item_line(item, topic_width, &self.theme);
                        line.spans.insert(0, Span::raw("  "));
                        if item.is_overdue_on(today) {
                            line.spans.push(Span::styled(" overdue", self.theme.overdue()));
                        }
                        ListItem::new(line)
                    }
                    None => ListItem::new(""),
                },
            })
            .collect();

        let list = List::new(list_items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(self.theme.colors.primary))
                    .title(" Reviews ")
                    .title_style(self.theme.highlight()),
            )
            .highlight_style(self.theme.selected())
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, main[0], &mut self.schedule_state);

        if let Some(ScheduleRow::Item { id, .. }) = self.selected_schedule_row() {
            if let Some(item) = self.items.get(&id) {
                frame.render_widget(ItemDetails::new(item, today, &self.theme), main[1]);
            }
        }
    }

    fn render_add_item(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(3), // Topic
            Constraint::Length(4), // Description
            Constraint::Length(3), // Language
            Constraint::Length(3), // Category
            Constraint::Length(3), // Duration
            Constraint::Length(2), // Split notice
            Constraint::Min(0),    // Spacer
        ])
        .split(centered_rect(60, 100, area));

        let field_style = |field: FormField| {
            if self.form.focus == field {
                Style::default().fg(self.theme.colors.accent)
            } else {
                Style::default().fg(self.theme.colors.text_muted)
            }
        };
        let field_block = |title: &'static str, field: FormField| {
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(field_style(field))
                .title(title)
                .title_style(field_style(field))
        };

        let topic = Paragraph::new(self.form.topic.as_str())
            .block(field_block(" What did you study? ", FormField::Topic));
        frame.render_widget(topic, chunks[0]);

        let description = Paragraph::new(self.form.description.as_str())
            .wrap(Wrap { trim: false })
            .block(field_block(" Notes (optional) ", FormField::Description));
        frame.render_widget(description, chunks[1]);

        let language = Paragraph::new(format!("< {} >", self.form.language.name()))
            .alignment(Alignment::Center)
            .block(field_block(" Language ", FormField::Language));
        frame.render_widget(language, chunks[2]);

        let category = Paragraph::new(Span::styled(
            format!("< {} >", self.form.category.name()),
            Style::default().fg(self.theme.category_color(self.form.category)),
        ))
        .alignment(Alignment::Center)
        .block(field_block(" Category ", FormField::Category));
        frame.render_widget(category, chunks[3]);

        let durations: Vec<Span> = DURATION_PRESETS
            .iter()
            .enumerate()
            .map(|(i, minutes)| {
                let label = format!(" {} ", duration_label(*minutes));
                if i == self.form.duration_idx {
                    Span::styled(label, self.theme.selected().add_modifier(Modifier::BOLD))
                } else {
                    Span::styled(label, self.theme.muted())
                }
            })
            .collect();
        let duration = Paragraph::new(Line::from(durations))
            .alignment(Alignment::Center)
            .block(field_block(" Duration ", FormField::Duration));
        frame.render_widget(duration, chunks[4]);

        if self.form.category.has_fluency_split() {
            let notice = Paragraph::new(format!(
                "{} Grammar selected: 30% of the time is marked as fluency practice.",
                icons::SPLIT
            ))
            .alignment(Alignment::Center)
            .style(Style::default().fg(self.theme.colors.warning));
            frame.render_widget(notice, chunks[5]);
        }

        // Real cursor in the focused text field
        let cursor_target = match self.form.focus {
            FormField::Topic => Some((chunks[0], &self.form.topic)),
            FormField::Description => Some((chunks[1], &self.form.description)),
            _ => None,
        };
        if let Some((field, text)) = cursor_target {
            let inner_width = field.width.saturating_sub(2) as usize; // -2 for borders
            let text_len = text.chars().count();
            let (cursor_x, cursor_y) = if inner_width > 0 {
                let row = text_len / inner_width;
                let col = text_len % inner_width;
                (field.x + 1 + col as u16, field.y + 1 + row as u16)
            } else {
                (field.x + 1, field.y + 1)
            };
            frame.set_cursor_position((cursor_x, cursor_y));
        }
    }

    fn render_agenda(&mut self, frame: &mut Frame, area: Rect) {
        let today = self.today();
        let lookup = calendar_lookup(self.items.items(), &self.agenda_filter);

        let mut lines = vec![Line::from(vec![
            Span::styled("Language: ", self.theme.muted()),
            Span::styled(
                self.agenda_filter.language.map_or("All", |l| l.name()),
                self.theme.highlight(),
            ),
            Span::styled("   Category: ", self.theme.muted()),
            Span::styled(
                self.agenda_filter.category.map_or("All", |c| c.name()),
                self.theme.highlight(),
            ),
        ])];

        for (day, entries) in lookup.range(today..) {
            lines.push(Line::from(""));
            let header_style = if *day == today {
                self.theme.highlight()
            } else {
                self.theme.title()
            };
            lines.push(Line::from(Span::styled(day.relative_label(today), header_style)));

            for entry in entries {
                let (marker, style) = match entry.kind {
                    EntryKind::Actual => ("●", Style::default().fg(self.theme.category_color(entry.item.category))),
                    EntryKind::Projected => ("◌", self.theme.projected()),
                };
                lines.push(Line::from(vec![
                    Span::styled(format!("  {} ", marker), style),
                    Span::styled(format!("{} ", entry.item.language.code()), self.theme.dim()),
                    Span::styled(entry.item.topic.clone(), style),
                    Span::styled(format!("  {}", stage_label(entry.stage)), self.theme.muted()),
                ]));
            }
        }

        if lines.len() == 1 {
            let message = if self.agenda_filter.is_empty() {
                "Nothing scheduled yet."
            } else {
                "Nothing scheduled for this filter."
            };
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(message, self.theme.muted())));
        }

        let agenda = Paragraph::new(lines)
            .scroll((self.agenda_scroll, 0))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(self.theme.colors.primary))
                    .title(" Upcoming reviews (◌ = projected) ")
                    .title_style(self.theme.highlight()),
            );
        frame.render_widget(agenda, centered_rect(80, 100, area));
    }

    fn render_archive(&mut self, frame: &mut Frame, area: Rect) {
        let today = self.today();
        let archived = self.items.archived();

        if archived.is_empty() {
            let empty = Paragraph::new("No finished review cycles yet.")
                .alignment(Alignment::Center)
                .style(self.theme.muted());
            frame.render_widget(empty, centered_rect(60, 30, area));
            return;
        }

        let main = Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).split(area);
        let topic_width = (main[0].width as usize).saturating_sub(34).max(8);
        let list_items: Vec<ListItem> = archived
            .iter()
            .map(|item| ListItem::new(item_line(item, topic_width, &self.theme)))
            .collect();

        let list = List::new(list_items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(self.theme.colors.text_dim))
                    .title(format!(" Archive ({}) ", archived.len()))
                    .title_style(self.theme.highlight()),
            )
            .highlight_style(self.theme.selected())
            .highlight_symbol("> ");

        let selected = self.archive_state.selected().and_then(|i| archived.get(i)).copied();
        frame.render_stateful_widget(list, main[0], &mut self.archive_state);

        if let Some(item) = selected {
            frame.render_widget(ItemDetails::new(item, today, &self.theme), main[1]);
        }
    }

    fn render_data(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(4), // Info
            Constraint::Length(3), // Import path
            Constraint::Min(5),    // Export preview
        ])
        .split(centered_rect(80, 100, area));

        let info = Paragraph::new(vec![
            Line::from(vec![
                Span::styled("Items are saved automatically in ", self.theme.muted()),
                Span::styled(self.storage.data_dir().display().to_string(), self.theme.highlight()),
            ]),
            Line::from(Span::styled(
                "Export writes the block below to a file; import replaces every item with a file's contents.",
                self.theme.dim(),
            )),
        ])
        .wrap(Wrap { trim: true });
        frame.render_widget(info, chunks[0]);

        let path_style = if self.editing_import_path {
            Style::default().fg(self.theme.colors.accent)
        } else {
            Style::default().fg(self.theme.colors.text_muted)
        };
        let path = Paragraph::new(self.import_path.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(path_style)
                .title(" Import from file ")
                .title_style(path_style),
        );
        frame.render_widget(path, chunks[1]);
        if self.editing_import_path {
            let x = chunks[1].x + 1 + self.import_path.chars().count() as u16;
            frame.set_cursor_position((x.min(chunks[1].right().saturating_sub(2)), chunks[1].y + 1));
        }

        let preview = export_items(self.items.items()).unwrap_or_else(|e| format!("export unavailable: {}", e));
        let preview = Paragraph::new(preview)
            .style(self.theme.muted())
            .scroll((self.export_scroll, 0))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(self.theme.colors.text_dim))
                    .title(format!(" Export ({} items) ", self.items.len()))
                    .title_style(self.theme.highlight()),
            );
        frame.render_widget(preview, chunks[2]);
    }

    fn render_testing(&mut self, frame: &mut Frame, area: Rect) {
        let today = self.today();
        let stats = daily_stats(self.items.items(), today);
        let permission = self.notifier.permission();
        let permission_color = match permission {
            Permission::Granted => self.theme.colors.success,
            Permission::Denied => self.theme.colors.error,
            Permission::Undecided => self.theme.colors.text_dim,
        };

        let row = |label: &'static str, value: String, style: Style| {
            Line::from(vec![Span::styled(label, self.theme.muted()), Span::styled(value, style)])
        };
        let text_style = Style::default().fg(self.theme.colors.text);

        let lines = vec![
            row("Effective today:   ", today.to_string(), self.theme.highlight()),
            row("Day offset:        ", format!("+{} days", self.clock.offset()), text_style),
            Line::from(""),
            row("Notifications:     ", permission.name().to_string(), Style::default().fg(permission_color)),
            row(
                "Last reminder:     ",
                self.reminder.last_fired().map_or("never".to_string(), |d| d.relative_label(today)),
                text_style,
            ),
            row(
                "Due today:         ",
                format!("{} ({})", stats.count, stats.time_string),
                text_style,
            ),
            Line::from(""),
            Line::from(Span::styled(
                "Booker checks once a day (and every reminder interval) whether anything is due, \
                 and notifies at most once per day.",
                self.theme.dim(),
            )),
        ];

        let panel = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(self.theme.colors.primary))
                .title(format!(" {} Reminders and time travel ", icons::BELL))
                .title_style(self.theme.highlight()),
        );
        frame.render_widget(panel, centered_rect(70, 80, area));
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Helper Functions
// ══════════════════════════════════════════════════════════════════════════

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

/// All → English → … → Other → All.
fn cycle_language_filter(current: Option<Language>) -> Option<Language> {
    match current {
        None => Some(Language::English),
        Some(Language::Other) => None,
        Some(lang) => Some(lang.next()),
    }
}

fn cycle_category_filter(current: Option<Category>) -> Option<Category> {
    match current {
        None => Some(Category::Grammar),
        Some(Category::NonVerbal) => None,
        Some(cat) => Some(cat.next()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_app() -> (App, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = BookerStorage::open(temp_dir.path().to_path_buf()).unwrap();
        let app = App::new(storage, Config::default(), SimClock::new());
        (app, temp_dir)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(KeyCode::Char(c));
        }
    }

    #[test]
    fn test_filter_cycles_return_to_all() {
        let mut lang = None;
        for _ in 0..=Language::all().len() {
            lang = cycle_language_filter(lang);
        }
        assert_eq!(lang, None);

        let mut cat = None;
        for _ in 0..=Category::all().len() {
            cat = cycle_category_filter(cat);
        }
        assert_eq!(cat, None);
    }

    #[test]
    fn test_reminder_interval_saturates() {
        let (mut app, _temp) = create_test_app();
        app.config.reminder_interval_minutes = u64::MAX;
        assert_eq!(app.reminder_interval(), Duration::from_secs(u64::MAX));

        app.config.reminder_interval_minutes = 0;
        assert_eq!(app.reminder_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_screen_tabs_wrap() {
        assert_eq!(Screen::Testing.next(), Screen::Schedule);
        assert_eq!(Screen::Schedule.prev(), Screen::Testing);
    }

    #[test]
    fn test_log_session_through_form() {
        let (mut app, _temp) = create_test_app();
        app.handle_key(KeyCode::Char('a'));
        assert_eq!(app.screen, Screen::AddItem);

        type_text(&mut app, "Imperfecto");
        app.handle_key(KeyCode::Enter);
        type_text(&mut app, "ser, ir, ver");
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.items.len(), 1);
        let item = &app.items.items()[0];
        assert_eq!(item.topic, "Imperfecto");
        assert_eq!(item.description.as_deref(), Some("ser, ir, ver"));
        assert_eq!(item.next_due_date, app.today().add_days(1));
        assert!(app.form.topic.is_empty());

        // Persisted straight away.
        assert_eq!(app.storage.load().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_topic_is_rejected() {
        let (mut app, _temp) = create_test_app();
        app.screen = Screen::AddItem;
        app.form.focus = FormField::Description;
        app.handle_key(KeyCode::Enter);
        assert!(app.items.is_empty());
    }

    #[test]
    fn test_complete_only_when_due() {
        let (mut app, _temp) = create_test_app();
        app.form.topic = "Konjunktiv II".to_string();
        app.submit_form();
        app.screen = Screen::Schedule;
        app.clamp_selections();

        // Due tomorrow: read-only today.
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.items.items()[0].stage, 1);

        app.advance_day();
        app.handle_key(KeyCode::Enter);
        let item = &app.items.items()[0];
        assert_eq!(item.stage, 2);
        assert_eq!(item.next_due_date, app.today().add_days(1));
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let (mut app, _temp) = create_test_app();
        app.form.topic = "False friends".to_string();
        app.submit_form();
        app.screen = Screen::Schedule;
        app.clamp_selections();

        app.handle_key(KeyCode::Char('d'));
        assert_eq!(app.items.len(), 1);
        app.handle_key(KeyCode::Char('d'));
        assert!(app.items.is_empty());
    }

    #[test]
    fn test_bad_import_keeps_items() {
        let (mut app, temp) = create_test_app();
        app.form.topic = "Clitics".to_string();
        app.submit_form();

        let path = temp.path().join("bad.json");
        std::fs::write(&path, r#"{"not": "a list"}"#).unwrap();
        app.import_path = path.display().to_string();
        app.import_data();

        assert_eq!(app.items.len(), 1);
        assert_eq!(app.items.items()[0].topic, "Clitics");
    }

    #[test]
    fn test_simulated_days_move_today() {
        let (mut app, _temp) = create_test_app();
        let real = app.today();
        app.screen = Screen::Testing;
        app.handle_key(KeyCode::Char('+'));
        app.handle_key(KeyCode::Char('+'));
        assert_eq!(app.today(), real.add_days(2));
        app.handle_key(KeyCode::Char('0'));
        assert_eq!(app.today(), real);
    }
}
