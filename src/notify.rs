//! Daily reminder notifications.
//!
//! The core only decides *whether* and *what* to notify; delivery goes
//! through a [`Notifier`]. The reminder check is keyed by the effective day,
//! so running it many times a day sends at most one notification.

use tracing::{debug, info};

use crate::daily::{daily_stats, DailyStats};
use crate::day::Day;
use crate::models::ReviewItem;

pub const DAILY_TITLE: &str = "Booker: today's plan";
pub const REPORT_TITLE: &str = "Booker: daily report";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Undecided,
}

impl Permission {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Granted => "Active",
            Self::Denied => "Blocked",
            Self::Undecided => "Not set",
        }
    }
}

pub trait Notifier {
    fn permission(&self) -> Permission;

    fn request_permission(&mut self) -> Permission;

    /// Deliver a notification. Does nothing unless permission is granted.
    fn notify(&mut self, title: &str, body: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

/// Notifier that queues notices for the caller to display.
#[derive(Debug)]
pub struct QueueNotifier {
    permission: Permission,
    pending: Vec<Notice>,
}

impl QueueNotifier {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            pending: Vec::new(),
        }
    }

    pub fn from_enabled(enabled: bool) -> Self {
        Self::new(if enabled {
            Permission::Granted
        } else {
            Permission::Undecided
        })
    }

    /// Take every notice delivered since the last drain.
    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.pending)
    }

    pub fn deny(&mut self) {
        self.permission = Permission::Denied;
    }
}

impl Notifier for QueueNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Permission {
        // A terminal can always show in-app notices; only an explicit denial sticks.
        if self.permission != Permission::Denied {
            self.permission = Permission::Granted;
        }
        self.permission
    }

    fn notify(&mut self, title: &str, body: &str) {
        if self.permission != Permission::Granted {
            debug!(title, "notification suppressed, permission not granted");
            return;
        }
        info!(title, body, "notification");
        self.pending.push(Notice {
            title: title.to_string(),
            body: body.to_string(),
        });
    }
}

pub fn daily_body(stats: &DailyStats) -> String {
    let noun = if stats.count == 1 { "review" } else { "reviews" };
    format!(
        "You have {} {} due today.\nEstimated time: {}",
        stats.count, noun, stats.time_string
    )
}

/// Body for the on-demand report, which also covers a free day.
pub fn report_body(stats: &DailyStats) -> String {
    if stats.has_tasks {
        daily_body(stats)
    } else {
        "All done! Nothing due today.".to_string()
    }
}

/// Send the on-demand daily report regardless of the reminder marker.
pub fn send_report(items: &[ReviewItem], today: Day, notifier: &mut dyn Notifier) -> DailyStats {
    let stats = daily_stats(items, today);
    notifier.notify(REPORT_TITLE, &report_body(&stats));
    stats
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderOutcome {
    Sent(DailyStats),
    AlreadySent,
    NothingDue,
    NotPermitted,
    NoItems,
}

/// Once-per-day reminder keyed by the effective day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyReminder {
    last_fired: Option<Day>,
}

impl DailyReminder {
    pub fn new(last_fired: Option<Day>) -> Self {
        Self { last_fired }
    }

    pub fn last_fired(&self) -> Option<Day> {
        self.last_fired
    }

    /// Notify about today's workload unless that already happened today.
    ///
    /// The marker only moves when a notification is actually sent.
    pub fn check(&mut self, items: &[ReviewItem], today: Day, notifier: &mut dyn Notifier) -> ReminderOutcome {
        if items.is_empty() {
            return ReminderOutcome::NoItems;
        }
        if notifier.permission() != Permission::Granted {
            return ReminderOutcome::NotPermitted;
        }
        if self.last_fired == Some(today) {
            return ReminderOutcome::AlreadySent;
        }

        let stats = daily_stats(items, today);
        if !stats.has_tasks {
            return ReminderOutcome::NothingDue;
        }

        notifier.notify(DAILY_TITLE, &daily_body(&stats));
        self.last_fired = Some(today);
        ReminderOutcome::Sent(stats)
    }
}
