//! Booker - spaced repetition for language study sessions.
//!
//! Log what you studied once; Booker brings it back for review 1, 2, 7, 14
//! and 25 days later and archives it after the last review.
//!
//! The scheduling core ([`day`], [`schedule`], [`daily`]) is pure: every
//! function takes the effective day as a parameter and never reads the wall
//! clock. [`storage`], [`notify`] and [`ui`] are the collaborators around it.

pub mod config;
pub mod daily;
pub mod day;
pub mod error;
pub mod models;
pub mod notify;
pub mod schedule;
pub mod storage;
pub mod ui;

pub use daily::{daily_stats, group_by_effective_date, DailyStats};
pub use day::{Day, SimClock};
pub use error::{BookerError, Result};
pub use models::{Category, ItemCollection, Language, ReviewItem};
pub use schedule::{complete_review, interval_for_stage, log_item, project_schedule, time_split};
