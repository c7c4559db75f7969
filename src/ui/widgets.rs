//! Custom widgets for the Booker TUI.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{block::BorderType, Block, Borders, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::theme::{icons, Theme};
use crate::daily::DailyStats;
use crate::day::Day;
use crate::models::{duration_label, ReviewItem};
use crate::schedule::{project_schedule, time_split, EntryKind};

// ══════════════════════════════════════════════════════════════════════════
// Logo Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct Logo<'a> {
    theme: &'a Theme,
}

impl<'a> Logo<'a> {
    const ART: &'static str = r#"
    ╭──────────────────────────────────────╮
    │   ____              _                │
    │  | __ )  ___   ___ | | _____ _ __    │
    │  |  _ \ / _ \ / _ \| |/ / _ \ '__|   │
    │  | |_) | (_) | (_) |   <  __/ |      │
    │  |____/ \___/ \___/|_|\_\___|_|      │
    │                                      │
    │     review on day 1·2·7·14·25        │
    ╰──────────────────────────────────────╯"#;

    pub fn new(theme: &'a Theme) -> Self {
        Self { theme }
    }
}

impl Widget for Logo<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let lines: Vec<Line> = Self::ART
            .lines()
            .skip(1)
            .map(|line| Line::from(Span::styled(line, Style::default().fg(self.theme.colors.primary))))
            .collect();

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(area, buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Today Banner Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct TodayBanner<'a> {
    stats: &'a DailyStats,
    theme: &'a Theme,
}

impl<'a> TodayBanner<'a> {
    pub fn new(stats: &'a DailyStats, theme: &'a Theme) -> Self {
        Self { stats, theme }
    }
}

impl Widget for TodayBanner<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.theme.colors.primary))
            .title(" Today's plan ")
            .title_style(self.theme.highlight());
        let inner = block.inner(area);
        block.render(area, buf);

        let chunks = Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).split(inner);

        let time = if self.stats.has_tasks {
            Span::styled(
                format!("{} {}", icons::CLOCK, self.stats.time_string),
                Style::default().fg(self.theme.colors.text).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled("Free day", Style::default().fg(self.theme.colors.success).add_modifier(Modifier::BOLD))
        };
        Paragraph::new(Line::from(time))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let count = Line::from(vec![
            Span::styled("To review: ", self.theme.muted()),
            Span::styled(
                self.stats.count.to_string(),
                Style::default().fg(self.theme.colors.info).add_modifier(Modifier::BOLD),
            ),
        ]);
        Paragraph::new(count)
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Item Details Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct ItemDetails<'a> {
    item: &'a ReviewItem,
    today: Day,
    theme: &'a Theme,
}

impl<'a> ItemDetails<'a> {
    pub fn new(item: &'a ReviewItem, today: Day, theme: &'a Theme) -> Self {
        Self { item, today, theme }
    }

    fn field(&self, label: &'a str, value: String, style: Style) -> Line<'a> {
        Line::from(vec![Span::styled(label, self.theme.muted()), Span::styled(value, style)])
    }
}

impl Widget for ItemDetails<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let item = self.item;
        let category_style = Style::default().fg(self.theme.category_color(item.category));
        let text_style = Style::default().fg(self.theme.colors.text);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(category_style)
            .title(format!(" {} ", item.topic))
            .title_style(self.theme.title());
        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines = vec![
            self.field("Language: ", item.language.name().to_string(), text_style),
            self.field("Category: ", item.category.name().to_string(), category_style),
            self.field("Stage:    ", item.stage_label(), text_style),
        ];

        let split = time_split(item.original_duration, item.category);
        let duration = if split.has_split {
            format!(
                "{}  ({} {} min + fluency {} min)",
                duration_label(item.original_duration),
                icons::SPLIT,
                split.main,
                split.secondary
            )
        } else {
            duration_label(item.original_duration)
        };
        lines.push(self.field("Duration: ", duration, text_style));
        lines.push(self.field("Logged:   ", item.created_at.relative_label(self.today), text_style));

        let due_style = if item.is_overdue_on(self.today) {
            self.theme.overdue()
        } else {
            text_style
        };
        let due = if item.is_archived {
            format!("archived after {}", item.next_due_date.relative_label(self.today))
        } else if item.is_overdue_on(self.today) {
            format!("overdue by {} days", self.today.days_since(item.next_due_date))
        } else {
            item.next_due_date.relative_label(self.today)
        };
        lines.push(self.field("Due:      ", due, due_style));

        if let Some(ref description) = item.description {
            lines.push(Line::from(""));
            let width = inner.width.saturating_sub(1).max(10) as usize;
            for wrapped in textwrap::wrap(description, width) {
                lines.push(Line::from(Span::styled(wrapped.into_owned(), self.theme.muted())));
            }
        }

        let timeline = project_schedule(item);
        if !timeline.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Timeline", self.theme.highlight())));
            for entry in timeline {
                let style = match entry.kind {
                    EntryKind::Actual => text_style,
                    EntryKind::Projected => self.theme.projected(),
                };
                lines.push(Line::from(vec![
                    Span::styled(format!("  {:<22}", entry.date.relative_label(self.today)), style),
                    Span::styled(crate::models::stage_label(entry.stage), style),
                ]));
            }
        }

        Paragraph::new(lines).render(inner, buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Key Hints Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct KeyHints<'a> {
    hints: &'a [(&'a str, &'a str)],
    theme: &'a Theme,
}

impl<'a> KeyHints<'a> {
    pub fn new(hints: &'a [(&'a str, &'a str)], theme: &'a Theme) -> Self {
        Self { hints, theme }
    }
}

impl Widget for KeyHints<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let spans: Vec<Span> = self
            .hints
            .iter()
            .flat_map(|(key, desc)| {
                vec![
                    Span::styled(*key, self.theme.key_highlight()),
                    Span::styled(format!(" {} ", desc), self.theme.key_hint()),
                    Span::styled("│ ", self.theme.dim()),
                ]
            })
            .collect();

        Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .render(area, buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════

/// One list row for an item: language code, topic, category and stage.
pub fn item_line<'a>(item: &ReviewItem, topic_width: usize, theme: &Theme) -> Line<'a> {
    let topic = pad_to_width(&truncate_to_width(&item.topic, topic_width), topic_width);
    Line::from(vec![
        Span::styled(format!("{} ", item.language.code()), theme.dim()),
        Span::styled(topic, Style::default().fg(theme.colors.text)),
        Span::styled(
            format!(" {:<10}", item.category.name()),
            Style::default().fg(theme.category_color(item.category)),
        ),
        Span::styled(format!(" {}", item.stage_label()), theme.muted()),
        Span::styled(format!("  {}", duration_label(item.original_duration)), theme.dim()),
    ])
}

/// Cut `text` to at most `width` terminal columns, marking the cut with `…`.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn pad_to_width(text: &str, width: usize) -> String {
    let padding = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(padding))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("a longer topic", 8), "a longe…");
        // Wide characters count double.
        assert_eq!(truncate_to_width("日本語の文法", 7), "日本語…");
    }

    #[test]
    fn test_pad_to_width() {
        assert_eq!(pad_to_width("ab", 4), "ab  ");
        assert_eq!(pad_to_width("日本", 5), "日本 ");
    }
}
