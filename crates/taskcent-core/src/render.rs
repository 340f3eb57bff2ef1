use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{format_display_date, format_iso_date};
use crate::modal::Position;
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color && io::stdout().is_terminal(),
        }
    }

    /// Never emits escape sequences.
    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, tasks, today))]
    pub fn print_task_table(&self, tasks: &[Task], today: NaiveDate) -> anyhow::Result<()> {
        self.write_task_table(io::stdout().lock(), tasks, today)
    }

    pub fn write_task_table<W: Write>(
        &self,
        mut out: W,
        tasks: &[Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Due".to_string(),
            "Priority".to_string(),
            "Status".to_string(),
            "Title".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&strip_controls(task.id().as_str()), "33");

            let due = task.due_date.map(format_iso_date).unwrap_or_default();
            let due = if task.is_overdue(today) {
                self.paint(&due, "31")
            } else {
                due
            };

            rows.push(vec![
                id,
                due,
                task.priority.as_str().to_string(),
                task.status.label().to_string(),
                single_line(&task.title),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        writeln!(out, "{} task{}", tasks.len(), if tasks.len() == 1 { "" } else { "s" })?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task, position, today))]
    pub fn print_task_detail(
        &self,
        task: &Task,
        position: Option<Position>,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        self.write_task_detail(io::stdout().lock(), task, position, today)
    }

    pub fn write_task_detail<W: Write>(
        &self,
        mut out: W,
        task: &Task,
        position: Option<Position>,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let title = self.paint(&single_line(&task.title), "1");
        match position {
            Some(position) => writeln!(out, "{title}  [{}]", position.label())?,
            None => writeln!(out, "{title}")?,
        }

        writeln!(out, "id        {}", strip_controls(task.id().as_str()))?;
        writeln!(out, "status    {}", task.status.label())?;
        writeln!(out, "priority  {}", task.priority.as_str())?;

        let due = match task.due_date {
            Some(date) if task.is_overdue(today) => {
                self.paint(&format!("{} (overdue)", format_display_date(date)), "31")
            }
            Some(date) => format_display_date(date),
            None => "No due date".to_string(),
        };
        writeln!(out, "due       {due}")?;

        if let Some(category) = &task.category {
            writeln!(out, "category  {}", single_line(category))?;
        }

        let description = task
            .description
            .as_deref()
            .map(plain_text)
            .unwrap_or_default();
        if !description.is_empty() {
            writeln!(out)?;
            for line in description.lines() {
                writeln!(out, "  {line}")?;
            }
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || text.is_empty() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Reduces server-supplied rich text to plain text safe for a terminal:
/// tags are dropped (block tags become line breaks), common entities are
/// decoded and control characters other than newline and tab are removed.
pub fn plain_text(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        match after.find('>') {
            Some(end) => {
                if is_line_break_tag(&after[1..end]) {
                    out.push('\n');
                }
                rest = &after[end + 1..];
            }
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);

    let decoded = decode_entities(&out);
    let cleaned = strip_controls(&decoded);

    let lines: Vec<&str> = cleaned.lines().map(str::trim_end).collect();
    lines.join("\n").trim_matches('\n').to_string()
}

fn is_line_break_tag(tag: &str) -> bool {
    let name = tag
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let closing = tag.starts_with('/');
    name == "br" || (closing && matches!(name.as_str(), "p" | "div" | "li" | "h1" | "h2" | "h3"))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn strip_controls(text: &str) -> String {
    text.chars()
        .filter(|ch| !ch.is_control() || *ch == '\n' || *ch == '\t')
        .collect()
}

fn single_line(text: &str) -> String {
    strip_controls(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
