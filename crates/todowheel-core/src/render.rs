use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Local;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::goals::{GoalFilter, GoalRegistry};
use crate::hosted::auth::AuthUser;
use crate::task::Task;
use crate::wheel::WheelSpin;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(count = tasks.len()))]
    pub fn task_table<W: Write>(&self, out: &mut W, tasks: &[&Task]) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks yet. Add one with `todowheel add <title>`.")?;
            return Ok(());
        }

        let headers = ["ID", "Title", "Time", "Goal"].map(String::from).to_vec();
        let rows = tasks
            .iter()
            .map(|task| {
                vec![
                    self.paint(&task.short_id(), "33"),
                    task.title.clone(),
                    task.duration.map(|d| d.to_string()).unwrap_or_default(),
                    task.goal.clone(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all, fields(count = completed.len()))]
    pub fn history<W: Write>(&self, out: &mut W, completed: &[Task]) -> anyhow::Result<()> {
        if completed.is_empty() {
            writeln!(out, "No completed tasks.")?;
            return Ok(());
        }

        let headers = ["ID", "Title", "Time", "Goal", "Completed"]
            .map(String::from)
            .to_vec();
        let rows = completed
            .iter()
            .map(|task| {
                let completed_at = task
                    .completed_at
                    .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                vec![
                    self.paint(&task.short_id(), "33"),
                    task.title.clone(),
                    task.duration.map(|d| d.to_string()).unwrap_or_default(),
                    task.goal.clone(),
                    self.paint(&completed_at, "32"),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    /// Goal tabs, "All Goals" first, with the selected one highlighted.
    pub fn goal_tabs<W: Write>(
        &self,
        out: &mut W,
        goals: &GoalRegistry,
        active: &GoalFilter,
    ) -> anyhow::Result<()> {
        for label in goals.tabs() {
            if label == active.label() {
                writeln!(out, "* {}", self.paint(label, "1;36"))?;
            } else {
                writeln!(out, "  {label}")?;
            }
        }
        Ok(())
    }

    pub fn spin<W: Write>(&self, out: &mut W, spin: &WheelSpin, task: &Task) -> anyhow::Result<()> {
        writeln!(
            out,
            "The wheel landed on: {}",
            self.paint(&task.title, "1;35")
        )?;
        let mut details = vec![format!("id {}", task.short_id()), task.goal.clone()];
        if let Some(duration) = task.duration {
            details.push(duration.to_string());
        }
        writeln!(out, "  {}", details.join(" | "))?;
        writeln!(
            out,
            "  spun {:.0}° across {} segments of {:.1}°",
            spin.rotation_degrees,
            (360.0 / spin.segment_degrees).round(),
            spin.segment_degrees
        )?;
        Ok(())
    }

    pub fn user<W: Write>(
        &self,
        out: &mut W,
        storage: &str,
        user: Option<&AuthUser>,
    ) -> anyhow::Result<()> {
        writeln!(out, "storage   {storage}")?;
        match user {
            Some(user) => {
                writeln!(out, "user      {}", user.id)?;
                if let Some(email) = &user.email {
                    writeln!(out, "email     {email}")?;
                }
            }
            None => writeln!(out, "user      (not signed in)")?,
        }
        Ok(())
    }

    pub fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    writer: &mut W,
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

    let last = column_count.saturating_sub(1);
    for (idx, header) in headers.iter().enumerate() {
        if idx == last {
            writeln!(writer, "{header}")?;
        } else {
            write!(writer, "{:width$} ", header, width = widths[idx])?;
        }
    }

    for (idx, width) in widths.iter().enumerate() {
        if idx == last {
            writeln!(writer, "{:-<width$}", "", width = width)?;
        } else {
            write!(writer, "{:-<width$} ", "", width = width)?;
        }
    }

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx == last {
                writeln!(writer, "{cell}")?;
            } else {
                let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
                let padding = widths[idx].saturating_sub(visible_width);
                write!(writer, "{}{} ", cell, " ".repeat(padding))?;
            }
        }
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
