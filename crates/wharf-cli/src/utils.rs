use std::{
    fmt::Display,
    sync::{LazyLock, PoisonError, RwLock},
};

use chrono::DateTime;
use nu_ansi_term::Color;
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::info;
use wharf_core::{tasking::JobState, WharfResult};

pub static COLOR: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));
pub static JSON: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(false));

pub fn json_output() -> bool {
    *JSON.read().unwrap_or_else(PoisonError::into_inner)
}

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let color = COLOR.read().unwrap_or_else(PoisonError::into_inner);
        if *color {
            write!(f, "{}", self.0.prefix())?;
            self.1.fmt(f)?;
            write!(f, "{}", self.0.suffix())
        } else {
            self.1.fmt(f)
        }
    }
}

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> WharfResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Renders a rounded table with a title panel and logs it.
pub fn print_table<R, C>(title: &str, header: &[&str], rows: Vec<R>)
where
    R: IntoIterator<Item = C>,
    C: Into<String>,
{
    if rows.is_empty() {
        info!("No {} found", title.to_lowercase());
        return;
    }

    let mut builder = Builder::new();
    builder.push_record(header.iter().copied());
    for row in rows {
        builder.push_record(row);
    }

    let table = builder
        .build()
        .with(Panel::header(title))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string();

    info!("\n{table}");
}

/// Key/value table for a single record.
pub fn print_record(title: &str, fields: Vec<(&str, String)>) {
    let mut builder = Builder::new();
    for (key, value) in fields {
        builder.push_record([key.to_string(), value]);
    }

    let table = builder
        .build()
        .with(Panel::header(title))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string();

    info!("\n{table}");
}

pub fn format_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

pub fn or_dash<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

pub fn colored_state(state: JobState) -> String {
    let color = match state {
        JobState::Queued => Color::Blue,
        JobState::Running => Color::Cyan,
        JobState::Succeeded => Color::Green,
        JobState::Failed => Color::Red,
        JobState::Canceled => Color::Yellow,
    };
    Colored(color, state).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0), "1970-01-01 00:00:00");
        assert_eq!(format_millis(1_700_000_000_000), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(Some(3)), "3");
        assert_eq!(or_dash(None::<String>), "-");
    }
}
