// UI layer: terminal prompts (`dialoguer`), a spinner while a request is
// in flight (`indicatif`), coloured status lines and plain-text tables.
// Nothing here talks to the network.

use crate::model::{parse_date, Patient};
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::time::Duration;

/// Run `f` behind a spinner showing `msg`. The spinner draws only when
/// stderr is a terminal.
pub fn with_spinner<T>(msg: &str, f: impl FnOnce() -> T) -> T {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    let out = f();
    spinner.finish_and_clear();
    out
}

pub fn success(msg: &str) {
    println!("{}", msg.green());
}

pub fn notice(msg: &str) {
    println!("{}", msg.yellow());
}

pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

pub fn hint(msg: &str) {
    eprintln!("{}", msg.yellow());
}

/// Ask for a value that may not be blank.
pub fn prompt_required(label: &str) -> io::Result<String> {
    Input::<String>::new()
        .with_prompt(label)
        .validate_with(|s: &String| -> Result<(), &str> {
            if s.trim().is_empty() {
                Err("a value is required")
            } else {
                Ok(())
            }
        })
        .interact_text()
}

/// Ask for a `YYYY-MM-DD` date.
pub fn prompt_date(label: &str) -> io::Result<String> {
    Input::<String>::new()
        .with_prompt(format!("{label} (YYYY-MM-DD)"))
        .validate_with(|s: &String| -> Result<(), String> {
            parse_date(s).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()
}

/// Ask for a replacement value, showing the current one. Enter on an empty
/// line keeps the current value and returns an empty string.
pub fn prompt_keep(label: &str, current: Option<&str>, is_date: bool) -> io::Result<String> {
    Input::<String>::new()
        .with_prompt(format!("{label} [{}]", current.unwrap_or("")))
        .allow_empty(true)
        .validate_with(move |s: &String| -> Result<(), String> {
            if is_date && !s.trim().is_empty() {
                parse_date(s).map(|_| ()).map_err(|e| e.to_string())
            } else {
                Ok(())
            }
        })
        .interact_text()
}

pub fn prompt_password(label: &str) -> io::Result<String> {
    Password::new().with_prompt(label).interact()
}

pub fn confirm(prompt: &str) -> io::Result<bool> {
    Confirm::new().with_prompt(prompt).default(false).interact()
}

/// Render rows as a boxed text table. Short rows are padded with blanks.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let rule = {
        let mut s = String::from("+");
        for w in &widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    };
    let mut out = vec![rule.clone()];
    out.push(table_line(&widths, headers.iter().copied()));
    out.push(rule.clone());
    for row in rows {
        out.push(table_line(&widths, row.iter().map(String::as_str)));
    }
    if !rows.is_empty() {
        out.push(rule);
    }
    out.join("\n")
}

fn table_line<'a>(widths: &[usize], mut cells: impl Iterator<Item = &'a str>) -> String {
    let mut s = String::from("|");
    for w in widths {
        let cell = cells.next().unwrap_or("");
        let pad = w.saturating_sub(cell.chars().count());
        s.push(' ');
        s.push_str(cell);
        s.push_str(&" ".repeat(pad + 1));
        s.push('|');
    }
    s
}

const PATIENT_HEADERS: [&str; 6] = ["ID", "Name", "Email", "Address", "DOB", "Registered"];

pub fn patients_table(patients: &[Patient]) -> String {
    let rows: Vec<Vec<String>> = patients
        .iter()
        .map(|p| {
            vec![
                p.id_text(),
                p.name.clone().unwrap_or_default(),
                p.email.clone().unwrap_or_default(),
                p.address.clone().unwrap_or_default(),
                p.date_of_birth.clone().unwrap_or_default(),
                p.registered_date.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render_table(&PATIENT_HEADERS, &rows)
}
