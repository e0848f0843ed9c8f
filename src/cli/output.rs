//! Output formatting for the CephLCM CLI
//!
//! Human output goes through [`colored`]; JSON mode prints one document per
//! result so the binary can be scripted. Status lines go to stderr when they
//! report problems and to stdout otherwise.

use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::io::{self, Write};

/// Stream a status line is written to.
#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Output formatter for the human and JSON modes
pub struct OutputFormatter {
    color: bool,
    json_mode: bool,
    verbosity: u8,
}

impl OutputFormatter {
    pub fn new(color: bool, json_mode: bool, verbosity: u8) -> Self {
        // NO_COLOR wins over everything
        let color = color && std::env::var_os("NO_COLOR").is_none();
        Self {
            color,
            json_mode,
            verbosity,
        }
    }

    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Framed title above a run.
    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }
        let frame = "=".repeat(title.chars().count() + 4);
        let body = format!("  {title}  ");
        if self.color {
            println!("\n{}\n{}\n{}\n", frame.cyan(), body.cyan().bold(), frame.cyan());
        } else {
            println!("\n{frame}\n{body}\n{frame}\n");
        }
    }

    /// Failure report. In JSON mode it is an `{"type": "error"}` document.
    pub fn error(&self, message: &str) {
        if self.json_mode {
            eprintln!("{}", serde_json::json!({"type": "error", "message": message}));
            return;
        }
        self.status(Stream::Stderr, "ERROR:".red().bold(), message);
    }

    /// Progress note, shown from `-v` on.
    pub fn info(&self, message: &str) {
        if self.json_mode || self.verbosity == 0 {
            return;
        }
        self.status(Stream::Stdout, "INFO:".blue(), message);
    }

    pub fn success(&self, message: &str) {
        if self.json_mode {
            return;
        }
        self.status(Stream::Stdout, "OK:".green().bold(), message);
    }

    fn status(&self, stream: Stream, label: ColoredString, message: &str) {
        let line = if self.color {
            format!("{label} {message}")
        } else {
            format!("{} {message}", label.clear())
        };
        match stream {
            Stream::Stdout => println!("{line}"),
            Stream::Stderr => eprintln!("{line}"),
        }
    }

    /// Pretty JSON on stdout, whatever the mode.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, value)?;
        writeln!(stdout)?;
        Ok(())
    }

    /// Column-aligned table; nothing is printed without rows.
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if rows.is_empty() {
            return;
        }

        let widths: Vec<usize> = (0..headers.len())
            .map(|col| {
                rows.iter()
                    .filter_map(|row| row.get(col))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(headers[col].chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header = pad(headers.iter().copied(), &widths);
        if self.color {
            println!("{}", header.bold());
        } else {
            println!("{header}");
        }
        println!(
            "{}",
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-")
        );
        for row in rows {
            println!("{}", pad(row.iter().map(String::as_str), &widths));
        }
    }
}

fn pad<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
}
