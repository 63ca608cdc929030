//! The `exit_codes` subcommand.

use kiauto::{ExitCode, MAX_REPORTED_VIOLATIONS, REGISTRY_MAX};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct ExitCodeRow {
    pub name: &'static str,
    pub code: i32,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ExitCodeTable {
    pub codes: Vec<ExitCodeRow>,
    /// Range of statuses reporting violation counts, `256 - count`.
    pub violations: [i32; 2],
}

pub fn table() -> ExitCodeTable {
    let max = i32::try_from(MAX_REPORTED_VIOLATIONS).unwrap_or(i32::MAX);
    ExitCodeTable {
        codes: ExitCode::ALL
            .iter()
            .map(|code| ExitCodeRow {
                name: code.name(),
                code: code.code(),
                description: code.description(),
            })
            .collect(),
        violations: [256 - max, 255],
    }
}

/// Human-readable rendering.
pub fn render_text() -> String {
    let table = table();
    let mut out = String::new();
    let _ = writeln!(out, "{:<22} {:>4}  MEANING", "NAME", "CODE");
    for row in &table.codes {
        let _ = writeln!(out, "{:<22} {:>4}  {}", row.name, row.code, row.description);
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Codes 1-{REGISTRY_MAX} are reserved for the names above. Codes {}-{} report \
         ERC/DRC violations as 256 - count (255 = one violation).",
        table.violations[0], table.violations[1]
    );
    out
}

pub fn render_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&table())
}
