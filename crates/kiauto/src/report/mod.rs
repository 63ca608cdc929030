//! Parsers for the report files KiCad writes after ERC and DRC.
//!
//! Only the summary lines are read; the individual messages stay in the
//! report for the user.

use crate::error::{KiAutoError, KiAutoResult};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Counts from an eeschema `.erc` report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ErcSummary {
    /// All messages in the report.
    pub messages: u32,
    /// Messages of error severity.
    pub errors: u32,
    /// Messages of warning severity.
    pub warnings: u32,
}

/// Counts from a pcbnew `.rpt` DRC report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DrcSummary {
    /// DRC violations.
    pub errors: u32,
    /// Unrouted connections.
    pub unconnected: u32,
}

fn erc_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"\*\* ERC messages:\s*(\d+)\s+Errors\s+(\d+)\s+Warnings\s+(\d+)").unwrap()
    })
}

fn drc_errors_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"\*\* Found (\d+) DRC (?:errors|violations) \*\*").unwrap()
    })
}

fn drc_unconnected_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"\*\* Found (\d+) unconnected (?:pads|items) \*\*").unwrap()
    })
}

fn number(caps: &regex::Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

fn malformed(path: &Path, reason: &str) -> KiAutoError {
    KiAutoError::Report {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn read(path: &Path) -> KiAutoResult<String> {
    fs::read_to_string(path)
        .map_err(|err| KiAutoError::io(format!("reading {}", path.display()), err))
}

/// Parse the summary of an ERC report.
pub fn parse_erc(path: &Path, contents: &str) -> KiAutoResult<ErcSummary> {
    let caps = erc_regex()
        .captures(contents)
        .ok_or_else(|| malformed(path, "no ERC summary line"))?;
    match (number(&caps, 1), number(&caps, 2), number(&caps, 3)) {
        (Some(messages), Some(errors), Some(warnings)) => Ok(ErcSummary {
            messages,
            errors,
            warnings,
        }),
        _ => Err(malformed(path, "ERC counts out of range")),
    }
}

/// Parse the summary of a DRC report.
///
/// Reports without the unconnected section are accepted with a count of 0.
pub fn parse_drc(path: &Path, contents: &str) -> KiAutoResult<DrcSummary> {
    let errors = drc_errors_regex()
        .captures(contents)
        .ok_or_else(|| malformed(path, "no DRC summary line"))
        .and_then(|caps| number(&caps, 1).ok_or_else(|| malformed(path, "DRC count out of range")))?;
    let unconnected = match drc_unconnected_regex().captures(contents) {
        Some(caps) => {
            number(&caps, 1).ok_or_else(|| malformed(path, "unconnected count out of range"))?
        }
        None => 0,
    };
    Ok(DrcSummary {
        errors,
        unconnected,
    })
}

/// Read and parse an ERC report from disk.
pub fn read_erc(path: &Path) -> KiAutoResult<ErcSummary> {
    parse_erc(path, &read(path)?)
}

/// Read and parse a DRC report from disk.
pub fn read_drc(path: &Path) -> KiAutoResult<DrcSummary> {
    parse_drc(path, &read(path)?)
}
