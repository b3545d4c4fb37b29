//! Cobertura XML format parser

use anyhow::{bail, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::utils::{read_content, round_to};

/// Coverage of one `<class>` element
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoberturaFile {
    /// Filename with the configured prefix removed
    pub name: String,
    /// Number of `<line>` entries
    pub stmts: u64,
    /// Lines with zero hits
    pub miss: u64,
    /// Class line rate as a percentage, one decimal
    pub cover: f64,
    /// Missed line ranges, e.g. `"2-3, 5"`
    pub missing: Option<String>,
}

/// Normalized Cobertura report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoberturaReport {
    /// Overall percentage, one decimal
    pub total: f64,
    pub files: Vec<CoberturaFile>,
}

impl CoberturaReport {
    /// Sum of statements and misses over every file
    pub fn totals(&self) -> (u64, u64) {
        self.files
            .iter()
            .fold((0, 0), |(stmts, miss), f| (stmts + f.stmts, miss + f.miss))
    }

    /// Files keyed by their folder, folders in lexicographic order.
    ///
    /// Files at the top level land under the empty folder name.
    pub fn folders(&self) -> BTreeMap<String, Vec<&CoberturaFile>> {
        let mut folders: BTreeMap<String, Vec<&CoberturaFile>> = BTreeMap::new();

        for file in &self.files {
            let folder = match file.name.rfind('/') {
                Some(index) => file.name[..index].to_string(),
                None => String::new(),
            };
            folders.entry(folder).or_default().push(file);
        }

        folders
    }
}

/// Parse a Cobertura XML file, `None` when absent or malformed
pub fn parse_cobertura(path: &Path, prefix: &str) -> Option<CoberturaReport> {
    let Some(content) = read_content(path) else {
        tracing::warn!("XML coverage file not found: {}", path.display());
        return None;
    };

    match parse_cobertura_string(&content, prefix) {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::error!("Error parsing XML coverage report {}: {:#}", path.display(), e);
            None
        }
    }
}

/// Class being read, finished on `</class>`
#[derive(Default)]
struct ClassState {
    name: String,
    line_rate: f64,
    stmts: u64,
    missed: Vec<u32>,
}

impl ClassState {
    fn finish(mut self) -> CoberturaFile {
        let miss = self.missed.len() as u64;
        self.missed.sort_unstable();

        CoberturaFile {
            name: self.name,
            stmts: self.stmts,
            miss,
            cover: round_to(self.line_rate * 100.0, 1),
            missing: missing_line_ranges(&self.missed),
        }
    }
}

/// Parse Cobertura XML content from a string
pub fn parse_cobertura_string(content: &str, prefix: &str) -> Result<CoberturaReport> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut report = CoberturaReport::default();
    let mut seen_root = false;
    let mut current: Option<ClassState> = None;
    // <line> elements nested under <methods> repeat the class lines
    let mut methods_depth = 0usize;

    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if !seen_root {
                    report.total = read_root(e)?;
                    seen_root = true;
                    continue;
                }
                match e.name().as_ref() {
                    b"class" => current = read_class(e, prefix),
                    b"methods" => methods_depth += 1,
                    b"line" => count_line(e, current.as_mut(), methods_depth),
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                if !seen_root {
                    report.total = read_root(e)?;
                    seen_root = true;
                    continue;
                }
                match e.name().as_ref() {
                    b"class" => {
                        // Class without lines
                        if let Some(state) = read_class(e, prefix) {
                            report.files.push(state.finish());
                        }
                    }
                    b"line" => count_line(e, current.as_mut(), methods_depth),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"class" => {
                    if let Some(state) = current.take() {
                        report.files.push(state.finish());
                    }
                }
                b"methods" => methods_depth = methods_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => bail!("Error parsing Cobertura XML: {}", e),
            _ => {}
        }
    }

    if !seen_root {
        bail!("Invalid XML coverage format: no root element");
    }

    Ok(report)
}

/// Validate the root element and read the overall rate.
///
/// Both `line_rate` and the standard `line-rate` spellings are accepted.
fn read_root(e: &BytesStart) -> Result<f64> {
    if e.name().as_ref() != b"coverage" {
        bail!(
            "Invalid XML coverage format: root element is <{}>",
            String::from_utf8_lossy(e.name().as_ref())
        );
    }

    let mut line_rate = None;
    let mut branch_rate = None;

    for attr in e.attributes().filter_map(|a| a.ok()) {
        let value = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
        match attr.key.as_ref() {
            b"line_rate" | b"line-rate" => line_rate = line_rate.or(value),
            b"branch_rate" | b"branch-rate" => branch_rate = branch_rate.or(value),
            _ => {}
        }
    }

    Ok(line_rate
        .or(branch_rate)
        .map(|rate| round_to(rate * 100.0, 1))
        .unwrap_or(0.0))
}

fn read_class(e: &BytesStart, prefix: &str) -> Option<ClassState> {
    let mut state = ClassState::default();

    for attr in e.attributes().filter_map(|a| a.ok()) {
        match attr.key.as_ref() {
            b"filename" => {
                let filename = String::from_utf8_lossy(&attr.value).to_string();
                state.name = filename
                    .strip_prefix(prefix)
                    .map(str::to_string)
                    .unwrap_or(filename);
            }
            b"line_rate" | b"line-rate" => {
                if let Ok(rate) = String::from_utf8_lossy(&attr.value).parse::<f64>() {
                    state.line_rate = rate;
                }
            }
            _ => {}
        }
    }

    if state.name.is_empty() {
        None
    } else {
        Some(state)
    }
}

fn count_line(e: &BytesStart, class: Option<&mut ClassState>, methods_depth: usize) {
    let Some(class) = class else { return };
    if methods_depth > 0 {
        return;
    }

    class.stmts += 1;

    let mut zero_hits = false;
    let mut number = None;
    for attr in e.attributes().filter_map(|a| a.ok()) {
        match attr.key.as_ref() {
            b"hits" => zero_hits = String::from_utf8_lossy(&attr.value).trim() == "0",
            b"number" => number = String::from_utf8_lossy(&attr.value).parse::<u32>().ok(),
            _ => {}
        }
    }

    if zero_hits {
        // Counted as missed even without a usable line number
        class.missed.push(number.unwrap_or(0));
    }
}

/// Collapse sorted line numbers into `"a"` / `"a-b"` tokens joined by `", "`.
///
/// Line number 0 marks a missed line without a number and is skipped.
pub fn missing_line_ranges(lines: &[u32]) -> Option<String> {
    let mut sorted: Vec<u32> = lines.iter().copied().filter(|&n| n > 0).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let (&first, rest) = sorted.split_first()?;

    let mut groups = Vec::new();
    let mut start = first;
    let mut end = first;

    for &line in rest {
        if line == end + 1 {
            end = line;
        } else {
            groups.push(format_range(start, end));
            start = line;
            end = line;
        }
    }
    groups.push(format_range(start, end));

    Some(groups.join(", "))
}

fn format_range(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}
