//! JUnit / RSpec test result parsing

use anyhow::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::path::Path;

use crate::utils::read_content;

/// Root shape of a test results document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestReportKind {
    /// `<testsuites>` wrapping one or more `<testsuite>`
    JUnitSuites,
    /// A single `<testsuite>` root
    JUnitSuite,
    /// `<rspec examples=".." failures=".." pending=".." duration="..">`
    RSpec,
    #[default]
    Unknown,
}

impl TestReportKind {
    fn from_root(name: &[u8]) -> Self {
        match name {
            b"testsuites" => TestReportKind::JUnitSuites,
            b"testsuite" => TestReportKind::JUnitSuite,
            b"rspec" => TestReportKind::RSpec,
            _ => TestReportKind::Unknown,
        }
    }
}

/// Totals over every suite of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TestResultsSummary {
    pub tests: u64,
    pub failures: u64,
    pub errors: u64,
    pub skipped: u64,
    pub time: f64,
}

impl TestResultsSummary {
    pub fn all_passed(&self) -> bool {
        self.failures == 0 && self.errors == 0
    }
}

#[derive(Debug, Default)]
pub struct JUnitTestSuite {
    pub name: String,
    pub tests: u64,
    pub failures: u64,
    pub errors: u64,
    pub skipped: u64,
    pub time: f64,
    pub test_cases: Vec<JUnitTestCase>,
}

#[derive(Debug, Default, Clone)]
pub struct JUnitTestCase {
    pub name: String,
    pub classname: Option<String>,
    pub time: Option<f64>,
    pub status: TestStatus,
}

/// Outcome of a test case. Variants are ordered by precedence so that a case
/// carrying several markers keeps the strongest one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TestStatus {
    #[default]
    Passed,
    Skipped,
    Error,
    Failed,
}

impl TestStatus {
    fn escalate(&mut self, other: TestStatus) {
        if other > *self {
            *self = other;
        }
    }
}

/// Identifies a test case in the non-success lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestIdentifier {
    pub classname: String,
    pub name: String,
}

/// Test cases that did not pass, bucketed by outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotSuccessTestInfo {
    pub failures: Vec<TestIdentifier>,
    pub errors: Vec<TestIdentifier>,
    pub skipped: Vec<TestIdentifier>,
    pub count: usize,
}

/// A parsed test results document
#[derive(Debug, Default)]
pub struct TestResults {
    pub kind: TestReportKind,
    pub summary: TestResultsSummary,
    pub suites: Vec<JUnitTestSuite>,
}

impl TestResults {
    /// Failed, errored and skipped cases. A case lands in at most one bucket.
    pub fn not_success_info(&self) -> NotSuccessTestInfo {
        let mut info = NotSuccessTestInfo::default();

        for case in self.suites.iter().flat_map(|s| &s.test_cases) {
            let id = || TestIdentifier {
                classname: case.classname.clone().unwrap_or_default(),
                name: case.name.clone(),
            };
            match case.status {
                TestStatus::Failed => info.failures.push(id()),
                TestStatus::Error => info.errors.push(id()),
                TestStatus::Skipped => info.skipped.push(id()),
                TestStatus::Passed => {}
            }
        }

        info.count = info.failures.len() + info.errors.len() + info.skipped.len();
        info
    }
}

/// Parse a test results file.
///
/// Returns `None` when the file does not exist. Unreadable or unknown content
/// yields zeroed results so the section still renders.
pub fn parse_test_results(path: &Path) -> Option<TestResults> {
    let content = read_content(path)?;

    match parse_test_results_string(&content) {
        Ok(results) => {
            if results.kind == TestReportKind::Unknown {
                tracing::warn!("Unknown test results format in {}", path.display());
            }
            Some(results)
        }
        Err(e) => {
            tracing::error!("Error parsing test results {}: {:#}", path.display(), e);
            Some(TestResults::default())
        }
    }
}

pub fn parse_test_results_string(xml: &str) -> Result<TestResults> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut results = TestResults::default();
    let mut seen_root = false;
    let mut current_suite: Option<JUnitTestSuite> = None;
    let mut current_case: Option<JUnitTestCase> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let (element, is_empty) = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => (e, false),
            Ok(Event::Empty(e)) => (e, true),
            Ok(Event::End(ref e)) => {
                match e.name().as_ref() {
                    b"testsuite" => {
                        if let Some(suite) = current_suite.take() {
                            results.suites.push(suite);
                        }
                    }
                    b"testcase" => {
                        if let (Some(ref mut suite), Some(case)) = (&mut current_suite, current_case.take()) {
                            suite.test_cases.push(case);
                        }
                    }
                    _ => {}
                }
                continue;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("Error parsing test results XML: {}", e)),
            _ => continue,
        };

        if !seen_root {
            seen_root = true;
            results.kind = TestReportKind::from_root(element.name().as_ref());
            if results.kind == TestReportKind::RSpec {
                results.summary = read_rspec_root(&element);
            }
        }

        match element.name().as_ref() {
            b"testsuite" => {
                let suite = read_suite(&element);
                if is_empty {
                    results.suites.push(suite);
                } else {
                    current_suite = Some(suite);
                }
            }
            b"testcase" => {
                let case = read_case(&element);
                if is_empty {
                    // Self-closing testcase = passed test
                    if let Some(ref mut suite) = current_suite {
                        suite.test_cases.push(case);
                    }
                } else {
                    current_case = Some(case);
                }
            }
            b"failure" => mark(&mut current_case, TestStatus::Failed),
            b"error" => mark(&mut current_case, TestStatus::Error),
            b"skipped" => mark(&mut current_case, TestStatus::Skipped),
            _ => {}
        }
    }

    if matches!(results.kind, TestReportKind::JUnitSuites | TestReportKind::JUnitSuite) {
        results.summary = sum_suites(&results.suites);
    }

    Ok(results)
}

fn mark(case: &mut Option<JUnitTestCase>, status: TestStatus) {
    if let Some(ref mut case) = case {
        case.status.escalate(status);
    }
}

fn sum_suites(suites: &[JUnitTestSuite]) -> TestResultsSummary {
    suites.iter().fold(TestResultsSummary::default(), |mut acc, suite| {
        acc.tests += suite.tests;
        acc.failures += suite.failures;
        acc.errors += suite.errors;
        acc.skipped += suite.skipped;
        acc.time += suite.time;
        acc
    })
}

fn read_suite(e: &BytesStart) -> JUnitTestSuite {
    let mut suite = JUnitTestSuite::default();
    for attr in e.attributes().filter_map(|a| a.ok()) {
        let value = String::from_utf8_lossy(&attr.value);
        match attr.key.as_ref() {
            b"name" => suite.name = value.to_string(),
            b"tests" => suite.tests = parse_count(&value),
            b"failures" => suite.failures = parse_count(&value),
            b"errors" => suite.errors = parse_count(&value),
            b"skipped" => suite.skipped = parse_count(&value),
            b"time" => suite.time = parse_time(&value),
            _ => {}
        }
    }
    suite
}

fn read_case(e: &BytesStart) -> JUnitTestCase {
    let mut case = JUnitTestCase::default();
    for attr in e.attributes().filter_map(|a| a.ok()) {
        let value = String::from_utf8_lossy(&attr.value);
        match attr.key.as_ref() {
            b"name" => case.name = value.to_string(),
            b"classname" => case.classname = Some(value.to_string()),
            b"time" => case.time = value.trim().parse().ok(),
            _ => {}
        }
    }
    case
}

fn read_rspec_root(e: &BytesStart) -> TestResultsSummary {
    let mut summary = TestResultsSummary::default();
    for attr in e.attributes().filter_map(|a| a.ok()) {
        let value = String::from_utf8_lossy(&attr.value);
        match attr.key.as_ref() {
            b"examples" => summary.tests = parse_count(&value),
            b"failures" => summary.failures = parse_count(&value),
            b"errors" => summary.errors = parse_count(&value),
            b"pending" => summary.skipped = parse_count(&value),
            b"duration" => summary.time = parse_time(&value),
            _ => {}
        }
    }
    summary
}

/// Leading integer of an attribute, 0 when absent or unparsable
fn parse_count(value: &str) -> u64 {
    let digits: String = value.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

fn parse_time(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .unwrap_or(0.0)
}
