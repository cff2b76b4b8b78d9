// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Permissive JUnit XML parsing
//!
//! Only the counting attributes of `<testsuite>` (or a bare `<testsuites>`)
//! are read. Reports are often truncated or produced by tools with their own
//! dialect, so nothing beyond those attributes is validated.

use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

use crate::errors::ShipflowResult;

/// Counts extracted from one report fragment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuiteCounts {
    pub tests: u32,
    /// Failures plus errors
    pub failures: u32,
    pub skipped: u32,
}

impl SuiteCounts {
    fn add(&mut self, other: SuiteCounts) {
        self.tests = self.tests.saturating_add(other.tests);
        self.failures = self.failures.saturating_add(other.failures);
        self.skipped = self.skipped.saturating_add(other.skipped);
    }
}

/// Parse an integer attribute, counting anything unparseable as 0
pub fn safe_parse_int(value: &str, attribute: &str) -> u32 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return 0;
    }
    match trimmed.parse::<u32>() {
        Ok(n) => n,
        Err(_) => {
            warn!(attribute, value, "unparseable count in test report, using 0");
            0
        }
    }
}

/// Extracts suite counts from report fragments
pub struct JunitParser {
    suite: Regex,
    suites: Regex,
    attribute: Regex,
}

impl JunitParser {
    pub fn new() -> ShipflowResult<Self> {
        Ok(Self {
            suite: Regex::new(r"<testsuite\b([^>]*)>")?,
            suites: Regex::new(r"<testsuites\b([^>]*)>")?,
            attribute: Regex::new(r#"([A-Za-z_:][\w.:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
        })
    }

    fn attributes<'a>(&self, tag: &'a str) -> HashMap<&'a str, &'a str> {
        self.attribute
            .captures_iter(tag)
            .filter_map(|caps| {
                let name = caps.get(1)?.as_str();
                let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
                Some((name, value))
            })
            .collect()
    }

    fn counts(&self, tag: &str) -> SuiteCounts {
        let attrs = self.attributes(tag);
        let read = |name: &str| attrs.get(name).map_or(0, |v| safe_parse_int(v, name));

        SuiteCounts {
            tests: read("tests"),
            failures: read("failures").saturating_add(read("errors")),
            skipped: read("skipped"),
        }
    }

    /// Sum every `<testsuite>` in the fragment
    ///
    /// A `<testsuites>` wrapper is only counted when it holds no suites, since
    /// its totals would otherwise be counted twice. Returns `None` when the
    /// fragment has no suite element at all.
    pub fn parse(&self, xml: &str) -> Option<SuiteCounts> {
        let mut total = SuiteCounts::default();
        let mut found = false;

        for caps in self.suite.captures_iter(xml) {
            if let Some(attrs) = caps.get(1) {
                total.add(self.counts(attrs.as_str()));
                found = true;
            }
        }

        if !found {
            let attrs = self.suites.captures(xml)?.get(1)?;
            total = self.counts(attrs.as_str());
            found = true;
        }

        found.then_some(total)
    }
}
