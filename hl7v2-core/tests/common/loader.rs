//! Fixture loading from YAML files

use std::collections::BTreeMap;
use std::path::Path;

use hl7v2_core::ParserConfig;
use serde::Deserialize;

/// A single test case from a fixture file.
///
/// `lines` are joined with CR to form the input; single-quoted YAML keeps
/// backslashes literal.
#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub desc: String,
    pub lines: Vec<String>,
    #[serde(default)]
    pub config: Option<ParserConfig>,
    pub expect: Expect,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Expect {
    /// Error variant name when the parse must fail.
    pub error: Option<String>,
    /// Segment identifiers of the parsed message, in order.
    pub segments: Vec<String>,
    /// Path → expected value; `~` means absent.
    pub values: BTreeMap<String, Option<String>>,
    /// Warning kinds, by name, in order.
    pub warnings: Vec<String>,
    /// Line numbers of absorbed errors.
    pub skipped_lines: Vec<usize>,
    /// Serialization equals the input.
    pub round_trip: bool,
}

impl TestCase {
    pub fn input(&self) -> String {
        self.lines.join("\r")
    }

    pub fn config(&self) -> ParserConfig {
        self.config.clone().unwrap_or_default()
    }
}

/// Load all test cases from a YAML fixture file
pub fn load_fixtures(path: &Path) -> Vec<TestCase> {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read fixture file {:?}: {}", path, e));
    serde_yaml::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture file {:?}: {}", path, e))
}

/// Load fixtures from the standard fixtures directory
pub fn load_fixtures_by_name(name: &str) -> Vec<TestCase> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(format!("{}.yaml", name));
    load_fixtures(&path)
}
