//! Fixture harness with stochastic variations

use hl7v2_core::{Message, Parsed, Parser};

use crate::common::{Gen, TestCase};

/// Result of running a case
#[derive(Debug)]
pub struct CaseResult {
    pub passed: bool,
    pub input: String,
    pub errors: Vec<String>,
}

impl CaseResult {
    pub fn print_failure(&self, label: &str) {
        eprintln!("\n=== FAILED: {label} ===");
        eprintln!("input: {:?}", self.input);
        for error in &self.errors {
            eprintln!("  {error}");
        }
    }
}

/// Run a case on its canonical input.
pub fn run_case(case: &TestCase) -> CaseResult {
    run_on(case, case.input(), true)
}

/// Run a case with random terminators and blank lines between segments.
/// Line-numbered expectations are not checked, since blank lines shift them.
pub fn run_with_variations(case: &TestCase, gen: &mut Gen) -> CaseResult {
    let mut input = String::new();
    for (i, line) in case.lines.iter().enumerate() {
        if i > 0 {
            input.push_str(gen.terminator());
            if gen.chance(0.2) {
                input.push_str(gen.terminator());
            }
        }
        input.push_str(line);
    }
    if gen.chance(0.5) {
        input.push_str(gen.terminator());
    }
    run_on(case, input, false)
}

fn run_on(case: &TestCase, input: String, canonical: bool) -> CaseResult {
    let parser = Parser::with_config(case.config());
    let mut errors = Vec::new();

    match (parser.parse_with_diagnostics(&input), &case.expect.error) {
        (Err(err), Some(expected)) => {
            let name = format!("{err:?}");
            if !name.starts_with(expected.as_str()) {
                errors.push(format!("expected error {expected}, got {name}"));
            }
        }
        (Err(err), None) => errors.push(format!("unexpected error: {err}")),
        (Ok(_), Some(expected)) => errors.push(format!("expected error {expected}, parse succeeded")),
        (Ok(parsed), None) => check(case, &parsed, canonical.then_some(input.as_str()), &mut errors),
    }

    CaseResult {
        passed: errors.is_empty(),
        input,
        errors,
    }
}

fn check(case: &TestCase, parsed: &Parsed<Message>, canonical: Option<&str>, errors: &mut Vec<String>) {
    let message = &parsed.value;
    let expect = &case.expect;

    if !expect.segments.is_empty() {
        let ids: Vec<String> = message.segments().iter().map(|s| s.id().to_string()).collect();
        if ids != expect.segments {
            errors.push(format!("segments: expected {:?}, got {:?}", expect.segments, ids));
        }
    }

    for (path, want) in &expect.values {
        match message.get(path) {
            Ok(got) if &got == want => {}
            Ok(got) => errors.push(format!("{path}: expected {want:?}, got {got:?}")),
            Err(err) => errors.push(format!("{path}: {err}")),
        }
    }

    let warnings: Vec<String> = parsed
        .diagnostics
        .warnings
        .iter()
        .map(|w| format!("{:?}", w.kind))
        .collect();
    if warnings != expect.warnings {
        errors.push(format!("warnings: expected {:?}, got {:?}", expect.warnings, warnings));
    }

    let Some(input) = canonical else {
        if parsed.diagnostics.errors.len() != expect.skipped_lines.len() {
            errors.push(format!(
                "skipped: expected {} errors, got {}",
                expect.skipped_lines.len(),
                parsed.diagnostics.errors.len()
            ));
        }
        return;
    };

    let skipped: Vec<usize> = parsed.diagnostics.errors.iter().map(|e| e.line).collect();
    if skipped != expect.skipped_lines {
        errors.push(format!("skipped lines: expected {:?}, got {skipped:?}", expect.skipped_lines));
    }
    if expect.round_trip && message.serialize() != input {
        errors.push(format!("round trip: got {:?}", message.serialize()));
    }
}
