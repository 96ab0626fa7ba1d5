// Raw Result Store
// Parsed form of the harness's on-disk result stream (TAP)

use serde::Serialize;

/// Category of a single harness result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    Passed,
    Failed,
    /// `not ok ... # TODO`: a known defect, expected to fail
    ExpectedFailure,
    /// The harness bailed out or a result could not be interpreted
    Broken,
    Skipped,
}

impl TestStatus {
    /// Passing for reporting purposes. The non-passing categories are the
    /// ones the verbose listing surfaces: failed, expected-failure, broken.
    pub fn is_passing(&self) -> bool {
        matches!(self, TestStatus::Passed | TestStatus::Skipped)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::ExpectedFailure => "expected-failure",
            TestStatus::Broken => "broken",
            TestStatus::Skipped => "skipped",
        }
    }
}

/// One harness result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRecord {
    pub name: String,
    pub status: TestStatus,
    /// Diagnostic lines the harness attached to this result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The parsed result store.
///
/// May be empty or partial when the harness failed outright; every consumer
/// must tolerate that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultStore {
    pub records: Vec<TestRecord>,
}

impl ResultStore {
    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn count(&self, status: TestStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn non_passing(&self) -> Vec<&TestRecord> {
        self.records
            .iter()
            .filter(|r| !r.status.is_passing())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Parse a TAP stream into a store.
    ///
    /// Understands `ok`/`not ok` result lines with optional `# SKIP` and
    /// `# TODO` directives, `#` diagnostic lines (attached to the preceding
    /// non-passing result), and `Bail out!`. Anything else is ignored, so a
    /// truncated or garbled stream still yields the results it did contain.
    pub fn parse_tap(input: &str) -> ResultStore {
        let mut records: Vec<TestRecord> = Vec::new();

        for line in input.lines() {
            let line = line.trim_end();

            if let Some(rest) = line.strip_prefix("Bail out!") {
                records.push(TestRecord {
                    name: "bailout".to_string(),
                    status: TestStatus::Broken,
                    detail: Some(rest.trim().to_string()).filter(|s| !s.is_empty()),
                });
                break;
            }

            if let Some(diag) = line.strip_prefix('#') {
                // Attach diagnostics to the preceding non-passing result
                if let Some(last) = records.last_mut() {
                    if !last.status.is_passing() {
                        let detail = last.detail.get_or_insert_with(String::new);
                        if !detail.is_empty() {
                            detail.push('\n');
                        }
                        detail.push_str(diag.trim());
                    }
                }
                continue;
            }

            let (passed, rest) = if let Some(rest) = result_line(line, "not ok") {
                (false, rest)
            } else if let Some(rest) = result_line(line, "ok") {
                (true, rest)
            } else {
                continue;
            };

            // "ok 3 - name # directive"
            let (body, directive) = match rest.split_once('#') {
                Some((body, directive)) => (body, Some(directive.trim())),
                None => (rest, None),
            };

            let name = body
                .trim()
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim()
                .trim_start_matches('-')
                .trim()
                .to_string();
            let name = if name.is_empty() {
                format!("test {}", records.len() + 1)
            } else {
                name
            };

            let directive_upper = directive.map(|d| d.to_ascii_uppercase());
            let status = match (passed, directive_upper.as_deref()) {
                (_, Some(d)) if d.starts_with("SKIP") => TestStatus::Skipped,
                (false, Some(d)) if d.starts_with("TODO") => TestStatus::ExpectedFailure,
                (true, _) => TestStatus::Passed,
                (false, _) => TestStatus::Failed,
            };

            records.push(TestRecord {
                name,
                status,
                detail: None,
            });
        }

        ResultStore { records }
    }
}

/// Match `prefix` as a whole word at the start of a result line. Lines like
/// `okfoo` or `okay 3` are diagnostics noise, not results.
fn result_line<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_results() {
        let tap = "\
TAP version 13
1..3
ok 1 - compress_small
not ok 2 - compress_large
ok 3 - roundtrip
";
        let store = ResultStore::parse_tap(tap);

        assert_eq!(store.total(), 3);
        assert_eq!(store.count(TestStatus::Passed), 2);
        assert_eq!(store.count(TestStatus::Failed), 1);
        assert_eq!(store.records[1].name, "compress_large");
    }

    #[test]
    fn test_parse_directives() {
        let tap = "\
ok 1 - a # SKIP not supported here
not ok 2 - b # TODO known defect
not ok 3 - c
";
        let store = ResultStore::parse_tap(tap);

        assert_eq!(store.records[0].status, TestStatus::Skipped);
        assert_eq!(store.records[1].status, TestStatus::ExpectedFailure);
        assert_eq!(store.records[2].status, TestStatus::Failed);
    }

    #[test]
    fn test_parse_diagnostics_attach_to_failure() {
        let tap = "\
not ok 1 - decompress
# expected 42 bytes
# got 0 bytes
ok 2 - other
";
        let store = ResultStore::parse_tap(tap);

        let detail = store.records[0].detail.as_deref().unwrap();
        assert!(detail.contains("expected 42 bytes"));
        assert!(detail.contains("got 0 bytes"));
        assert!(store.records[1].detail.is_none());
    }

    #[test]
    fn test_parse_bail_out() {
        let tap = "\
ok 1 - a
Bail out! harness could not initialize
ok 2 - never reached
";
        let store = ResultStore::parse_tap(tap);

        assert_eq!(store.total(), 2);
        assert_eq!(store.records[1].status, TestStatus::Broken);
        assert!(store.records[1]
            .detail
            .as_deref()
            .unwrap()
            .contains("could not initialize"));
    }

    #[test]
    fn test_parse_empty_and_garbage_tolerated() {
        assert!(ResultStore::parse_tap("").is_empty());
        assert!(ResultStore::parse_tap("make: *** [check] Error 2\n").is_empty());
    }

    #[test]
    fn test_prefix_must_be_a_whole_word() {
        let tap = "\
okfoo
not okbar
okay 3 - prose about results
ok 4 - real
";
        let store = ResultStore::parse_tap(tap);

        assert_eq!(store.total(), 1);
        assert_eq!(store.records[0].name, "real");
    }

    #[test]
    fn test_non_passing_filter() {
        let tap = "\
ok 1 - a
ok 2 - b # SKIP
not ok 3 - c
not ok 4 - d # TODO
";
        let store = ResultStore::parse_tap(tap);
        let names: Vec<_> = store.non_passing().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["c", "d"]);
    }

    #[test]
    fn test_unnamed_result_gets_positional_name() {
        let store = ResultStore::parse_tap("ok 1\nnot ok 2\n");
        assert_eq!(store.records[0].name, "test 1");
        assert_eq!(store.records[1].name, "test 2");
    }
}
