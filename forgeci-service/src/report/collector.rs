// Report Collector
// Derives the fixed report formats from one cell's raw result store

use std::path::{Path, PathBuf};

use crate::report::store::{ResultStore, TestStatus};

/// Paths of the files one collection pass produced
#[derive(Debug, Clone)]
pub struct ReportBundle {
    pub dir: PathBuf,
    pub summary: PathBuf,
    pub failures: PathBuf,
    pub junit: PathBuf,
    pub raw_log: PathBuf,
}

/// Writes the report bundle for a cell.
///
/// Collection is a pure function of the store plus the raw log: running it
/// twice over the same inputs produces identical files.
pub struct ReportCollector;

impl ReportCollector {
    /// Collect reports into `out_dir`. The directory is created if absent;
    /// a missing raw log yields an empty copy rather than an error.
    pub fn collect(
        store: &ResultStore,
        raw_log: &Path,
        out_dir: &Path,
        suite_name: &str,
    ) -> std::io::Result<ReportBundle> {
        std::fs::create_dir_all(out_dir)?;

        let bundle = ReportBundle {
            dir: out_dir.to_path_buf(),
            summary: out_dir.join("summary.txt"),
            failures: out_dir.join("failures.txt"),
            junit: out_dir.join("results.xml"),
            raw_log: out_dir.join("testlog.txt"),
        };

        std::fs::write(&bundle.summary, Self::render_summary(store, suite_name))?;
        std::fs::write(&bundle.failures, Self::render_failures(store))?;
        std::fs::write(&bundle.junit, Self::render_junit(store, suite_name))?;

        match std::fs::read(raw_log) {
            Ok(contents) => std::fs::write(&bundle.raw_log, contents)?,
            Err(_) => std::fs::write(&bundle.raw_log, b"")?,
        }

        Ok(bundle)
    }

    fn render_summary(store: &ResultStore, suite_name: &str) -> String {
        let mut out = format!("{}: {} results\n", suite_name, store.total());
        for status in [
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::ExpectedFailure,
            TestStatus::Broken,
            TestStatus::Skipped,
        ] {
            out.push_str(&format!("  {:<16} {}\n", status.label(), store.count(status)));
        }
        out
    }

    /// Verbose listing of every non-passing result with its diagnostics
    fn render_failures(store: &ResultStore) -> String {
        let mut out = String::new();
        for record in store.non_passing() {
            out.push_str(&format!("[{}] {}\n", record.status.label(), record.name));
            if let Some(detail) = &record.detail {
                for line in detail.lines() {
                    out.push_str(&format!("    {}\n", line));
                }
            }
        }
        out
    }

    fn render_junit(store: &ResultStore, suite_name: &str) -> String {
        // Failed results become <failure> elements, broken ones <error>
        // elements; the suite attributes count each category separately
        let failures = store.count(TestStatus::Failed);
        let errors = store.count(TestStatus::Broken);
        let skipped = store.count(TestStatus::Skipped);

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\">\n",
            xml_escape(suite_name),
            store.total(),
            failures,
            errors,
            skipped
        ));

        for record in &store.records {
            xml.push_str(&format!(
                "  <testcase name=\"{}\" classname=\"{}\"",
                xml_escape(&record.name),
                xml_escape(suite_name)
            ));

            let body = match record.status {
                TestStatus::Passed | TestStatus::ExpectedFailure => None,
                TestStatus::Failed => Some(("failure", "test failed")),
                TestStatus::Broken => Some(("error", "harness broken")),
                TestStatus::Skipped => Some(("skipped", "skipped")),
            };

            match body {
                None => xml.push_str(" />\n"),
                Some((tag, message)) => {
                    xml.push_str(">\n");
                    match &record.detail {
                        Some(detail) => xml.push_str(&format!(
                            "    <{} message=\"{}\">{}</{}>\n",
                            tag,
                            xml_escape(message),
                            xml_escape(detail),
                            tag
                        )),
                        None => xml.push_str(&format!(
                            "    <{} message=\"{}\" />\n",
                            tag,
                            xml_escape(message)
                        )),
                    }
                    xml.push_str("  </testcase>\n");
                }
            }
        }

        xml.push_str("</testsuite>\n");
        xml
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::store::TestRecord;

    fn sample_store() -> ResultStore {
        ResultStore::parse_tap(
            "ok 1 - alpha\n\
             not ok 2 - beta\n\
             # boom\n\
             ok 3 - gamma # SKIP\n\
             not ok 4 - delta # TODO\n",
        )
    }

    #[test]
    fn test_collect_writes_all_formats() {
        let temp = tempfile::tempdir().unwrap();
        let raw = temp.path().join("test.log");
        std::fs::write(&raw, "raw harness output\n").unwrap();

        let bundle = ReportCollector::collect(
            &sample_store(),
            &raw,
            &temp.path().join("reports"),
            "pkg-debian12-gcc-plain",
        )
        .unwrap();

        let summary = std::fs::read_to_string(&bundle.summary).unwrap();
        assert!(summary.starts_with("pkg-debian12-gcc-plain: 4 results"));
        assert!(summary.contains("passed"));

        let failures = std::fs::read_to_string(&bundle.failures).unwrap();
        assert!(failures.contains("[failed] beta"));
        assert!(failures.contains("    boom"));
        assert!(failures.contains("[expected-failure] delta"));
        assert!(!failures.contains("alpha"));

        let junit = std::fs::read_to_string(&bundle.junit).unwrap();
        assert!(junit.contains("tests=\"4\" failures=\"1\" errors=\"0\" skipped=\"1\""));
        assert!(junit.contains("<failure message=\"test failed\">boom</failure>"));

        assert_eq!(
            std::fs::read_to_string(&bundle.raw_log).unwrap(),
            "raw harness output\n"
        );
    }

    #[test]
    fn test_collect_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let raw = temp.path().join("test.log");
        std::fs::write(&raw, "output\n").unwrap();
        let out = temp.path().join("reports");

        ReportCollector::collect(&sample_store(), &raw, &out, "suite").unwrap();
        let first = std::fs::read_to_string(out.join("results.xml")).unwrap();
        ReportCollector::collect(&sample_store(), &raw, &out, "suite").unwrap();
        let second = std::fs::read_to_string(out.join("results.xml")).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_collect_empty_store_and_missing_log() {
        let temp = tempfile::tempdir().unwrap();

        let bundle = ReportCollector::collect(
            &ResultStore::default(),
            &temp.path().join("absent.log"),
            &temp.path().join("reports"),
            "suite",
        )
        .unwrap();

        let summary = std::fs::read_to_string(&bundle.summary).unwrap();
        assert!(summary.starts_with("suite: 0 results"));
        assert_eq!(std::fs::read(&bundle.raw_log).unwrap(), b"");
        assert!(std::fs::read_to_string(&bundle.failures).unwrap().is_empty());
    }

    #[test]
    fn test_junit_counts_broken_as_errors() {
        let store = ResultStore::parse_tap(
            "ok 1 - alpha\n\
             not ok 2 - beta\n\
             Bail out! harness crashed\n",
        );

        let xml = ReportCollector::render_junit(&store, "suite");
        assert!(xml.contains("tests=\"3\" failures=\"1\" errors=\"1\" skipped=\"0\""));
        assert!(xml.contains("<error message=\"harness broken\">harness crashed</error>"));
    }

    #[test]
    fn test_junit_escapes_markup() {
        let store = ResultStore {
            records: vec![TestRecord {
                name: "compare <a> & \"b\"".to_string(),
                status: TestStatus::Failed,
                detail: None,
            }],
        };

        let xml = ReportCollector::render_junit(&store, "suite");
        assert!(xml.contains("compare &lt;a&gt; &amp; &quot;b&quot;"));
        assert!(!xml.contains("<a>"));
    }
}
