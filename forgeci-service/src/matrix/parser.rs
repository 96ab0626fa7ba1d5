// Declaration Parser
// Loads matrix declarations from YAML and validates them

use std::fmt;
use std::path::Path;

use crate::matrix::models::MatrixDeclaration;

/// Parse error with location and a source excerpt
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Surrounding source lines
    pub context: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            context: String::new(),
        }
    }

    /// Attach an excerpt of the source around the error line
    pub fn with_source_context(mut self, source: &str, context_lines: usize) -> Self {
        let lines: Vec<&str> = source.lines().collect();
        let start = self.line.saturating_sub(context_lines + 1);
        let end = (self.line + context_lines).min(lines.len());

        let mut context = String::new();
        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = i + 1;
            let prefix = if line_num == self.line { ">" } else { " " };
            context.push_str(&format!("{} {:4} | {}\n", prefix, line_num, line));
        }

        self.context = context;
        self
    }

    fn from_yaml_error(err: &serde_yaml::Error, source: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));
        ParseError::new(err.to_string(), line, column).with_source_context(source, 2)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        writeln!(f, "  --> line {}:{}", self.line, self.column)?;
        if !self.context.is_empty() {
            writeln!(f)?;
            write!(f, "{}", self.context)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Semantic validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    /// Declaration path the error refers to, e.g. `targets[1].platform`
    pub path: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error at '{}': {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Parser for matrix declaration files
pub struct DeclParser;

impl DeclParser {
    /// Parse a declaration from a YAML file
    pub fn parse_file(path: impl AsRef<Path>) -> Result<MatrixDeclaration, ParseError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            ParseError::new(format!("cannot read {}: {}", path.display(), e), 1, 1)
        })?;
        Self::parse_str(&source)
    }

    /// Parse a declaration from YAML source
    pub fn parse_str(source: &str) -> Result<MatrixDeclaration, ParseError> {
        serde_yaml::from_str(source).map_err(|e| ParseError::from_yaml_error(&e, source))
    }
}

/// Identifiers that feed artifact names must stay out of the name separator's
/// way: lowercase alphanumerics plus `_` and `.` only. This is what makes the
/// `-`-joined artifact name injective over the declared dimensions.
fn valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
}

/// Validate a parsed declaration.
///
/// Returns every problem found rather than stopping at the first, so a user
/// can fix a declaration in one pass.
pub fn validate_declaration(decl: &MatrixDeclaration) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !valid_identifier(&decl.package) {
        errors.push(ValidationError::new(
            format!(
                "package name '{}' must match [a-z0-9_.]+ so artifact names stay unambiguous",
                decl.package
            ),
            "package",
        ));
    }

    if decl.targets.is_empty() {
        errors.push(ValidationError::new(
            "at least one target is required",
            "targets",
        ));
    }

    let mut seen_pairs = std::collections::HashSet::new();
    for (i, target) in decl.targets.iter().enumerate() {
        if !valid_identifier(&target.platform) {
            errors.push(ValidationError::new(
                format!("platform '{}' must match [a-z0-9_.]+", target.platform),
                format!("targets[{}].platform", i),
            ));
        }
        if !seen_pairs.insert((target.platform.clone(), target.compiler)) {
            errors.push(ValidationError::new(
                format!(
                    "duplicate target {}/{}",
                    target.platform,
                    target.compiler.as_str()
                ),
                format!("targets[{}]", i),
            ));
        }
    }

    let mut seen_sets = std::collections::HashSet::new();
    for (i, set) in decl.instrumentation.iter().enumerate() {
        if !seen_sets.insert(set.clone()) {
            errors.push(ValidationError::new(
                format!("duplicate instrumentation set '{}'", set.variant()),
                format!("instrumentation[{}]", i),
            ));
        }
    }

    if decl.test.command.trim().is_empty() {
        errors.push(ValidationError::new(
            "test command must not be empty",
            "test.command",
        ));
    }

    if decl.source.repository.trim().is_empty() {
        errors.push(ValidationError::new(
            "source repository must not be empty",
            "source.repository",
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::models::{CompilerId, TriggerEvent};

    const SAMPLE: &str = r#"
package: libdeflate
source:
  repository: https://git.example.org/libdeflate.git
  revision: main
targets:
  - platform: debian12
    compiler: gcc
    packages: [gcc, g++, make]
  - platform: debian12
    compiler: clang
    packages: [clang, make]
instrumentation:
  - []
  - [memory-sanitizer]
  - [thread-sanitizer]
triggers: [manual, pre-merge, post-merge]
test:
  command: make
  args: [check]
retention_days: 7
"#;

    #[test]
    fn test_parse_sample_declaration() {
        let decl = DeclParser::parse_str(SAMPLE).unwrap();

        assert_eq!(decl.package, "libdeflate");
        assert_eq!(decl.targets.len(), 2);
        assert_eq!(decl.targets[1].compiler, CompilerId::Clang);
        assert_eq!(decl.instrumentation.len(), 3);
        assert!(decl.instrumentation[0].is_plain());
        assert_eq!(decl.triggers.len(), 3);
        assert!(decl.triggers.contains(&TriggerEvent::PreMerge));
        assert_eq!(decl.retention_days, 7);
        assert!(validate_declaration(&decl).is_empty());
    }

    #[test]
    fn test_parse_defaults() {
        let yaml = r#"
package: pkg
source:
  repository: https://example.org/pkg.git
targets:
  - platform: debian12
    compiler: gcc
test:
  command: make
"#;
        let decl = DeclParser::parse_str(yaml).unwrap();

        assert_eq!(decl.source.revision, "main");
        assert_eq!(decl.retention_days, 14);
        assert!(decl.instrumentation.is_empty());
        assert_eq!(decl.instrumentation_sets().len(), 1);
    }

    #[test]
    fn test_parse_error_carries_location() {
        let yaml = "package: [unclosed";
        let err = DeclParser::parse_str(yaml).unwrap_err();
        assert!(err.line >= 1);
        let rendered = format!("{}", err);
        assert!(rendered.contains("-->"));
    }

    #[test]
    fn test_unknown_instrumentation_rejected_at_parse() {
        let yaml = r#"
package: pkg
source:
  repository: r
targets:
  - platform: debian12
    compiler: gcc
instrumentation:
  - [leak-sanitizer]
test:
  command: make
"#;
        assert!(DeclParser::parse_str(yaml).is_err());
    }

    #[test]
    fn test_validate_bad_platform_identifier() {
        let mut decl = DeclParser::parse_str(SAMPLE).unwrap();
        decl.targets[0].platform = "Debian-12".to_string();

        let errors = validate_declaration(&decl);
        assert!(errors
            .iter()
            .any(|e| e.path == "targets[0].platform" && e.message.contains("[a-z0-9_.]+")));
    }

    #[test]
    fn test_validate_duplicate_target() {
        let mut decl = DeclParser::parse_str(SAMPLE).unwrap();
        let dup = decl.targets[0].clone();
        decl.targets.push(dup);

        let errors = validate_declaration(&decl);
        assert!(errors.iter().any(|e| e.message.contains("duplicate target")));
    }

    #[test]
    fn test_validate_duplicate_instrumentation_set() {
        let mut decl = DeclParser::parse_str(SAMPLE).unwrap();
        let dup = decl.instrumentation[1].clone();
        decl.instrumentation.push(dup);

        let errors = validate_declaration(&decl);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("duplicate instrumentation set")));
    }

    #[test]
    fn test_validate_empty_targets() {
        let mut decl = DeclParser::parse_str(SAMPLE).unwrap();
        decl.targets.clear();

        let errors = validate_declaration(&decl);
        assert!(errors.iter().any(|e| e.path == "targets"));
    }
}
