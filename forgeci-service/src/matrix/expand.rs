// Matrix Expansion
// Expands a declaration into concrete cell specs

use crate::matrix::models::{CellSpec, MatrixDeclaration};

/// Expander from a declaration to its concrete cells
pub struct MatrixExpander;

impl MatrixExpander {
    /// Expand the declared dimensions into cells.
    ///
    /// The product is over the explicit (platform, compiler) pairs crossed
    /// with the instrumentation sets; undeclared pairs never appear. Order is
    /// deterministic: declaration order of targets, then of sets.
    pub fn expand(decl: &MatrixDeclaration) -> Vec<CellSpec> {
        let sets = decl.instrumentation_sets();
        let mut cells = Vec::with_capacity(decl.targets.len() * sets.len());

        for target in &decl.targets {
            for set in &sets {
                cells.push(CellSpec::new(
                    target.platform.clone(),
                    target.compiler,
                    set.clone(),
                ));
            }
        }

        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::models::{
        CompilerId, Instrumentation, InstrumentationSet, SourceDecl, TargetDecl, TestDecl,
    };

    fn decl() -> MatrixDeclaration {
        MatrixDeclaration {
            package: "pkg".to_string(),
            source: SourceDecl {
                repository: "https://example.org/pkg.git".to_string(),
                revision: "main".to_string(),
            },
            targets: vec![
                TargetDecl {
                    platform: "debian12".to_string(),
                    compiler: CompilerId::Gcc,
                    packages: Vec::new(),
                },
                TargetDecl {
                    platform: "alpine3".to_string(),
                    compiler: CompilerId::Clang,
                    packages: Vec::new(),
                },
            ],
            instrumentation: vec![
                InstrumentationSet::plain(),
                InstrumentationSet::new(vec![Instrumentation::ThreadSanitizer]),
            ],
            triggers: Vec::new(),
            test: TestDecl {
                command: "make".to_string(),
                args: vec!["check".to_string()],
            },
            retention_days: 14,
        }
    }

    #[test]
    fn test_expansion_is_pairs_times_sets() {
        let cells = MatrixExpander::expand(&decl());
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_expansion_only_declared_pairs() {
        let cells = MatrixExpander::expand(&decl());

        // debian12 was only declared with gcc; it must never appear with clang
        assert!(!cells
            .iter()
            .any(|c| c.platform == "debian12" && c.compiler == CompilerId::Clang));
        assert!(!cells
            .iter()
            .any(|c| c.platform == "alpine3" && c.compiler == CompilerId::Gcc));
    }

    #[test]
    fn test_expansion_artifact_names_unique() {
        let cells = MatrixExpander::expand(&decl());
        let names: std::collections::HashSet<_> =
            cells.iter().map(|c| c.artifact_name("pkg")).collect();
        assert_eq!(names.len(), cells.len());
    }

    #[test]
    fn test_expansion_without_instrumentation_defaults_to_plain() {
        let mut d = decl();
        d.instrumentation.clear();

        let cells = MatrixExpander::expand(&d);
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().all(|c| c.instrumentation.is_plain()));
    }

    #[test]
    fn test_expansion_deterministic_order() {
        let a = MatrixExpander::expand(&decl());
        let b = MatrixExpander::expand(&decl());
        assert_eq!(a, b);
        assert_eq!(a[0].platform, "debian12");
        assert!(a[0].instrumentation.is_plain());
    }
}
