// Matrix Declaration Models
// Typed model of a verification matrix declaration and the cells it expands to

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed vocabulary of diagnostic build flags.
///
/// Instrumented binaries are never published as install artifacts; the set a
/// cell carries only changes how the package is configured and which archive
/// names the cell produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Instrumentation {
    #[serde(rename = "memory-sanitizer")]
    MemorySanitizer,
    #[serde(rename = "thread-sanitizer")]
    ThreadSanitizer,
    #[serde(rename = "address-sanitizer")]
    AddressSanitizer,
    #[serde(rename = "undefined-sanitizer")]
    UndefinedSanitizer,
}

impl Instrumentation {
    /// Short code used in artifact names
    pub fn code(&self) -> &'static str {
        match self {
            Instrumentation::MemorySanitizer => "msan",
            Instrumentation::ThreadSanitizer => "tsan",
            Instrumentation::AddressSanitizer => "asan",
            Instrumentation::UndefinedSanitizer => "ubsan",
        }
    }

    /// Build-system option enabling this flag (one option per active flag)
    pub fn configure_option(&self) -> &'static str {
        match self {
            Instrumentation::MemorySanitizer => "--enable-memory-sanitizer",
            Instrumentation::ThreadSanitizer => "--enable-thread-sanitizer",
            Instrumentation::AddressSanitizer => "--enable-address-sanitizer",
            Instrumentation::UndefinedSanitizer => "--enable-undefined-sanitizer",
        }
    }
}

impl fmt::Display for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Ordered, duplicate-free set of instrumentation flags.
///
/// The empty set is the distinguished "plain" configuration. Normalization
/// (sort + dedup) happens on construction so equal sets compare equal and
/// derive the same artifact name regardless of declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Instrumentation>", into = "Vec<Instrumentation>")]
pub struct InstrumentationSet(Vec<Instrumentation>);

impl InstrumentationSet {
    pub fn new(flags: Vec<Instrumentation>) -> Self {
        let mut flags = flags;
        flags.sort();
        flags.dedup();
        Self(flags)
    }

    /// The empty ("plain") set
    pub fn plain() -> Self {
        Self(Vec::new())
    }

    pub fn is_plain(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, flag: Instrumentation) -> bool {
        self.0.contains(&flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrumentation> {
        self.0.iter()
    }

    /// Configure options for the active flags, one per entry
    pub fn configure_options(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|f| f.configure_option().to_string())
            .collect()
    }

    /// Name fragment for artifact naming: `plain`, or sorted codes joined
    /// with `+` (e.g. `msan+tsan`). Injective over sets because the codes
    /// are fixed and the order is canonical.
    pub fn variant(&self) -> String {
        if self.0.is_empty() {
            "plain".to_string()
        } else {
            self.0
                .iter()
                .map(|f| f.code())
                .collect::<Vec<_>>()
                .join("+")
        }
    }
}

impl From<Vec<Instrumentation>> for InstrumentationSet {
    fn from(flags: Vec<Instrumentation>) -> Self {
        Self::new(flags)
    }
}

impl From<InstrumentationSet> for Vec<Instrumentation> {
    fn from(set: InstrumentationSet) -> Self {
        set.0
    }
}

impl fmt::Display for InstrumentationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.variant())
    }
}

/// Compiler selection for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompilerId {
    #[serde(rename = "gcc")]
    Gcc,
    #[serde(rename = "clang")]
    Clang,
}

impl CompilerId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerId::Gcc => "gcc",
            CompilerId::Clang => "clang",
        }
    }

    /// C compiler executable name
    pub fn cc(&self) -> &'static str {
        match self {
            CompilerId::Gcc => "gcc",
            CompilerId::Clang => "clang",
        }
    }

    /// C++ compiler executable name
    pub fn cxx(&self) -> &'static str {
        match self {
            CompilerId::Gcc => "g++",
            CompilerId::Clang => "clang++",
        }
    }

    /// Preprocessor executable name
    pub fn cpp(&self) -> &'static str {
        match self {
            CompilerId::Gcc => "cpp",
            CompilerId::Clang => "clang-cpp",
        }
    }
}

impl fmt::Display for CompilerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that may trigger a pipeline run. Configuration inputs only; the
/// engine never branches on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerEvent {
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "pre-merge")]
    PreMerge,
    #[serde(rename = "post-merge")]
    PostMerge,
}

impl TriggerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerEvent::Manual => "manual",
            TriggerEvent::PreMerge => "pre-merge",
            TriggerEvent::PostMerge => "post-merge",
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(TriggerEvent::Manual),
            "pre-merge" => Ok(TriggerEvent::PreMerge),
            "post-merge" => Ok(TriggerEvent::PostMerge),
            _ => Err(format!(
                "unknown trigger '{}'. Valid triggers: manual, pre-merge, post-merge",
                s
            )),
        }
    }
}

/// Where the package source comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDecl {
    /// Repository URL or path handed to the checkout collaborator
    pub repository: String,
    /// Revision reference (branch, tag, or commit)
    #[serde(default = "default_revision")]
    pub revision: String,
}

fn default_revision() -> String {
    "main".to_string()
}

/// One declared (platform, compiler) pair with its package requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDecl {
    pub platform: String,
    pub compiler: CompilerId,
    /// Dependencies the provisioning collaborator installs for this pair
    #[serde(default)]
    pub packages: Vec<String>,
}

/// How the external test harness is invoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDecl {
    /// Harness command, run inside the build tree
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// A full verification matrix declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixDeclaration {
    /// Name of the package under verification; prefixes all artifact names
    pub package: String,
    pub source: SourceDecl,
    /// Explicit (platform, compiler) pairs. Expansion is over these pairs
    /// crossed with the instrumentation sets, never a free triple product.
    pub targets: Vec<TargetDecl>,
    /// Instrumentation sets; an absent list means a single plain cell
    #[serde(default)]
    pub instrumentation: Vec<InstrumentationSet>,
    #[serde(default)]
    pub triggers: Vec<TriggerEvent>,
    pub test: TestDecl,
    /// Retention handed to the artifact store with every upload
    #[serde(default = "default_retention")]
    pub retention_days: u32,
}

fn default_retention() -> u32 {
    14
}

impl MatrixDeclaration {
    /// Instrumentation sets to expand over, defaulting to the single plain set
    pub fn instrumentation_sets(&self) -> Vec<InstrumentationSet> {
        if self.instrumentation.is_empty() {
            vec![InstrumentationSet::plain()]
        } else {
            self.instrumentation.clone()
        }
    }

    /// Package requirements for a cell, looked up by its (platform, compiler) pair
    pub fn packages_for(&self, spec: &CellSpec) -> Vec<String> {
        self.targets
            .iter()
            .find(|t| t.platform == spec.platform && t.compiler == spec.compiler)
            .map(|t| t.packages.clone())
            .unwrap_or_default()
    }
}

/// One concrete matrix cell: the immutable identity tuple
///
/// Two specs with equal tuples are the same cell. Created once at expansion
/// time and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CellSpec {
    pub platform: String,
    pub compiler: CompilerId,
    pub instrumentation: InstrumentationSet,
}

impl CellSpec {
    pub fn new(
        platform: impl Into<String>,
        compiler: CompilerId,
        instrumentation: InstrumentationSet,
    ) -> Self {
        Self {
            platform: platform.into(),
            compiler,
            instrumentation,
        }
    }

    /// Deterministic artifact name for this cell.
    ///
    /// Injective over the declared dimension set: identifiers are validated
    /// to exclude `-`, the compiler names are fixed, and the variant fragment
    /// is canonical, so no two distinct cells share a name.
    pub fn artifact_name(&self, package: &str) -> String {
        format!(
            "{}-{}-{}-{}",
            package,
            self.platform,
            self.compiler.as_str(),
            self.instrumentation.variant()
        )
    }

    /// Short human-readable label for progress output
    pub fn label(&self) -> String {
        format!(
            "{}/{}/{}",
            self.platform,
            self.compiler.as_str(),
            self.instrumentation.variant()
        )
    }

    /// Environment markers describing the cell, merged into every step's env
    pub fn env_markers(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("FORGECI_PLATFORM".to_string(), self.platform.clone());
        env.insert(
            "FORGECI_COMPILER".to_string(),
            self.compiler.as_str().to_string(),
        );
        env.insert(
            "FORGECI_VARIANT".to_string(),
            self.instrumentation.variant(),
        );
        env
    }
}

impl fmt::Display for CellSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(flags: &[Instrumentation]) -> InstrumentationSet {
        InstrumentationSet::new(flags.to_vec())
    }

    #[test]
    fn test_set_normalization() {
        let a = set(&[
            Instrumentation::ThreadSanitizer,
            Instrumentation::MemorySanitizer,
            Instrumentation::MemorySanitizer,
        ]);
        let b = set(&[
            Instrumentation::MemorySanitizer,
            Instrumentation::ThreadSanitizer,
        ]);

        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.variant(), "msan+tsan");
    }

    #[test]
    fn test_plain_set() {
        let plain = InstrumentationSet::plain();
        assert!(plain.is_plain());
        assert_eq!(plain.variant(), "plain");
        assert!(plain.configure_options().is_empty());
    }

    #[test]
    fn test_configure_options_one_per_flag() {
        let s = set(&[
            Instrumentation::MemorySanitizer,
            Instrumentation::ThreadSanitizer,
        ]);
        assert_eq!(
            s.configure_options(),
            vec![
                "--enable-memory-sanitizer".to_string(),
                "--enable-thread-sanitizer".to_string(),
            ]
        );
    }

    #[test]
    fn test_artifact_name_variants() {
        let plain = CellSpec::new("debian12", CompilerId::Gcc, InstrumentationSet::plain());
        assert_eq!(plain.artifact_name("libdeflate"), "libdeflate-debian12-gcc-plain");

        let tsan = CellSpec::new(
            "debian12",
            CompilerId::Clang,
            set(&[Instrumentation::ThreadSanitizer]),
        );
        assert_eq!(
            tsan.artifact_name("libdeflate"),
            "libdeflate-debian12-clang-tsan"
        );
    }

    #[test]
    fn test_artifact_name_injective_over_sample_matrix() {
        let platforms = ["debian12", "alpine3"];
        let compilers = [CompilerId::Gcc, CompilerId::Clang];
        let sets = [
            InstrumentationSet::plain(),
            set(&[Instrumentation::MemorySanitizer]),
            set(&[Instrumentation::ThreadSanitizer]),
            set(&[
                Instrumentation::MemorySanitizer,
                Instrumentation::ThreadSanitizer,
            ]),
        ];

        let mut names = std::collections::HashSet::new();
        let mut count = 0;
        for p in &platforms {
            for c in &compilers {
                for s in &sets {
                    let spec = CellSpec::new(*p, *c, s.clone());
                    names.insert(spec.artifact_name("pkg"));
                    count += 1;
                }
            }
        }

        assert_eq!(names.len(), count);
    }

    #[test]
    fn test_instrumentation_set_yaml_roundtrip() {
        let yaml = "[thread-sanitizer, memory-sanitizer]";
        let parsed: InstrumentationSet = serde_yaml::from_str(yaml).unwrap();
        // Normalized on deserialize
        assert_eq!(parsed.variant(), "msan+tsan");
    }

    #[test]
    fn test_packages_for_looks_up_declared_pair() {
        let decl = MatrixDeclaration {
            package: "pkg".to_string(),
            source: SourceDecl {
                repository: "https://example.org/pkg.git".to_string(),
                revision: "main".to_string(),
            },
            targets: vec![
                TargetDecl {
                    platform: "debian12".to_string(),
                    compiler: CompilerId::Gcc,
                    packages: vec!["gcc".to_string(), "make".to_string()],
                },
                TargetDecl {
                    platform: "debian12".to_string(),
                    compiler: CompilerId::Clang,
                    packages: vec!["clang".to_string()],
                },
            ],
            instrumentation: Vec::new(),
            triggers: Vec::new(),
            test: TestDecl {
                command: "make".to_string(),
                args: vec!["check".to_string()],
            },
            retention_days: 14,
        };

        let spec = CellSpec::new("debian12", CompilerId::Clang, InstrumentationSet::plain());
        assert_eq!(decl.packages_for(&spec), vec!["clang".to_string()]);

        let unknown = CellSpec::new("alpine3", CompilerId::Gcc, InstrumentationSet::plain());
        assert!(decl.packages_for(&unknown).is_empty());
    }

    #[test]
    fn test_trigger_parsing() {
        assert_eq!("manual".parse::<TriggerEvent>(), Ok(TriggerEvent::Manual));
        assert_eq!(
            "pre-merge".parse::<TriggerEvent>(),
            Ok(TriggerEvent::PreMerge)
        );
        assert!("nightly".parse::<TriggerEvent>().is_err());
    }

    #[test]
    fn test_instrumentation_sets_default_to_plain() {
        let decl = MatrixDeclaration {
            package: "pkg".to_string(),
            source: SourceDecl {
                repository: "r".to_string(),
                revision: "main".to_string(),
            },
            targets: Vec::new(),
            instrumentation: Vec::new(),
            triggers: Vec::new(),
            test: TestDecl {
                command: "make".to_string(),
                args: Vec::new(),
            },
            retention_days: 14,
        };

        let sets = decl.instrumentation_sets();
        assert_eq!(sets, vec![InstrumentationSet::plain()]);
    }
}
