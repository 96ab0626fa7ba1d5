// Toolchain Resolution
// Resolves concrete tool paths and per-cell workspace roots

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ToolchainError;
use crate::execution::ledger::StepKind;
use crate::matrix::CompilerId;

/// Concrete tool paths and the build parallelism hint for one cell
#[derive(Debug, Clone)]
pub struct ResolvedTools {
    /// C compiler
    pub cc: PathBuf,
    /// C++ compiler
    pub cxx: PathBuf,
    /// Preprocessor
    pub cpp: PathBuf,
    /// Parallelism handed to the native build system
    pub build_jobs: usize,
}

/// Disjoint directory tree owned by exactly one cell.
///
/// Isolation across cells is by construction: the root is keyed by the
/// injective artifact name, so concurrent cells never share a path.
#[derive(Debug, Clone)]
pub struct CellWorkspace {
    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub install_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub dist_dir: PathBuf,
}

impl CellWorkspace {
    /// Create the workspace tree under `workspace_root/artifact_name`
    pub fn allocate(workspace_root: &Path, artifact_name: &str) -> Result<Self, ToolchainError> {
        let root = workspace_root.join(artifact_name);
        let ws = Self {
            source_dir: root.join("src"),
            build_dir: root.join("build"),
            install_dir: root.join("install"),
            reports_dir: root.join("reports"),
            logs_dir: root.join("reports").join("logs"),
            dist_dir: root.join("dist"),
            root,
        };

        for dir in [
            &ws.source_dir,
            &ws.build_dir,
            &ws.install_dir,
            &ws.logs_dir,
            &ws.dist_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| ToolchainError::Workspace {
                path: dir.clone(),
                source: e,
            })?;
        }

        Ok(ws)
    }

    /// Log file for one step, kept inside the report directory so the
    /// reports archive carries build logs even when the build fails
    pub fn log_path(&self, step: StepKind) -> PathBuf {
        self.logs_dir.join(format!("{}.log", step.as_str()))
    }
}

/// Resolved environment for one cell: tools plus workspace path roles.
/// Owned exclusively by that cell's executor.
#[derive(Debug, Clone)]
pub struct ToolchainEnvironment {
    pub tools: ResolvedTools,
    pub workspace: CellWorkspace,
    /// Per-cell marker variables exported alongside the tool variables
    pub markers: HashMap<String, String>,
}

impl ToolchainEnvironment {
    /// Environment variables exported to every build/test process
    pub fn env_vars(&self) -> HashMap<String, String> {
        let mut env = self.markers.clone();
        env.insert("CC".to_string(), self.tools.cc.display().to_string());
        env.insert("CXX".to_string(), self.tools.cxx.display().to_string());
        env.insert("CPP".to_string(), self.tools.cpp.display().to_string());
        env
    }
}

/// Resolution seam: pure apart from path probing, so executors can be tested
/// with a fixed resolver and no compilers on PATH
pub trait ToolchainResolver: Send + Sync {
    fn resolve(&self, platform: &str, compiler: CompilerId) -> Result<ResolvedTools, ToolchainError>;
}

/// Resolver that probes PATH for the compiler's tool names
pub struct PathResolver;

impl PathResolver {
    fn probe(
        platform: &str,
        compiler: CompilerId,
        tool: &str,
    ) -> Result<PathBuf, ToolchainError> {
        which::which(tool).map_err(|_| ToolchainError::UnresolvedToolchain {
            platform: platform.to_string(),
            compiler: compiler.as_str().to_string(),
            tool: tool.to_string(),
        })
    }
}

impl ToolchainResolver for PathResolver {
    fn resolve(&self, platform: &str, compiler: CompilerId) -> Result<ResolvedTools, ToolchainError> {
        let cc = Self::probe(platform, compiler, compiler.cc())?;
        let cxx = Self::probe(platform, compiler, compiler.cxx())?;
        let cpp = Self::probe(platform, compiler, compiler.cpp())?;

        let build_jobs = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Ok(ResolvedTools {
            cc,
            cxx,
            cpp,
            build_jobs,
        })
    }
}
