// Runners Module
// Process execution and the external collaborator seams

pub mod build;
pub mod checkout;
pub mod harness;
pub mod process;
pub mod provision;
pub mod store;

// Re-export key types
pub use build::{BuildSystem, ConfigureMake};
pub use checkout::{GitCheckout, SourceCheckout};
pub use harness::{TapHarness, TestHarness};
pub use process::{ProcessOutput, ProcessRunner};
pub use provision::{PackageProvisioner, PkgInstall};
pub use store::{ArtifactStore, MirrorStore};
