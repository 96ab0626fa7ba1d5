// Matrix Module
// Declaration model, parsing/validation, and cell expansion

pub mod expand;
pub mod models;
pub mod parser;

// Re-export key types
pub use expand::MatrixExpander;
pub use models::{
    CellSpec, CompilerId, Instrumentation, InstrumentationSet, MatrixDeclaration, SourceDecl,
    TargetDecl, TestDecl, TriggerEvent,
};
pub use parser::{validate_declaration, DeclParser, ParseError, ValidationError};
