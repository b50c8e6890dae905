//! Compiler from the indentation-structured robot language to the block graph
//! consumed by the robot IDE.

pub mod dsl;
pub mod error;
pub mod output;
pub mod paths;
pub mod settings;

pub use dsl::{compile, compile_source, CompileFailure, CompileOptions, Compilation};
pub use error::AppError;
