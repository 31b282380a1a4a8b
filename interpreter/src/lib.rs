pub mod builtins;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod include;
pub mod output;
pub mod pattern;
pub mod runtime_value;

pub use environment::Params;
pub use error::{DiagnosticError, RenderError, RuntimeError};
pub use executor::{
    RenderOptions, execute_program, execute_program_with_loader, render, render_with_loader,
};
pub use include::{FsLoader, SourceLoader};
pub use output::NewlineMode;
pub use runtime_value::RuntimeValue;
