//! Evaluator generation and evaluation.

pub mod compiler;
pub mod engine;
pub mod evaluator;
pub mod kernel;

pub use self::compiler::Compiler;
pub use self::engine::{CompileOptions, CompiledModel};
pub use self::evaluator::{EvaluationError, Evaluator, FluxFn, ParamValues};
