use crate::{dag::DagError, options::OptionError, tree::TreeError, utils::cancellation::CancellationError};

/// Raised when the engine cannot make progress because the optimal cost over
/// the full DP table is infinite (every assignment is forbidden by the
/// transfer-set / distance threshold).
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),
    #[error("dag error: {0}")]
    Dag(#[from] DagError),
    #[error("no feasible reconciliation exists under the given cost vector and threshold")]
    Infeasible,
}

/// Errors that an embedder's own parser may raise while building the input
/// trees and leaf map. This crate never constructs these itself (parsing is
/// out of scope) but they are part of the public taxonomy so a caller can
/// fold its own parse errors into [`ReconcileError`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum InputFormatError {
    #[error("malformed input: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum InputSemanticError {
    #[error("leaf map references unknown parasite leaf: {0}")]
    UnknownParasiteLeaf(String),
    #[error("leaf map references unknown host leaf: {0}")]
    UnknownHostLeaf(String),
    #[error("leaf map is not a bijection onto the parasite leaves")]
    NotSurjective,
}

/// The single error type every public entry point in this crate returns.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReconcileError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("option error: {0}")]
    Option(#[from] OptionError),
    #[error("input format error: {0}")]
    InputFormat(#[from] InputFormatError),
    #[error("input semantic error: {0}")]
    InputSemantic(#[from] InputSemanticError),
    #[error(transparent)]
    Cancellation(#[from] CancellationError),
    #[error("internal error: {0}")]
    Internal(String),
}
