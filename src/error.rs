use thiserror::Error;

/// Error taxonomy for the reconciliation core.
///
/// Transform math never fails; only graph traversal and configuration
/// lookups produce errors. `NotFound` is recoverable and callers decide
/// whether to skip or warn. `CyclicHierarchy` aborts the rig-building pass
/// it occurs in. `Configuration` means the convention table is incomplete
/// and should surface at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RigError {
    #[error("bone or node '{0}' not found")]
    NotFound(String),

    #[error("cyclic parent hierarchy detected at '{0}'")]
    CyclicHierarchy(String),

    #[error("no convention table entry for {0}")]
    Configuration(String),
}
