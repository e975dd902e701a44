use lodestar_core::{Kind, Usr};

/// Lookup failures against the entity store.
///
/// Both variants mean "not indexed (yet)"; query callers degrade them to empty
/// results.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("no {kind} entity with usr {usr} is indexed")]
    NotFound { usr: Usr, kind: Kind },

    #[error("file {path} is not indexed")]
    FileNotFound { path: String },
}
