//! Cross-reference index: per-file parse results, the shared entity store and
//! the incremental merge that folds the former into the latter.

mod db;
mod error;
mod merge;
mod model;
mod update;

pub use db::{
    Db, DeclRef, EntityRef, ExtentRef, FileDef, FileId, QueryDef, QueryFile, QueryFunc, QueryType,
    QueryVar, RelationSet, Use,
};
pub use error::IndexError;
pub use merge::{MergeEngine, MergeOutcome, SharedIndex};
pub use model::{
    DeclSpan, EntityDef, FuncDef, IndexFile, IndexFunc, IndexType, IndexVar, TypeDef, VarDef,
    VarKind,
};
pub use update::{ApplyStats, DefChange, EntityDelta, IndexUpdate, ListDelta};
