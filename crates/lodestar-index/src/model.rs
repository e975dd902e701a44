//! Per-file parse results as produced by a language front-end.
//!
//! An [`IndexFile`] describes everything one source file contributes to the
//! shared index. Ranges are local to that file; the entity store attaches file
//! ids when the result is merged.

use std::collections::BTreeMap;

use lodestar_cache::Fingerprint;
use lodestar_core::{Range, Usr};
use serde::{Deserialize, Serialize};

/// A spelled declaration or definition: the name's range plus the full extent of
/// the construct (for example the whole function body).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclSpan {
    pub range: Range,
    pub extent: Range,
}

impl DeclSpan {
    pub const fn new(range: Range, extent: Range) -> Self {
        Self { range, extent }
    }
}

/// Fields every kind of definition carries.
pub trait EntityDef {
    fn detailed_name(&self) -> &str;
    fn short_name(&self) -> &str;
    fn spell(&self) -> Option<&DeclSpan>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FuncDef {
    pub detailed_name: String,
    pub short_name: String,
    pub spell: Option<DeclSpan>,
    /// Functions this one overrides.
    pub bases: Vec<Usr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeDef {
    pub detailed_name: String,
    pub short_name: String,
    pub spell: Option<DeclSpan>,
    pub bases: Vec<Usr>,
    /// Target of a typedef or alias declaration.
    pub alias_of: Option<Usr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    Local,
    Parameter,
    Field,
    #[default]
    Global,
    Macro,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VarDef {
    pub detailed_name: String,
    pub short_name: String,
    pub spell: Option<DeclSpan>,
    /// The variable's declared type, when the front-end resolved one.
    pub type_usr: Option<Usr>,
    pub kind: VarKind,
}

impl VarDef {
    pub fn is_local(&self) -> bool {
        matches!(self.kind, VarKind::Local | VarKind::Parameter)
    }
}

macro_rules! impl_entity_def {
    ($($ty:ty),*) => {$(
        impl EntityDef for $ty {
            fn detailed_name(&self) -> &str {
                &self.detailed_name
            }

            fn short_name(&self) -> &str {
                &self.short_name
            }

            fn spell(&self) -> Option<&DeclSpan> {
                self.spell.as_ref()
            }
        }
    )*};
}

impl_entity_def!(FuncDef, TypeDef, VarDef);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFunc {
    pub usr: Usr,
    pub def: Option<FuncDef>,
    pub declarations: Vec<DeclSpan>,
    /// Call sites and other references.
    pub uses: Vec<Range>,
    /// Overriders of this function observed in the file.
    pub derived: Vec<Usr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexType {
    pub usr: Usr,
    pub def: Option<TypeDef>,
    pub declarations: Vec<DeclSpan>,
    pub uses: Vec<Range>,
    pub derived: Vec<Usr>,
    /// Variables whose type is this type.
    pub instances: Vec<Usr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexVar {
    pub usr: Usr,
    pub def: Option<VarDef>,
    pub declarations: Vec<DeclSpan>,
    pub uses: Vec<Range>,
}

macro_rules! impl_new_entity {
    ($ty:ident { $($field:ident),* }) => {
        impl $ty {
            pub fn new(usr: Usr) -> Self {
                Self {
                    usr,
                    def: None,
                    declarations: Vec::new(),
                    uses: Vec::new(),
                    $($field: Vec::new(),)*
                }
            }
        }
    };
}

impl_new_entity!(IndexFunc { derived });
impl_new_entity!(IndexType { derived, instances });
impl_new_entity!(IndexVar {});

/// Everything a single source file contributes to the index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexFile {
    pub path: String,
    /// Compile arguments the file was parsed with.
    pub args: Vec<String>,
    /// Number of lines in the file at parse time.
    pub line_count: u32,
    /// Content fingerprints of the include dependencies observed while parsing.
    pub dependencies: BTreeMap<String, Fingerprint>,
    pub funcs: BTreeMap<Usr, IndexFunc>,
    pub types: BTreeMap<Usr, IndexType>,
    pub vars: BTreeMap<Usr, IndexVar>,
}

impl IndexFile {
    pub fn new(path: impl Into<String>, args: Vec<String>, line_count: u32) -> Self {
        Self {
            path: path.into(),
            args,
            line_count,
            ..Self::default()
        }
    }

    /// An empty result for `path`; merging it retracts everything the file
    /// contributed before.
    pub fn empty(path: impl Into<String>) -> Self {
        Self::new(path, Vec::new(), 0)
    }

    pub fn func_mut(&mut self, usr: Usr) -> &mut IndexFunc {
        self.funcs.entry(usr).or_insert_with(|| IndexFunc::new(usr))
    }

    pub fn type_mut(&mut self, usr: Usr) -> &mut IndexType {
        self.types.entry(usr).or_insert_with(|| IndexType::new(usr))
    }

    pub fn var_mut(&mut self, usr: Usr) -> &mut IndexVar {
        self.vars.entry(usr).or_insert_with(|| IndexVar::new(usr))
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty() && self.types.is_empty() && self.vars.is_empty()
    }
}
