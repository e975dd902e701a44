//! The entity store: every indexed file, function, type and variable.
//!
//! Entities are kept in insertion-ordered tables with a `Usr` lookup; files are
//! addressed by dense [`FileId`]s that stay valid for the lifetime of the store.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use lodestar_core::{Kind, Range, Role, Usr};

use crate::error::IndexError;
use crate::model::{DeclSpan, EntityDef, FuncDef, TypeDef, VarDef};

/// Dense index of a file in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A declaration or definition site attributed to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclRef {
    pub file_id: FileId,
    pub range: Range,
    pub extent: Range,
    pub role: Role,
}

/// A reference site attributed to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Use {
    pub file_id: FileId,
    pub range: Range,
    pub role: Role,
}

impl From<DeclRef> for Use {
    fn from(decl: DeclRef) -> Self {
        Use {
            file_id: decl.file_id,
            range: decl.range,
            role: decl.role,
        }
    }
}

/// One occurrence of a symbol in a file, as tracked by [`QueryFile::symbol2refcnt`].
///
/// `extent` is present for definitions and declarations and absent for plain
/// references. Ordering starts with `range`, so iterating a file's table visits
/// occurrences in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtentRef {
    pub range: Range,
    pub usr: Usr,
    pub kind: Kind,
    pub role: Role,
    pub extent: Option<Range>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileDef {
    pub args: Vec<String>,
    pub line_count: u32,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFile {
    pub id: FileId,
    pub path: String,
    /// `None` until the file is first indexed and again after it is removed.
    pub def: Option<FileDef>,
    pub symbol2refcnt: BTreeMap<ExtentRef, i32>,
}

impl QueryFile {
    /// Occurrences from the latest merged parse, in source order.
    pub fn live_symbols(&self) -> impl Iterator<Item = &ExtentRef> + '_ {
        self.symbol2refcnt
            .iter()
            .filter(|(_, refcnt)| **refcnt > 0)
            .map(|(sym, _)| sym)
    }

    pub fn line_count(&self) -> Option<u32> {
        self.def.as_ref().map(|def| def.line_count)
    }
}

/// A set of related `Usr`s where each member counts how many files assert it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelationSet(BTreeMap<Usr, u32>);

impl RelationSet {
    pub(crate) fn insert(&mut self, usr: Usr) {
        *self.0.entry(usr).or_insert(0) += 1;
    }

    pub(crate) fn remove(&mut self, usr: Usr) {
        if let Some(count) = self.0.get_mut(&usr) {
            *count -= 1;
            if *count == 0 {
                self.0.remove(&usr);
            }
        }
    }

    pub fn contains(&self, usr: Usr) -> bool {
        self.0.contains_key(&usr)
    }

    pub fn iter(&self) -> impl Iterator<Item = Usr> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A definition together with the file that contributed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDef<D> {
    pub file_id: FileId,
    pub def: D,
}

impl<D: EntityDef> QueryDef<D> {
    pub fn spell(&self) -> Option<DeclRef> {
        self.def.spell().map(|span| DeclRef {
            file_id: self.file_id,
            range: span.range,
            extent: span.extent,
            role: Role::Definition,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFunc {
    pub usr: Usr,
    pub defs: Vec<QueryDef<FuncDef>>,
    pub declarations: Vec<DeclRef>,
    pub uses: Vec<Use>,
    pub derived: RelationSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryType {
    pub usr: Usr,
    pub defs: Vec<QueryDef<TypeDef>>,
    pub declarations: Vec<DeclRef>,
    pub uses: Vec<Use>,
    pub derived: RelationSet,
    pub instances: RelationSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVar {
    pub usr: Usr,
    pub defs: Vec<QueryDef<VarDef>>,
    pub declarations: Vec<DeclRef>,
    pub uses: Vec<Use>,
}

/// Relations attributed to the file that asserted them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relation {
    Derived,
    Instances,
}

/// Shape shared by the three entity tables, used by the merge code.
pub(crate) trait QueryEntity {
    type Def: EntityDef + Clone + PartialEq;

    const KIND: Kind;

    fn new(usr: Usr) -> Self;
    fn defs_mut(&mut self) -> &mut Vec<QueryDef<Self::Def>>;
    fn declarations_mut(&mut self) -> &mut Vec<DeclRef>;
    fn uses_mut(&mut self) -> &mut Vec<Use>;
    fn relation_mut(&mut self, relation: Relation) -> Option<&mut RelationSet>;
    fn is_dead(&self) -> bool;
}

impl QueryEntity for QueryFunc {
    type Def = FuncDef;

    const KIND: Kind = Kind::Func;

    fn new(usr: Usr) -> Self {
        Self {
            usr,
            defs: Vec::new(),
            declarations: Vec::new(),
            uses: Vec::new(),
            derived: RelationSet::default(),
        }
    }

    fn defs_mut(&mut self) -> &mut Vec<QueryDef<FuncDef>> {
        &mut self.defs
    }

    fn declarations_mut(&mut self) -> &mut Vec<DeclRef> {
        &mut self.declarations
    }

    fn uses_mut(&mut self) -> &mut Vec<Use> {
        &mut self.uses
    }

    fn relation_mut(&mut self, relation: Relation) -> Option<&mut RelationSet> {
        match relation {
            Relation::Derived => Some(&mut self.derived),
            Relation::Instances => None,
        }
    }

    fn is_dead(&self) -> bool {
        self.defs.is_empty()
            && self.declarations.is_empty()
            && self.uses.is_empty()
            && self.derived.is_empty()
    }
}

impl QueryEntity for QueryType {
    type Def = TypeDef;

    const KIND: Kind = Kind::Type;

    fn new(usr: Usr) -> Self {
        Self {
            usr,
            defs: Vec::new(),
            declarations: Vec::new(),
            uses: Vec::new(),
            derived: RelationSet::default(),
            instances: RelationSet::default(),
        }
    }

    fn defs_mut(&mut self) -> &mut Vec<QueryDef<TypeDef>> {
        &mut self.defs
    }

    fn declarations_mut(&mut self) -> &mut Vec<DeclRef> {
        &mut self.declarations
    }

    fn uses_mut(&mut self) -> &mut Vec<Use> {
        &mut self.uses
    }

    fn relation_mut(&mut self, relation: Relation) -> Option<&mut RelationSet> {
        match relation {
            Relation::Derived => Some(&mut self.derived),
            Relation::Instances => Some(&mut self.instances),
        }
    }

    fn is_dead(&self) -> bool {
        self.defs.is_empty()
            && self.declarations.is_empty()
            && self.uses.is_empty()
            && self.derived.is_empty()
            && self.instances.is_empty()
    }
}

impl QueryEntity for QueryVar {
    type Def = VarDef;

    const KIND: Kind = Kind::Var;

    fn new(usr: Usr) -> Self {
        Self {
            usr,
            defs: Vec::new(),
            declarations: Vec::new(),
            uses: Vec::new(),
        }
    }

    fn defs_mut(&mut self) -> &mut Vec<QueryDef<VarDef>> {
        &mut self.defs
    }

    fn declarations_mut(&mut self) -> &mut Vec<DeclRef> {
        &mut self.declarations
    }

    fn uses_mut(&mut self) -> &mut Vec<Use> {
        &mut self.uses
    }

    fn relation_mut(&mut self, _relation: Relation) -> Option<&mut RelationSet> {
        None
    }

    fn is_dead(&self) -> bool {
        self.defs.is_empty() && self.declarations.is_empty() && self.uses.is_empty()
    }
}

/// Prefer a definition that has a spelling, like an editor would show.
fn any_def<D: EntityDef>(defs: &[QueryDef<D>]) -> Option<&D> {
    defs.iter()
        .find(|def| def.def.spell().is_some())
        .or_else(|| defs.first())
        .map(|def| &def.def)
}

impl QueryFunc {
    pub fn any_def(&self) -> Option<&FuncDef> {
        any_def(&self.defs)
    }
}

impl QueryType {
    pub fn any_def(&self) -> Option<&TypeDef> {
        any_def(&self.defs)
    }
}

impl QueryVar {
    pub fn any_def(&self) -> Option<&VarDef> {
        any_def(&self.defs)
    }
}

/// A borrowed entity of any kind.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Func(&'a QueryFunc),
    Type(&'a QueryType),
    Var(&'a QueryVar),
}

impl<'a> EntityRef<'a> {
    pub fn usr(&self) -> Usr {
        match self {
            EntityRef::Func(func) => func.usr,
            EntityRef::Type(ty) => ty.usr,
            EntityRef::Var(var) => var.usr,
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            EntityRef::Func(_) => Kind::Func,
            EntityRef::Type(_) => Kind::Type,
            EntityRef::Var(_) => Kind::Var,
        }
    }

    /// Definition spellings across every file that defines the entity.
    pub fn def_spells(&self) -> Vec<DeclRef> {
        match self {
            EntityRef::Func(func) => func.defs.iter().filter_map(QueryDef::spell).collect(),
            EntityRef::Type(ty) => ty.defs.iter().filter_map(QueryDef::spell).collect(),
            EntityRef::Var(var) => var.defs.iter().filter_map(QueryDef::spell).collect(),
        }
    }

    pub fn declarations(&self) -> &'a [DeclRef] {
        match *self {
            EntityRef::Func(func) => &func.declarations,
            EntityRef::Type(ty) => &ty.declarations,
            EntityRef::Var(var) => &var.declarations,
        }
    }

    pub fn uses(&self) -> &'a [Use] {
        match *self {
            EntityRef::Func(func) => &func.uses,
            EntityRef::Type(ty) => &ty.uses,
            EntityRef::Var(var) => &var.uses,
        }
    }
}

#[derive(Debug, Default)]
pub struct Db {
    files: Vec<QueryFile>,
    name2file_id: HashMap<String, FileId>,
    pub(crate) funcs: IndexMap<Usr, QueryFunc>,
    pub(crate) types: IndexMap<Usr, QueryType>,
    pub(crate) vars: IndexMap<Usr, QueryVar>,
}

impl Db {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[QueryFile] {
        &self.files
    }

    /// Panics if `id` was not issued by this store.
    pub fn file(&self, id: FileId) -> &QueryFile {
        &self.files[id.index()]
    }

    pub(crate) fn file_mut(&mut self, id: FileId) -> &mut QueryFile {
        &mut self.files[id.index()]
    }

    pub fn file_id(&self, path: &str) -> Option<FileId> {
        self.name2file_id.get(path).copied()
    }

    /// Resolve a path to an indexed file. Files that were removed from disk still
    /// resolve but carry no `def`.
    pub fn file_by_path(&self, path: &str) -> Result<&QueryFile, IndexError> {
        self.file_id(path)
            .map(|id| self.file(id))
            .ok_or_else(|| IndexError::FileNotFound {
                path: path.to_string(),
            })
    }

    pub(crate) fn get_or_create_file(&mut self, path: &str) -> FileId {
        if let Some(id) = self.file_id(path) {
            return id;
        }
        let id = FileId(self.files.len() as u32);
        self.files.push(QueryFile {
            id,
            path: path.to_string(),
            def: None,
            symbol2refcnt: BTreeMap::new(),
        });
        self.name2file_id.insert(path.to_string(), id);
        id
    }

    pub fn func(&self, usr: Usr) -> Result<&QueryFunc, IndexError> {
        self.funcs.get(&usr).ok_or(IndexError::NotFound {
            usr,
            kind: Kind::Func,
        })
    }

    pub fn type_(&self, usr: Usr) -> Result<&QueryType, IndexError> {
        self.types.get(&usr).ok_or(IndexError::NotFound {
            usr,
            kind: Kind::Type,
        })
    }

    pub fn var(&self, usr: Usr) -> Result<&QueryVar, IndexError> {
        self.vars.get(&usr).ok_or(IndexError::NotFound {
            usr,
            kind: Kind::Var,
        })
    }

    pub fn entity(&self, usr: Usr, kind: Kind) -> Result<EntityRef<'_>, IndexError> {
        match kind {
            Kind::Func => self.func(usr).map(EntityRef::Func),
            Kind::Type => self.type_(usr).map(EntityRef::Type),
            Kind::Var => self.var(usr).map(EntityRef::Var),
            Kind::File => Err(IndexError::NotFound { usr, kind }),
        }
    }

    pub fn path(&self, id: FileId) -> &str {
        &self.file(id).path
    }

    pub fn funcs(&self) -> impl Iterator<Item = &QueryFunc> + '_ {
        self.funcs.values()
    }

    pub fn types(&self) -> impl Iterator<Item = &QueryType> + '_ {
        self.types.values()
    }

    pub fn vars(&self) -> impl Iterator<Item = &QueryVar> + '_ {
        self.vars.values()
    }
}

/// Convert a file-local span into a store reference.
pub(crate) fn decl_ref(file_id: FileId, span: &DeclSpan, role: Role) -> DeclRef {
    DeclRef {
        file_id,
        range: span.range,
        extent: span.extent,
        role,
    }
}
