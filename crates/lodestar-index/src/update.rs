//! Deltas between two parse results of one file, and their application to the
//! entity store.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use lodestar_core::{Kind, Range, Role, Usr};

use crate::db::{decl_ref, Db, ExtentRef, FileDef, FileId, QueryDef, QueryEntity, Relation, Use};
use crate::model::{DeclSpan, EntityDef, FuncDef, IndexFile, TypeDef, VarDef};

/// Elements dropped from and added to a per-file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDelta<T> {
    pub removed: Vec<T>,
    pub added: Vec<T>,
}

impl<T> Default for ListDelta<T> {
    fn default() -> Self {
        Self {
            removed: Vec::new(),
            added: Vec::new(),
        }
    }
}

impl<T: Ord + Clone> ListDelta<T> {
    /// Set difference in both directions. Duplicates within one list collapse.
    pub fn between(prev: &[T], cur: &[T]) -> Self {
        let prev: BTreeSet<&T> = prev.iter().collect();
        let cur: BTreeSet<&T> = cur.iter().collect();
        Self {
            removed: prev.difference(&cur).map(|item| (*item).clone()).collect(),
            added: cur.difference(&prev).map(|item| (*item).clone()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// What happens to the definition a file contributes for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefChange<D> {
    Unchanged,
    Set(D),
    Remove,
}

impl<D: PartialEq + Clone> DefChange<D> {
    fn between(prev: Option<&D>, cur: Option<&D>) -> Self {
        match (prev, cur) {
            (Some(prev), Some(cur)) if prev == cur => DefChange::Unchanged,
            (_, Some(cur)) => DefChange::Set(cur.clone()),
            (Some(_), None) => DefChange::Remove,
            (None, None) => DefChange::Unchanged,
        }
    }
}

/// Changes one file makes to one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDelta<D> {
    pub def: DefChange<D>,
    pub declarations: ListDelta<DeclSpan>,
    pub uses: ListDelta<Range>,
    pub derived: ListDelta<Usr>,
    pub instances: ListDelta<Usr>,
}

impl<D> EntityDelta<D> {
    fn is_empty(&self) -> bool {
        matches!(self.def, DefChange::Unchanged)
            && self.declarations.is_empty()
            && self.uses.is_empty()
            && self.derived.is_empty()
            && self.instances.is_empty()
    }

    fn creates_facts(&self) -> bool {
        matches!(self.def, DefChange::Set(_))
            || !self.declarations.added.is_empty()
            || !self.uses.added.is_empty()
            || !self.derived.added.is_empty()
            || !self.instances.added.is_empty()
    }
}

/// Per-file view of an entity, used to diff two parse results generically.
struct EntityFacts<'a, D> {
    def: Option<&'a D>,
    declarations: &'a [DeclSpan],
    uses: &'a [Range],
    derived: &'a [Usr],
    instances: &'a [Usr],
}

impl<D> Default for EntityFacts<'_, D> {
    fn default() -> Self {
        Self {
            def: None,
            declarations: &[],
            uses: &[],
            derived: &[],
            instances: &[],
        }
    }
}

/// Everything needed to move the store from one parse result of a file to the
/// next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexUpdate {
    pub path: String,
    /// `None` retracts the file.
    pub file_def: Option<FileDef>,
    /// `-1` for every previous occurrence and `+1` for every current one,
    /// summed per occurrence.
    pub refcnt_delta: BTreeMap<ExtentRef, i32>,
    pub funcs: BTreeMap<Usr, EntityDelta<FuncDef>>,
    pub types: BTreeMap<Usr, EntityDelta<TypeDef>>,
    pub vars: BTreeMap<Usr, EntityDelta<VarDef>>,
}

impl IndexUpdate {
    /// Delta from `prev` (the file's last merged result, if any) to `cur`.
    pub fn create_delta(prev: Option<&IndexFile>, cur: &IndexFile) -> Self {
        let mut refcnt_delta = BTreeMap::new();
        if let Some(prev) = prev {
            for sym in extent_refs(prev) {
                *refcnt_delta.entry(sym).or_insert(0) -= 1;
            }
        }
        for sym in extent_refs(cur) {
            *refcnt_delta.entry(sym).or_insert(0) += 1;
        }

        let funcs = diff_entities(
            prev.map(|prev| &prev.funcs),
            &cur.funcs,
            |func| EntityFacts {
                def: func.def.as_ref(),
                declarations: &func.declarations,
                uses: &func.uses,
                derived: &func.derived,
                instances: &[],
            },
        );
        let types = diff_entities(prev.map(|prev| &prev.types), &cur.types, |ty| {
            EntityFacts {
                def: ty.def.as_ref(),
                declarations: &ty.declarations,
                uses: &ty.uses,
                derived: &ty.derived,
                instances: &ty.instances,
            }
        });
        let vars = diff_entities(prev.map(|prev| &prev.vars), &cur.vars, |var| {
            EntityFacts {
                def: var.def.as_ref(),
                declarations: &var.declarations,
                uses: &var.uses,
                derived: &[],
                instances: &[],
            }
        });

        Self {
            path: cur.path.clone(),
            file_def: Some(FileDef {
                args: cur.args.clone(),
                line_count: cur.line_count,
                dependencies: cur.dependencies.keys().cloned().collect(),
            }),
            refcnt_delta,
            funcs,
            types,
            vars,
        }
    }

    /// Delta that purges everything `prev` contributed for `path`.
    pub fn retract(path: &str, prev: Option<&IndexFile>) -> Self {
        let mut update = Self::create_delta(prev, &IndexFile::empty(path));
        update.file_def = None;
        update
    }

    /// Number of entities whose facts change.
    pub fn changed_entities(&self) -> usize {
        self.funcs.len() + self.types.len() + self.vars.len()
    }
}

fn diff_entities<'a, E, D>(
    prev: Option<&'a BTreeMap<Usr, E>>,
    cur: &'a BTreeMap<Usr, E>,
    facts: impl Fn(&'a E) -> EntityFacts<'a, D>,
) -> BTreeMap<Usr, EntityDelta<D>>
where
    D: PartialEq + Clone + 'a,
{
    let mut usrs: BTreeSet<Usr> = cur.keys().copied().collect();
    if let Some(prev) = prev {
        usrs.extend(prev.keys().copied());
    }

    let mut deltas = BTreeMap::new();
    for usr in usrs {
        let before = prev
            .and_then(|prev| prev.get(&usr))
            .map(&facts)
            .unwrap_or_default();
        let after = cur.get(&usr).map(&facts).unwrap_or_default();
        let delta = EntityDelta {
            def: DefChange::between(before.def, after.def),
            declarations: ListDelta::between(before.declarations, after.declarations),
            uses: ListDelta::between(before.uses, after.uses),
            derived: ListDelta::between(before.derived, after.derived),
            instances: ListDelta::between(before.instances, after.instances),
        };
        if !delta.is_empty() {
            deltas.insert(usr, delta);
        }
    }
    deltas
}

/// Every distinct occurrence a parse result contributes to its file's table.
fn extent_refs(file: &IndexFile) -> BTreeSet<ExtentRef> {
    let mut out = BTreeSet::new();
    for func in file.funcs.values() {
        push_occurrences(
            &mut out,
            (func.usr, Kind::Func),
            func.def.as_ref(),
            &func.declarations,
            &func.uses,
        );
    }
    for ty in file.types.values() {
        push_occurrences(
            &mut out,
            (ty.usr, Kind::Type),
            ty.def.as_ref(),
            &ty.declarations,
            &ty.uses,
        );
    }
    for var in file.vars.values() {
        push_occurrences(
            &mut out,
            (var.usr, Kind::Var),
            var.def.as_ref(),
            &var.declarations,
            &var.uses,
        );
    }
    out
}

fn push_occurrences<D: EntityDef>(
    out: &mut BTreeSet<ExtentRef>,
    (usr, kind): (Usr, Kind),
    def: Option<&D>,
    declarations: &[DeclSpan],
    uses: &[Range],
) {
    if let Some(spell) = def.and_then(|def| def.spell()) {
        out.insert(ExtentRef {
            range: spell.range,
            usr,
            kind,
            role: Role::Definition,
            extent: Some(spell.extent),
        });
    }
    for decl in declarations {
        out.insert(ExtentRef {
            range: decl.range,
            usr,
            kind,
            role: Role::Declaration,
            extent: Some(decl.extent),
        });
    }
    for range in uses {
        out.insert(ExtentRef {
            range: *range,
            usr,
            kind,
            role: Role::Reference,
            extent: None,
        });
    }
}

/// Counts reported by [`Db::apply_index_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub file_id: FileId,
    pub entities_changed: usize,
    pub entities_removed: usize,
}

impl Db {
    /// Fold `update` into the store and return the file it was applied to.
    ///
    /// Unknown entities named only by removals are skipped. Entities left with no
    /// facts at all are deleted.
    pub fn apply_index_update(&mut self, update: &IndexUpdate) -> ApplyStats {
        let file_id = self.get_or_create_file(&update.path);

        let file = self.file_mut(file_id);
        for (sym, delta) in &update.refcnt_delta {
            *file.symbol2refcnt.entry(*sym).or_insert(0) += delta;
        }
        file.symbol2refcnt.retain(|_, refcnt| *refcnt > 0);
        file.def = update.file_def.clone();

        let mut removed = 0;
        removed += apply_entities(&mut self.funcs, file_id, &update.funcs);
        removed += apply_entities(&mut self.types, file_id, &update.types);
        removed += apply_entities(&mut self.vars, file_id, &update.vars);

        ApplyStats {
            file_id,
            entities_changed: update.changed_entities(),
            entities_removed: removed,
        }
    }
}

fn apply_entities<E: QueryEntity>(
    table: &mut IndexMap<Usr, E>,
    file_id: FileId,
    deltas: &BTreeMap<Usr, EntityDelta<E::Def>>,
) -> usize {
    let mut removed = 0;
    for (&usr, delta) in deltas {
        let entity = if delta.creates_facts() {
            table.entry(usr).or_insert_with(|| E::new(usr))
        } else {
            match table.get_mut(&usr) {
                Some(entity) => entity,
                None => {
                    tracing::trace!(
                        target: "lodestar.index",
                        usr = %usr,
                        kind = %E::KIND,
                        "retraction for unknown entity ignored"
                    );
                    continue;
                }
            }
        };

        apply_def(entity.defs_mut(), file_id, &delta.def);

        let declarations = entity.declarations_mut();
        for span in &delta.declarations.removed {
            let target = decl_ref(file_id, span, Role::Declaration);
            declarations.retain(|decl| *decl != target);
        }
        for span in &delta.declarations.added {
            let decl = decl_ref(file_id, span, Role::Declaration);
            if !declarations.contains(&decl) {
                declarations.push(decl);
            }
        }

        let uses = entity.uses_mut();
        for range in &delta.uses.removed {
            let target = reference(file_id, *range);
            uses.retain(|site| *site != target);
        }
        for range in &delta.uses.added {
            let site = reference(file_id, *range);
            if !uses.contains(&site) {
                uses.push(site);
            }
        }

        apply_relation(entity, Relation::Derived, &delta.derived);
        apply_relation(entity, Relation::Instances, &delta.instances);

        if entity.is_dead() {
            table.swap_remove(&usr);
            removed += 1;
        }
    }
    removed
}

fn apply_def<D: Clone>(defs: &mut Vec<QueryDef<D>>, file_id: FileId, change: &DefChange<D>) {
    match change {
        DefChange::Unchanged => {}
        DefChange::Set(def) => {
            match defs.iter_mut().find(|existing| existing.file_id == file_id) {
                Some(existing) => existing.def = def.clone(),
                None => defs.push(QueryDef {
                    file_id,
                    def: def.clone(),
                }),
            }
        }
        DefChange::Remove => defs.retain(|existing| existing.file_id != file_id),
    }
}

fn apply_relation<E: QueryEntity>(entity: &mut E, relation: Relation, delta: &ListDelta<Usr>) {
    if delta.is_empty() {
        return;
    }
    let Some(set) = entity.relation_mut(relation) else {
        return;
    };
    for usr in &delta.removed {
        set.remove(*usr);
    }
    for usr in &delta.added {
        set.insert(*usr);
    }
}

fn reference(file_id: FileId, range: Range) -> Use {
    Use {
        file_id,
        range,
        role: Role::Reference,
    }
}
