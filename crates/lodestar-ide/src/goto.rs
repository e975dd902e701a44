use lodestar_core::{Kind, Position};
use lodestar_index::{Db, DeclRef, EntityRef, QueryFile, QueryType};

use crate::symbols::{smallest_symbols_at, symbols_at};
use crate::{Location, Locations};

fn entity<'db>(db: &'db Db, usr: lodestar_core::Usr, kind: Kind) -> Option<EntityRef<'db>> {
    match db.entity(usr, kind) {
        Ok(entity) => Some(entity),
        Err(err) => {
            tracing::trace!(target: "lodestar.ide", error = %err, "symbol not indexed");
            None
        }
    }
}

fn under_cursor(decl: &DeclRef, file: &QueryFile, pos: Position) -> bool {
    decl.file_id == file.id && decl.range.contains(pos)
}

/// Non-defining declarations, minus the one the cursor is on.
fn other_declarations<'a>(
    entity: &EntityRef<'a>,
    file: &'a QueryFile,
    pos: Position,
) -> impl Iterator<Item = &'a DeclRef> + 'a {
    entity
        .declarations()
        .iter()
        .filter(move |decl| !under_cursor(decl, file, pos))
}

/// Non-defining declarations. A variable with none of its own stands in for
/// its type: the first definition spelling of the first typed def.
fn declaration_targets(db: &Db, entity: &EntityRef<'_>) -> Vec<DeclRef> {
    let declarations = entity.declarations();
    if !declarations.is_empty() {
        return declarations.to_vec();
    }
    let EntityRef::Var(var) = *entity else {
        return Vec::new();
    };
    var.defs
        .iter()
        .filter_map(|def| def.def.type_usr)
        .find_map(|type_usr| {
            let ty = db.type_(type_usr).ok()?;
            EntityRef::Type(ty).def_spells().into_iter().next()
        })
        .into_iter()
        .collect()
}

pub(crate) fn definition(db: &Db, file: &QueryFile, pos: Position) -> Vec<Location> {
    let mut out = Locations::new(db);
    for sym in smallest_symbols_at(file, pos) {
        let Some(entity) = entity(db, sym.usr, sym.kind) else {
            continue;
        };

        // Standing on a definition jumps to its declarations instead.
        let mut on_def = None;
        let mut targets = Vec::new();
        for spell in entity.def_spells() {
            if under_cursor(&spell, file, pos) {
                on_def = Some(spell);
                targets.clear();
                break;
            }
            targets.push(spell);
        }

        if targets.is_empty() {
            targets.extend(
                declaration_targets(db, &entity)
                    .into_iter()
                    .filter(|decl| !under_cursor(decl, file, pos)),
            );
        }

        if targets.is_empty() {
            targets.extend(on_def);
        }

        out.extend(targets.iter().map(|decl| (decl.file_id, decl.range)));
    }
    out.finish()
}

pub(crate) fn declaration(db: &Db, file: &QueryFile, pos: Position) -> Vec<Location> {
    let mut out = Locations::new(db);
    for sym in symbols_at(file, pos) {
        let Some(entity) = entity(db, sym.usr, sym.kind) else {
            continue;
        };
        out.extend(
            other_declarations(&entity, file, pos).map(|decl| (decl.file_id, decl.range)),
        );
    }
    out.finish()
}

/// Definition spellings of `ty`, or its declarations when it has none.
fn push_type(out: &mut Locations<'_>, ty: &QueryType) {
    let spells = EntityRef::Type(ty).def_spells();
    if spells.is_empty() {
        out.extend(ty.declarations.iter().map(|decl| (decl.file_id, decl.range)));
    } else {
        out.extend(spells.iter().map(|decl| (decl.file_id, decl.range)));
    }
}

pub(crate) fn type_definition(db: &Db, file: &QueryFile, pos: Position) -> Vec<Location> {
    let mut out = Locations::new(db);
    for sym in symbols_at(file, pos) {
        match entity(db, sym.usr, sym.kind) {
            Some(EntityRef::Var(var)) => {
                let ty = var
                    .any_def()
                    .and_then(|def| def.type_usr)
                    .and_then(|usr| db.type_(usr).ok());
                if let Some(ty) = ty {
                    push_type(&mut out, ty);
                }
            }
            Some(EntityRef::Type(ty)) => {
                let aliased = ty
                    .defs
                    .iter()
                    .find_map(|def| def.def.alias_of)
                    .and_then(|usr| db.type_(usr).ok());
                if let Some(aliased) = aliased {
                    push_type(&mut out, aliased);
                }
            }
            Some(EntityRef::Func(_)) | None => {}
        }
    }
    out.finish()
}

pub(crate) fn references(
    db: &Db,
    file: &QueryFile,
    pos: Position,
    include_declaration: bool,
) -> Vec<Location> {
    let mut out = Locations::new(db);
    for sym in smallest_symbols_at(file, pos) {
        let Some(entity) = entity(db, sym.usr, sym.kind) else {
            continue;
        };
        if include_declaration {
            out.extend(
                entity
                    .def_spells()
                    .iter()
                    .map(|decl| (decl.file_id, decl.range)),
            );
            out.extend(
                entity
                    .declarations()
                    .iter()
                    .map(|decl| (decl.file_id, decl.range)),
            );
        }
        out.extend(entity.uses().iter().map(|site| (site.file_id, site.range)));
    }
    out.finish()
}
