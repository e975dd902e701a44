//! Builders for parse results and a canonical dump of the entity store that is
//! independent of merge order.

use lodestar_core::{Range, Usr};
use lodestar_index::{
    Db, DeclRef, DeclSpan, FileId, FuncDef, IndexFile, RelationSet, TypeDef, Use, VarDef, VarKind,
};

pub fn usr(name: &str) -> Usr {
    Usr::from_qualified_name(name)
}

pub fn r(line: u32, start: u32, end: u32) -> Range {
    Range::from_coords(line, start, line, end)
}

pub fn span(line: u32, start: u32, end: u32, end_line: u32) -> DeclSpan {
    DeclSpan::new(r(line, start, end), Range::from_coords(line, 0, end_line, 1))
}

pub fn func_def(name: &str, spell: DeclSpan) -> FuncDef {
    FuncDef {
        detailed_name: format!("void {name}()"),
        short_name: name.to_string(),
        spell: Some(spell),
        bases: Vec::new(),
    }
}

pub fn type_def(name: &str, spell: DeclSpan) -> TypeDef {
    TypeDef {
        detailed_name: format!("struct {name}"),
        short_name: name.to_string(),
        spell: Some(spell),
        ..TypeDef::default()
    }
}

pub fn var_def(name: &str, spell: DeclSpan, type_usr: Option<Usr>) -> VarDef {
    VarDef {
        detailed_name: format!("int {name}"),
        short_name: name.to_string(),
        spell: Some(spell),
        type_usr,
        kind: VarKind::Global,
    }
}

/// `foo.h` declares `foo()` and `struct Widget`; `foo.cc` defines `foo()` and
/// calls it twice.
pub fn header_and_source() -> (IndexFile, IndexFile) {
    let mut header = IndexFile::new("/p/foo.h", Vec::new(), 5);
    header
        .func_mut(usr("foo"))
        .declarations
        .push(span(1, 5, 8, 1));
    header.type_mut(usr("Widget")).def = Some(type_def("Widget", span(3, 7, 13, 3)));

    let mut source = IndexFile::new("/p/foo.cc", vec!["-std=c++17".into()], 12);
    let foo = source.func_mut(usr("foo"));
    foo.def = Some(func_def("foo", span(2, 5, 8, 4)));
    foo.uses.push(r(7, 2, 5));
    foo.uses.push(r(8, 2, 5));
    source.type_mut(usr("Widget")).uses.push(r(6, 0, 6));
    let w = source.var_mut(usr("w"));
    w.def = Some(var_def("w", span(6, 7, 8, 6), Some(usr("Widget"))));
    source.type_mut(usr("Widget")).instances.push(usr("w"));

    (header, source)
}

/// A standalone file touching only symbols prefixed with `prefix`.
pub fn isolated_file(prefix: &str, n: u32) -> IndexFile {
    let mut file = IndexFile::new(format!("/p/{prefix}.cc"), Vec::new(), n + 2);
    for i in 0..n {
        let name = format!("{prefix}::f{i}");
        let func = file.func_mut(usr(&name));
        func.def = Some(func_def(&name, span(i, 5, 7, i)));
        func.uses.push(r(i, 10, 12));
    }
    // A symbol shared with every other isolated file.
    file.func_mut(usr("shared")).uses.push(r(n, 0, 6));
    file
}

fn path_of(db: &Db, id: FileId) -> String {
    db.path(id).to_string()
}

fn decls(db: &Db, decls: &[DeclRef]) -> Vec<String> {
    let mut out: Vec<String> = decls
        .iter()
        .map(|decl| format!("{}@{}/{}", path_of(db, decl.file_id), decl.range, decl.extent))
        .collect();
    out.sort();
    out
}

fn uses(db: &Db, uses: &[Use]) -> Vec<String> {
    let mut out: Vec<String> = uses
        .iter()
        .map(|site| format!("{}@{}", path_of(db, site.file_id), site.range))
        .collect();
    out.sort();
    out
}

fn relations(set: &RelationSet) -> Vec<Usr> {
    set.iter().collect()
}

/// Every observable fact of the store, with file ids replaced by paths and all
/// lists sorted.
pub fn canonical(db: &Db) -> Vec<String> {
    let mut out = Vec::new();
    for func in db.funcs() {
        let mut defs: Vec<String> = func
            .defs
            .iter()
            .map(|def| format!("{}:{:?}", path_of(db, def.file_id), def.def))
            .collect();
        defs.sort();
        out.push(format!(
            "func {} defs={defs:?} decls={:?} uses={:?} derived={:?}",
            func.usr,
            decls(db, &func.declarations),
            uses(db, &func.uses),
            relations(&func.derived)
        ));
    }
    for ty in db.types() {
        let mut defs: Vec<String> = ty
            .defs
            .iter()
            .map(|def| format!("{}:{:?}", path_of(db, def.file_id), def.def))
            .collect();
        defs.sort();
        out.push(format!(
            "type {} defs={defs:?} decls={:?} uses={:?} derived={:?} instances={:?}",
            ty.usr,
            decls(db, &ty.declarations),
            uses(db, &ty.uses),
            relations(&ty.derived),
            relations(&ty.instances)
        ));
    }
    for var in db.vars() {
        let mut defs: Vec<String> = var
            .defs
            .iter()
            .map(|def| format!("{}:{:?}", path_of(db, def.file_id), def.def))
            .collect();
        defs.sort();
        out.push(format!(
            "var {} defs={defs:?} decls={:?} uses={:?}",
            var.usr,
            decls(db, &var.declarations),
            uses(db, &var.uses)
        ));
    }
    for file in db.files() {
        out.push(format!(
            "file {} def={:?} symbols={:?}",
            file.path, file.def, file.symbol2refcnt
        ));
    }
    out.sort();
    out
}
