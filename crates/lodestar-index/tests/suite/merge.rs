use lodestar_core::{Kind, Role};
use lodestar_index::{ExtentRef, IndexError, IndexFile, MergeEngine, MergeOutcome};

use super::fixtures::{canonical, header_and_source, r, span, usr};

#[test]
fn merged_occurrences_are_live_and_listed_once() {
    let engine = MergeEngine::default();
    let (header, source) = header_and_source();
    engine.merge(1, header);
    engine.merge(2, source);

    let db = engine.shared();
    let db = db.read();
    let file = db.file_by_path("/p/foo.cc").unwrap();
    let call = ExtentRef {
        range: r(7, 2, 5),
        usr: usr("foo"),
        kind: Kind::Func,
        role: Role::Reference,
        extent: None,
    };
    assert_eq!(file.symbol2refcnt.get(&call), Some(&1));

    let foo = db.func(usr("foo")).unwrap();
    assert_eq!(foo.uses.iter().filter(|site| site.range == call.range).count(), 1);
    assert_eq!(foo.defs.len(), 1);
    assert_eq!(foo.declarations.len(), 1);
    assert_eq!(db.path(foo.declarations[0].file_id), "/p/foo.h");
    assert_eq!(db.path(foo.defs[0].file_id), "/p/foo.cc");

    let widget = db.type_(usr("Widget")).unwrap();
    assert!(widget.instances.contains(usr("w")));
}

#[test]
fn remerging_identical_results_is_idempotent() {
    let engine = MergeEngine::default();
    let (header, source) = header_and_source();
    engine.merge(1, header.clone());
    engine.merge(2, source.clone());
    let before = canonical(&engine.shared().read());

    engine.merge(3, source);
    engine.merge(4, header);
    let after = canonical(&engine.shared().read());

    assert_eq!(before, after);
}

#[test]
fn merging_empty_result_purges_file_contributions() {
    let engine = MergeEngine::default();
    let (header, source) = header_and_source();
    engine.merge(1, header);
    engine.merge(2, source);

    engine.merge(3, IndexFile::empty("/p/foo.cc"));

    let shared = engine.shared();
    let db = shared.read();
    let file = db.file_by_path("/p/foo.cc").unwrap();
    assert!(file.symbol2refcnt.is_empty());

    // `foo` survives through its declaration in the header, minus the calls.
    let foo = db.func(usr("foo")).unwrap();
    assert!(foo.defs.is_empty());
    assert!(foo.uses.is_empty());
    assert_eq!(foo.declarations.len(), 1);

    // `w` was only ever spelled in foo.cc.
    assert_eq!(
        db.var(usr("w")).unwrap_err(),
        IndexError::NotFound {
            usr: usr("w"),
            kind: Kind::Var
        }
    );
    let widget = db.type_(usr("Widget")).unwrap();
    assert!(widget.uses.is_empty());
    assert!(widget.instances.is_empty());
}

#[test]
fn removed_file_keeps_its_id_but_loses_its_def() {
    let engine = MergeEngine::default();
    let (header, _) = header_and_source();
    let MergeOutcome::Applied { file_id, .. } = engine.merge(1, header) else {
        panic!("first merge must apply");
    };

    engine.remove_file(2, "/p/foo.h");

    let shared = engine.shared();
    let db = shared.read();
    let file = db.file_by_path("/p/foo.h").unwrap();
    assert_eq!(file.id, file_id);
    assert!(file.def.is_none());
    assert!(db.func(usr("foo")).is_err());
    assert!(db.type_(usr("Widget")).is_err());
    assert!(engine.snapshot("/p/foo.h").is_none());
}

#[test]
fn moved_definition_replaces_the_old_extent() {
    let engine = MergeEngine::default();
    let (_, mut source) = header_and_source();
    engine.merge(1, source.clone());

    let moved = span(4, 5, 8, 6);
    source.func_mut(usr("foo")).def.as_mut().unwrap().spell = Some(moved);
    engine.merge(2, source);

    let shared = engine.shared();
    let db = shared.read();
    let foo = db.func(usr("foo")).unwrap();
    assert_eq!(foo.defs.len(), 1);
    assert_eq!(foo.defs[0].spell().unwrap().range, moved.range);

    let file = db.file_by_path("/p/foo.cc").unwrap();
    let definitions: Vec<_> = file
        .live_symbols()
        .filter(|sym| sym.usr == usr("foo") && sym.role == Role::Definition)
        .collect();
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].extent, Some(moved.extent));
}

#[test]
fn relation_asserted_by_two_files_survives_one_retraction() {
    let engine = MergeEngine::default();
    let mut a = IndexFile::new("/p/a.cc", Vec::new(), 3);
    a.type_mut(usr("Base")).derived.push(usr("Derived"));
    let mut b = IndexFile::new("/p/b.cc", Vec::new(), 3);
    b.type_mut(usr("Base")).derived.push(usr("Derived"));
    b.type_mut(usr("Base")).uses.push(r(0, 0, 4));

    engine.merge(1, a);
    engine.merge(2, b);
    engine.remove_file(3, "/p/a.cc");

    let shared = engine.shared();
    let db = shared.read();
    let base = db.type_(usr("Base")).unwrap();
    assert!(base.derived.contains(usr("Derived")));

    drop(db);
    engine.remove_file(4, "/p/b.cc");
    assert!(engine.shared().read().type_(usr("Base")).is_err());
}
