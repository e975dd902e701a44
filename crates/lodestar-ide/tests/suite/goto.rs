use lodestar_config::CodeLensConfig;
use lodestar_ide::QueryEngine;
use lodestar_index::{DeclSpan, IndexFile, MergeEngine, VarDef, VarKind};

use super::fixtures::{header, loc, pos, project, r, source, usr, HEADER, SOURCE};

#[test]
fn definition_from_a_call_site() {
    let project = project();
    assert_eq!(
        project.query.goto_definition(SOURCE, pos(10, 3)),
        vec![loc(SOURCE, r(3, 5, 8))]
    );
}

#[test]
fn definition_and_declaration_point_at_each_other() {
    let project = project();
    assert_eq!(
        project.query.goto_definition(SOURCE, pos(3, 6)),
        vec![loc(HEADER, r(2, 5, 8))]
    );
    assert_eq!(
        project.query.goto_definition(HEADER, pos(2, 6)),
        vec![loc(SOURCE, r(3, 5, 8))]
    );
}

#[test]
fn variable_definition_without_declarations_jumps_to_its_type() {
    let project = project();
    assert_eq!(
        project.query.goto_definition(SOURCE, pos(4, 9)),
        vec![loc(HEADER, r(4, 7, 13))]
    );
}

#[test]
fn lone_definition_stays_put() {
    let project = project();
    assert_eq!(
        project.query.goto_definition(HEADER, pos(4, 8)),
        vec![loc(HEADER, r(4, 7, 13))]
    );
}

#[test]
fn declaration_skips_the_one_under_the_cursor() {
    let project = project();
    assert_eq!(
        project.query.goto_declaration(SOURCE, pos(10, 3)),
        vec![loc(HEADER, r(2, 5, 8))]
    );
    assert!(project.query.goto_declaration(HEADER, pos(2, 6)).is_empty());
}

#[test]
fn type_definition_of_variables_and_aliases() {
    let project = project();
    assert_eq!(
        project.query.goto_type_definition(SOURCE, pos(5, 2)),
        vec![loc(HEADER, r(4, 7, 13))]
    );
    assert_eq!(
        project.query.goto_type_definition(HEADER, pos(10, 9)),
        vec![loc(HEADER, r(4, 7, 13))]
    );
    assert!(project.query.goto_type_definition(SOURCE, pos(10, 3)).is_empty());
}

#[test]
fn references_optionally_include_declarations() {
    let project = project();
    let uses = vec![
        loc(SOURCE, r(10, 2, 5)),
        loc(SOURCE, r(11, 2, 5)),
        loc(SOURCE, r(12, 2, 5)),
    ];
    assert_eq!(project.query.find_references(SOURCE, pos(11, 4), false), uses);

    let mut all = vec![loc(SOURCE, r(3, 5, 8)), loc(HEADER, r(2, 5, 8))];
    all.extend(uses);
    assert_eq!(project.query.find_references(SOURCE, pos(11, 4), true), all);
}

#[test]
fn unknown_files_and_empty_positions_yield_nothing() {
    let project = project();
    assert!(project.query.goto_definition("/p/missing.cc", pos(0, 0)).is_empty());
    assert!(project.query.goto_definition(SOURCE, pos(25, 0)).is_empty());
    assert!(project.query.symbols_at("/p/missing.cc", pos(0, 0)).is_empty());
}

#[test]
fn removed_files_stop_answering() {
    let project = project();
    project.merge.remove_file(100, SOURCE);

    assert!(project.query.goto_definition(SOURCE, pos(10, 3)).is_empty());
    assert!(project.query.goto_definition(HEADER, pos(2, 6)).is_empty());
}

#[test]
fn results_past_the_indexed_end_of_a_file_are_dropped() {
    let merge = MergeEngine::default();
    merge.merge(0, header());
    merge.merge(1, source());
    let mut stale = IndexFile::new("/p/stale.cc", Vec::new(), 5);
    stale.func_mut(usr("foo")).uses.push(r(7, 0, 3));
    merge.merge(2, stale);

    let query = QueryEngine::new(merge.shared(), CodeLensConfig::default());
    let refs = query.find_references(SOURCE, pos(10, 3), false);
    assert_eq!(refs.len(), 3);
    assert!(refs.iter().all(|location| location.path == SOURCE));
}

/// `/p/g.cc`: `extern Widget g;` on line 1, a use of `g` on line 3. The
/// variable's only def record has no spelling.
fn extern_variable(with_declaration: bool) -> IndexFile {
    let mut file = IndexFile::new("/p/g.cc", Vec::new(), 10);
    let g = file.var_mut(usr("g"));
    g.def = Some(VarDef {
        detailed_name: "Widget g".to_string(),
        short_name: "g".to_string(),
        spell: None,
        type_usr: Some(usr("Widget")),
        kind: VarKind::Global,
    });
    if with_declaration {
        g.declarations
            .push(DeclSpan::new(r(1, 14, 15), r(1, 0, 15)));
    }
    g.uses.push(r(3, 2, 3));
    file
}

#[test]
fn declared_variable_does_not_jump_to_its_type() {
    let project = project();
    project.merge.merge(100, extern_variable(true));

    assert!(project.query.goto_definition("/p/g.cc", pos(1, 14)).is_empty());
    assert_eq!(
        project.query.goto_definition("/p/g.cc", pos(3, 2)),
        vec![loc("/p/g.cc", r(1, 14, 15))]
    );
}

#[test]
fn undeclared_variable_jumps_to_its_type() {
    let project = project();
    project.merge.merge(100, extern_variable(false));

    assert_eq!(
        project.query.goto_definition("/p/g.cc", pos(3, 2)),
        vec![loc(HEADER, r(4, 7, 13))]
    );
}
