use lodestar_config::CodeLensConfig;
use lodestar_core::{Kind, Range};
use lodestar_ide::{CodeLens, QueryError, Xref};

use super::fixtures::{loc, project, project_with, r, usr, HEADER, SHAPES, SOURCE};

fn titles_at(lenses: &[CodeLens], range: Range) -> Vec<&str> {
    lenses
        .iter()
        .filter(|lens| lens.range == range)
        .map(|lens| lens.title.as_str())
        .collect()
}

#[test]
fn uses_without_bases_show_a_single_ref_lens() {
    let project = project();
    let lenses = project.query.code_lens(SOURCE);
    assert_eq!(titles_at(&lenses, r(3, 5, 8)), vec!["3 refs"]);

    let lens = lenses
        .iter()
        .find(|lens| lens.range == r(3, 5, 8))
        .unwrap();
    assert_eq!(
        lens.xref,
        Xref {
            usr: usr("foo"),
            kind: Kind::Func,
            field: "uses".into(),
        }
    );
}

#[test]
fn overriding_function_shows_bases_and_inherited_uses() {
    let project = project();
    let lenses = project.query.code_lens(SHAPES);
    assert_eq!(
        titles_at(&lenses, r(3, 5, 8)),
        vec!["1 run", "2 refs", "1 b.ref"]
    );
    assert_eq!(
        titles_at(&lenses, r(1, 5, 8)),
        vec!["1 ref", "2 d.refs", "1 derived"]
    );
}

#[test]
fn zero_counts_are_suppressed_unless_forced() {
    let project = project();
    let lenses = project.query.code_lens(SOURCE);
    // `Widget::draw` is never called; its ref lens is forced.
    assert_eq!(titles_at(&lenses, r(15, 13, 17)), vec!["0 ref"]);

    let header_lenses = project.query.code_lens(HEADER);
    assert_eq!(titles_at(&header_lenses, r(4, 7, 13)), vec!["1 ref", "1 var"]);
}

#[test]
fn local_variable_lenses_follow_config() {
    let project = project();
    assert_eq!(titles_at(&project.query.code_lens(SOURCE), r(4, 9, 10)), vec!["1 ref"]);

    let project = project_with(CodeLensConfig {
        local_variables: false,
    });
    assert!(titles_at(&project.query.code_lens(SOURCE), r(4, 9, 10)).is_empty());
}

#[test]
fn lenses_are_listed_once_per_range() {
    let project = project();
    let lenses = project.query.code_lens(SOURCE);
    let mut ranges: Vec<_> = lenses.iter().map(|lens| lens.range).collect();
    ranges.dedup();
    assert_eq!(ranges, vec![r(3, 5, 8), r(4, 9, 10), r(15, 13, 17)]);
}

#[test]
fn xref_expands_lens_commands() {
    let project = project();
    assert_eq!(
        project.query.xref(usr("Derived::run"), Kind::Func, "bases").unwrap(),
        vec![loc(SHAPES, r(1, 5, 8))]
    );
    assert_eq!(
        project
            .query
            .xref(usr("Base::run"), Kind::Func, "derived uses")
            .unwrap(),
        vec![loc(SHAPES, r(21, 0, 3)), loc(SHAPES, r(22, 0, 3))]
    );
    assert_eq!(
        project.query.xref(usr("Base::run"), Kind::Func, "derived").unwrap(),
        vec![loc(SHAPES, r(3, 5, 8))]
    );
    assert_eq!(
        project.query.xref(usr("Widget"), Kind::Type, "instances").unwrap(),
        vec![loc(SOURCE, r(4, 9, 10))]
    );
    assert_eq!(
        project.query.xref(usr("w"), Kind::Var, "uses").unwrap(),
        vec![loc(SOURCE, r(5, 2, 3))]
    );
}

#[test]
fn xref_on_unknown_symbols_is_empty_but_unknown_fields_are_rejected() {
    let project = project();
    assert!(project
        .query
        .xref(usr("nobody"), Kind::Func, "uses")
        .unwrap()
        .is_empty());

    let err = project
        .query
        .xref(usr("foo"), Kind::Func, "callers")
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidRequest { .. }), "{err:?}");
    assert!(project.query.xref(usr("w"), Kind::Var, "instances").is_err());
}

#[test]
fn xref_arguments_serialize_as_json() {
    let xref = Xref {
        usr: usr("foo"),
        kind: Kind::Func,
        field: "bases uses".into(),
    };
    let json = serde_json::to_value(&xref).unwrap();
    assert_eq!(json["kind"], "func");
    assert_eq!(json["field"], "bases uses");
    assert_eq!(json["usr"], usr("foo").to_raw());
}
