use lodestar_core::Range;
use lodestar_ide::QueryError;

use super::fixtures::{loc, pos, project, r, NAV};

#[test]
fn up_moves_to_the_enclosing_extent() {
    let project = project();
    assert_eq!(
        project.query.navigate(NAV, pos(3, 10), Some("U")).unwrap(),
        vec![loc(NAV, r(3, 4, 20))]
    );
    assert_eq!(
        project.query.navigate(NAV, pos(3, 4), Some("U")).unwrap(),
        vec![loc(NAV, Range::from_coords(2, 2, 5, 3))]
    );
    assert!(project.query.navigate(NAV, pos(0, 0), Some("U")).unwrap().is_empty());
}

#[test]
fn direction_defaults_to_up() {
    let project = project();
    assert_eq!(
        project.query.navigate(NAV, pos(3, 4), None).unwrap(),
        project.query.navigate(NAV, pos(3, 4), Some("U")).unwrap()
    );
}

#[test]
fn empty_direction_moves_up() {
    let project = project();
    assert_eq!(
        project.query.navigate(NAV, pos(3, 10), Some("")).unwrap(),
        vec![loc(NAV, r(3, 4, 20))]
    );
}

#[test]
fn down_enters_the_first_nested_extent() {
    let project = project();
    assert_eq!(
        project.query.navigate(NAV, pos(0, 0), Some("D")).unwrap(),
        vec![loc(NAV, Range::from_coords(2, 2, 5, 3))]
    );
    assert_eq!(
        project.query.navigate(NAV, pos(2, 2), Some("D")).unwrap(),
        vec![loc(NAV, r(3, 4, 20))]
    );
}

#[test]
fn right_skips_the_current_construct() {
    let project = project();
    assert_eq!(
        project.query.navigate(NAV, pos(2, 2), Some("R")).unwrap(),
        vec![loc(NAV, Range::from_coords(7, 2, 10, 3))]
    );
}

#[test]
fn left_moves_to_the_previous_sibling() {
    let project = project();
    assert_eq!(
        project.query.navigate(NAV, pos(7, 2), Some("L")).unwrap(),
        vec![loc(NAV, Range::from_coords(2, 2, 5, 3))]
    );
}

#[test]
fn navigation_is_deterministic() {
    let project = project();
    for direction in ["U", "D", "L", "R"] {
        let first = project.query.navigate(NAV, pos(4, 0), Some(direction)).unwrap();
        for _ in 0..8 {
            assert_eq!(
                project.query.navigate(NAV, pos(4, 0), Some(direction)).unwrap(),
                first
            );
        }
    }
}

#[test]
fn unknown_direction_is_an_invalid_request() {
    let project = project();
    let err = project.query.navigate(NAV, pos(0, 0), Some("X")).unwrap_err();
    assert!(matches!(err, QueryError::InvalidRequest { .. }), "{err:?}");
}

#[test]
fn unknown_file_navigates_nowhere() {
    let project = project();
    assert!(project
        .query
        .navigate("/p/missing.cc", pos(0, 0), Some("D"))
        .unwrap()
        .is_empty());
}
