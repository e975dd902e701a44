use lodestar_core::Range;
use lodestar_index::{DeclSpan, IndexFile};

use super::fixtures::{func, loc, project, r, usr, BAR, HEADER, SHAPES, SOURCE};

#[test]
fn source_toggles_to_its_header() {
    let project = project();
    assert_eq!(
        project.query.toggle_source_header(SOURCE),
        Some(loc(HEADER, Range::default()))
    );
    // `foo` and `Widget::draw` are both declared there.
    assert_eq!(
        project.query.rank_source_header(SOURCE),
        vec![(HEADER.to_string(), 2)]
    );
}

#[test]
fn header_toggles_to_the_most_similar_source() {
    let project = project();
    assert_eq!(
        project.query.toggle_source_header(HEADER),
        Some(loc(SOURCE, Range::default()))
    );
    assert_eq!(
        project.query.rank_source_header(HEADER),
        vec![(SOURCE.to_string(), 33), (BAR.to_string(), 0)]
    );
}

#[test]
fn equal_scores_keep_first_seen_order() {
    let project = project();
    let mut header = IndexFile::new("/p/util.hh", Vec::new(), 5);
    header
        .func_mut(usr("f1"))
        .declarations
        .push(DeclSpan::new(r(1, 5, 7), r(1, 0, 9)));
    header
        .func_mut(usr("f2"))
        .declarations
        .push(DeclSpan::new(r(2, 5, 7), r(2, 0, 9)));
    let mut a = IndexFile::new("/p/a.cc", Vec::new(), 5);
    let spell = DeclSpan::new(r(1, 5, 7), r(1, 0, 9));
    a.func_mut(usr("f1")).def = Some(func("f1", spell, Vec::new()));
    let mut b = IndexFile::new("/p/b.cc", Vec::new(), 5);
    b.func_mut(usr("f2")).def = Some(func("f2", spell, Vec::new()));

    project.merge.merge(10, b);
    project.merge.merge(11, a);
    project.merge.merge(12, header);

    let ranked = project.query.rank_source_header("/p/util.hh");
    assert_eq!(
        ranked,
        vec![("/p/a.cc".to_string(), -300), ("/p/b.cc".to_string(), -300)]
    );
}

#[test]
fn implementation_without_declarations_elsewhere_does_not_toggle() {
    let project = project();
    assert_eq!(project.query.toggle_source_header(SHAPES), None);
    assert_eq!(project.query.toggle_source_header("/p/missing.hh"), None);
}
