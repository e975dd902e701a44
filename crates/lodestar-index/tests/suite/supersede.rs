use lodestar_index::{IndexFile, MergeEngine, MergeOutcome};

use super::fixtures::{r, usr};

fn version(uses: u32) -> IndexFile {
    let mut file = IndexFile::new("/p/edit.cc", Vec::new(), 20);
    let func = file.func_mut(usr("edited"));
    for line in 0..uses {
        func.uses.push(r(line, 0, 6));
    }
    file
}

#[test]
fn older_generation_is_rejected_after_newer_merge() {
    let engine = MergeEngine::new(true);

    assert!(matches!(engine.merge(5, version(3)), MergeOutcome::Applied { .. }));
    assert_eq!(
        engine.merge(4, version(1)),
        MergeOutcome::Superseded { latest: 5 }
    );

    let uses = engine.shared().read().func(usr("edited")).unwrap().uses.len();
    assert_eq!(uses, 3);
}

#[test]
fn stale_retraction_is_rejected_too() {
    let engine = MergeEngine::new(true);
    engine.merge(2, version(2));

    assert_eq!(
        engine.remove_file(1, "/p/edit.cc"),
        MergeOutcome::Superseded { latest: 2 }
    );
    assert!(engine.shared().read().func(usr("edited")).is_ok());
}

#[test]
fn last_completed_merge_wins_when_not_rejecting() {
    let engine = MergeEngine::new(false);
    engine.merge(5, version(3));

    assert!(matches!(engine.merge(4, version(1)), MergeOutcome::Applied { .. }));
    let uses = engine.shared().read().func(usr("edited")).unwrap().uses.len();
    assert_eq!(uses, 1);

    // The newest generation seen is still remembered.
    engine.merge(6, version(2));
    assert_eq!(engine.snapshot("/p/edit.cc").unwrap().funcs[&usr("edited")].uses.len(), 2);
}
