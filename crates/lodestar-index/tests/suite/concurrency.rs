use std::sync::Arc;
use std::thread;

use lodestar_index::{IndexFile, MergeEngine};
use proptest::prelude::*;

use super::fixtures::{canonical, header_and_source, isolated_file};

fn files() -> Vec<IndexFile> {
    let (header, source) = header_and_source();
    let mut files = vec![header, source];
    for (i, prefix) in ["alpha", "beta", "gamma", "delta"].into_iter().enumerate() {
        files.push(isolated_file(prefix, i as u32 + 1));
    }
    files
}

fn merge_in_order(order: &[usize]) -> Vec<String> {
    let files = files();
    let engine = MergeEngine::default();
    for (generation, &i) in order.iter().enumerate() {
        engine.merge(generation as u64, files[i].clone());
    }
    let shared = engine.shared();
    let db = shared.read();
    canonical(&db)
}

#[test]
fn concurrent_merges_match_sequential_merge() {
    let files = files();
    let sequential = merge_in_order(&(0..files.len()).collect::<Vec<_>>());

    let engine = Arc::new(MergeEngine::default());
    let handles: Vec<_> = files
        .into_iter()
        .enumerate()
        .map(|(generation, file)| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.merge(generation as u64, file))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let shared = engine.shared();
    let concurrent = canonical(&shared.read());
    assert_eq!(concurrent, sequential);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn merge_order_does_not_matter(order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()) {
        let baseline = merge_in_order(&(0..6).collect::<Vec<_>>());
        prop_assert_eq!(merge_in_order(&order), baseline);
    }

    #[test]
    fn retracting_a_file_undoes_its_merge(victim in 0..6usize) {
        let files = files();
        let engine = MergeEngine::default();
        for (generation, file) in files.iter().enumerate() {
            if generation != victim {
                engine.merge(generation as u64, file.clone());
            }
        }
        let without = canonical(&engine.shared().read());

        engine.merge(10, files[victim].clone());
        engine.merge(11, IndexFile::empty(files[victim].path.clone()));
        let mut retracted = canonical(&engine.shared().read());

        // The retracted file itself stays known, only without facts.
        let own_line = format!("file {} ", files[victim].path);
        retracted.retain(|line| !line.starts_with(&own_line));
        prop_assert_eq!(retracted, without);
    }
}
