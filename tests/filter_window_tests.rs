//! Property-based tests for the rank window.
//!
//! Windows and record levels are drawn from the default table; the filter
//! must agree with a direct rank comparison for every combination.

use proptest::prelude::*;
use scribelog::{
    FilterBuildError, FilterWindow, LevelTable, LevelWindowBuilder, ScribeFilter, ScribeRecord,
    SharedLevelTable, StandardLevel, accepts,
};

fn level() -> impl Strategy<Value = StandardLevel> {
    proptest::sample::select(StandardLevel::ALL.to_vec())
}

proptest! {
    #[test]
    fn window_matches_rank_comparison(min in level(), max in level(), level in level()) {
        let table = LevelTable::default();
        let built = FilterWindow::new(&table, min.as_str(), Some(max.as_str()));
        if min > max {
            let is_invalid = matches!(built, Err(FilterBuildError::InvalidWindow { .. }));
            prop_assert!(is_invalid);
        } else {
            let window = built.expect("ordered window");
            let record = ScribeRecord::new("svc", level.as_str(), "msg");
            let expected = min.default_rank() <= level.default_rank()
                && level.default_rank() <= max.default_rank();
            prop_assert_eq!(accepts(&record, &window, &table), expected);
        }
    }

    #[test]
    fn unknown_levels_never_pass(name in "[a-z]{3,12}") {
        prop_assume!(name.parse::<StandardLevel>().is_err());
        let table = LevelTable::default();
        let window = FilterWindow::new(&table, "error", None).expect("full window");
        let record = ScribeRecord::new("svc", &name, "msg");
        prop_assert!(!accepts(&record, &window, &table));
    }

    #[test]
    fn case_and_padding_do_not_matter(record in level(), upper in any::<bool>()) {
        let name = if upper {
            format!(" {} ", record.as_str().to_ascii_uppercase())
        } else {
            record.as_str().to_owned()
        };
        let filter = LevelWindowBuilder::new()
            .with_min("error")
            .build(&SharedLevelTable::default())
            .expect("full window");
        prop_assert!(filter.should_log(&ScribeRecord::new("svc", &name, "msg")));
    }
}

#[test]
fn replacing_the_table_reranks_existing_filters() {
    let levels = SharedLevelTable::default();
    let filter = LevelWindowBuilder::new()
        .with_min("error")
        .with_max("info")
        .build(&levels)
        .expect("valid window");
    let record = ScribeRecord::new("svc", "debug", "msg");
    assert!(!filter.should_log(&record));

    let reordered = LevelTable::new([("error", 0), ("debug", 1), ("info", 2)])
        .expect("valid table");
    levels.replace_all(reordered);
    assert!(filter.should_log(&record));

    let without_info = LevelTable::new([("error", 0), ("debug", 1)]).expect("valid table");
    levels.replace_all(without_info);
    assert!(!filter.should_log(&record));
}
