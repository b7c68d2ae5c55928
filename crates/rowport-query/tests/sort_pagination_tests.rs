//! Caller-side sort toggling and page navigation

use pretty_assertions::assert_eq;
use rowport_query::{Pagination, QueryBuildError, SortDirection, SortSpec, SortState};

#[test]
fn sort_cycles_through_three_states() {
    let mut state = SortState::new();
    assert_eq!(state.current(), None);

    assert_eq!(state.toggle("name"), Some(&SortSpec::asc("name")));
    assert_eq!(state.toggle("name"), Some(&SortSpec::desc("name")));
    assert_eq!(state.toggle("name"), None);
    assert_eq!(state.toggle("name"), Some(&SortSpec::asc("name")));
}

#[test]
fn switching_column_resets_previous_column() {
    let mut state = SortState::new();
    state.toggle("name");
    state.toggle("name");
    assert_eq!(state.direction_for("name"), Some(SortDirection::Descending));

    assert_eq!(state.toggle("email"), Some(&SortSpec::asc("email")));
    assert_eq!(state.direction_for("name"), None);
    assert_eq!(state.direction_for("email"), Some(SortDirection::Ascending));

    // Coming back to the first column starts over
    assert_eq!(state.toggle("name"), Some(&SortSpec::asc("name")));
}

#[test]
fn first_page_has_no_previous() {
    let pagination = Pagination::new(250, 100).unwrap();
    assert!(!pagination.has_previous(1));
    assert!(pagination.has_next(1));
    assert!(pagination.has_previous(3));
    assert!(!pagination.has_next(3));
}

#[test]
fn page_beyond_maximum_is_rejected() {
    let pagination = Pagination::new(250, 100).unwrap();
    assert_eq!(pagination.max_page(), 3);
    assert_eq!(
        pagination.request(4),
        Err(QueryBuildError::PageOutOfRange {
            page: 4,
            max_page: 3
        })
    );
    assert!(matches!(
        pagination.request(0),
        Err(QueryBuildError::PageOutOfRange { page: 0, .. })
    ));

    let last = pagination.request(3).unwrap();
    assert_eq!(last.offset(), 200);
    assert_eq!(last.limit(), 100);
}

#[test]
fn empty_table_has_a_single_page() {
    let pagination = Pagination::new(0, 50).unwrap();
    assert_eq!(pagination.max_page(), 1);
    assert!(pagination.request(1).is_ok());
    assert!(!pagination.has_next(1));
    assert!(pagination.request(2).is_err());
}
