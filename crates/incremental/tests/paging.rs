//! Integration tests for the paging operator.

use ripple_core::{PageRequest, PagedChangeSet};
use ripple_incremental::{ListStreamExt, SortComparer};
use ripple_reactive::{ChangeSetAggregator, SourceList, Subject};

struct Fixture {
    source: SourceList<u32>,
    requests: Subject<PageRequest>,
    results: ChangeSetAggregator<PagedChangeSet<u32>>,
}

impl Fixture {
    fn new() -> Self {
        let source = SourceList::new();
        let requests = Subject::new();
        let results = source
            .connect()
            .sort(SortComparer::ascending(|x: &u32| *x))
            .page(&requests.stream())
            .as_aggregator();
        Self {
            source,
            requests,
            results,
        }
    }

    fn request(&self, page: usize, size: usize) {
        self.requests.publish(PageRequest::new(page, size).unwrap());
    }

    fn last(&self) -> PagedChangeSet<u32> {
        self.results
            .messages()
            .pop()
            .expect("at least one page was emitted")
    }
}

#[test]
fn test_nothing_before_first_request() {
    let fixture = Fixture::new();
    fixture.source.add_range(1..=100);
    assert_eq!(fixture.results.message_count(), 0);

    fixture.request(1, 25);
    assert_eq!(fixture.results.message_count(), 1);
    assert_eq!(fixture.results.data(), (1..=25).collect::<Vec<_>>());
}

#[test]
fn test_change_page() {
    let fixture = Fixture::new();
    fixture.source.add_range(1..=100);
    fixture.request(1, 25);
    fixture.request(2, 25);

    let page = fixture.last();
    assert_eq!(page.response().page, 2);
    assert_eq!(page.changes().removes(), 25);
    assert_eq!(page.changes().adds(), 25);
    assert_eq!(fixture.results.data(), (26..=50).collect::<Vec<_>>());
}

#[test]
fn test_change_page_size() {
    let fixture = Fixture::new();
    fixture.source.add_range(1..=100);
    fixture.request(1, 25);
    fixture.request(1, 50);

    let page = fixture.last();
    assert_eq!(page.response().page_size, 50);
    assert_eq!(page.response().total_pages, 2);
    assert_eq!(page.changes().adds(), 25);
    assert_eq!(page.changes().removes(), 0);
    assert_eq!(fixture.results.data(), (1..=50).collect::<Vec<_>>());
}

#[test]
fn test_page_beyond_range_clamps_to_last() {
    let fixture = Fixture::new();
    fixture.source.add_range(1..=100);
    fixture.request(10, 25);

    let page = fixture.last();
    assert_eq!(page.response().page, 4);
    assert_eq!(page.items(), (76..=100).collect::<Vec<_>>().as_slice());
}

#[test]
fn test_insert_shifts_window() {
    let fixture = Fixture::new();
    fixture.source.add_range((1..=10).map(|x| x * 10));
    fixture.request(1, 3);

    fixture.source.add(5);
    let page = fixture.last();
    assert_eq!(page.items(), &[5, 10, 20]);
    assert_eq!(page.changes().removes(), 1);
    assert_eq!(page.changes().adds(), 1);
    assert_eq!(fixture.results.data(), vec![5, 10, 20]);
}

#[test]
fn test_change_outside_window_updates_metadata_only() {
    let fixture = Fixture::new();
    fixture.source.add_range(1..=10);
    fixture.request(1, 5);

    fixture.source.add(50);
    let page = fixture.last();
    assert!(page.changes().is_empty());
    assert_eq!(page.response().total_items, 11);
    assert_eq!(page.response().total_pages, 3);
    assert_eq!(fixture.results.message_count(), 2);
}

#[test]
fn test_removing_everything_empties_page() {
    let fixture = Fixture::new();
    fixture.source.add_range(1..=10);
    fixture.request(2, 5);
    fixture.source.clear();

    let page = fixture.last();
    assert!(page.items().is_empty());
    assert_eq!(page.response().page, 1);
    assert_eq!(page.response().total_pages, 0);
    assert!(fixture.results.data().is_empty());
}

#[test]
fn test_fixed_request() {
    let source = SourceList::with_items((1..=7).collect::<Vec<u32>>());
    let results = source
        .connect()
        .page_with(PageRequest::new(2, 3).unwrap())
        .as_aggregator();

    assert_eq!(results.data(), vec![4, 5, 6]);
    source.remove_at(0).unwrap();
    assert_eq!(results.data(), vec![5, 6, 7]);
}

#[test]
fn test_invalid_request_is_rejected() {
    assert!(PageRequest::new(0, 10).unwrap_err().is_configuration());
    assert!(PageRequest::new(1, 0).unwrap_err().is_configuration());
}
