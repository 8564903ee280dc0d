use std::sync::Once;
use std::time::Duration;

use chrono::Utc;
use harvester_core::{
    update, CanonicalRecord, EdgeRecord, Effect, ErrorKind, HarvestPhase, HarvestState,
    HarvestStatus, Msg, PageId, PagePlan,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn start(total: u32, page_size: u32) -> (HarvestState, Vec<Effect>) {
    update(
        HarvestState::new(PagePlan::compute(total, page_size)),
        Msg::Start {
            cursor: String::new(),
        },
    )
}

fn fetched(state: HarvestState, page: PageId, cursor: &str, has_more: bool) -> (HarvestState, Vec<Effect>) {
    update(
        state,
        Msg::PageFetched {
            page,
            next_cursor: Some(cursor.to_string()),
            has_more,
            item_count: 0,
        },
    )
}

fn fetch_sizes(effects: &[Effect]) -> Vec<(PageId, u32)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::FetchPage {
                page, page_size, ..
            } => Some((*page, *page_size)),
            _ => None,
        })
        .collect()
}

fn edge(id: &str) -> CanonicalRecord {
    CanonicalRecord::Edge(EdgeRecord {
        id: id.to_string(),
        username: format!("user_{id}"),
        full_name: format!("User {id}"),
        small_avatar_url: format!("https://cdn.example.com/{id}.jpg"),
        verified: false,
        followed_by_viewer: false,
        requested_by_viewer: false,
    })
}

#[test]
fn chain_of_three_pages_uses_remainder_last() {
    init_logging();
    let (state, effects) = start(120, 50);
    assert_eq!(fetch_sizes(&effects), vec![(1, 50)]);
    assert_eq!(state.remaining(), 3);

    let (state, effects) = fetched(state, 1, "c1", true);
    assert_eq!(fetch_sizes(&effects), vec![(2, 50)]);
    assert_eq!(state.remaining(), 2);

    let (state, effects) = fetched(state, 2, "c2", true);
    assert_eq!(fetch_sizes(&effects), vec![(3, 20)]);
    assert_eq!(state.remaining(), 1);

    // The service still reports more, but the plan is exhausted.
    let (state, effects) = fetched(state, 3, "c3", true);
    assert!(effects.is_empty());
    assert_eq!(state.remaining(), 0);
    assert_eq!(state.in_flight(), 3);
}

#[test]
fn continuation_carries_next_cursor() {
    let (state, _) = start(100, 50);
    let (_state, effects) = fetched(state, 1, "QVFD", true);
    assert_eq!(
        effects,
        vec![Effect::FetchPage {
            page: 2,
            cursor: "QVFD".to_string(),
            page_size: 50,
        }]
    );
}

#[test]
fn end_of_collection_closes_chain_early() {
    let (state, _) = start(500, 50);
    let (state, effects) = update(
        state,
        Msg::PageFetched {
            page: 1,
            next_cursor: None,
            has_more: false,
            item_count: 12,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.remaining(), 0);
    assert_eq!(state.pages_fetched(), 1);
}

#[test]
fn empty_cursor_is_treated_as_end() {
    let (state, _) = start(500, 50);
    let (state, effects) = fetched(state, 1, "", true);
    assert!(effects.is_empty());
    assert_eq!(state.remaining(), 0);
}

#[test]
fn drain_finishes_when_last_page_exits() {
    let (state, _) = start(100, 50);
    let (state, _) = fetched(state, 1, "c1", true);
    let (state, effects) = update(state, Msg::DrainRequested);
    assert!(effects.is_empty());
    assert_eq!(state.phase(), HarvestPhase::Draining);

    let (state, effects) = update(state, Msg::PageFinished { page: 1 });
    assert!(effects.is_empty());
    let (state, effects) = update(state, Msg::PageFinished { page: 2 });
    assert_eq!(effects, vec![Effect::Drained]);
    assert!(state.is_done());
}

#[test]
fn malformed_page_keeps_records_from_earlier_pages() {
    let (state, _) = start(150, 50);
    let (state, _) = fetched(state, 1, "c1", true);
    let (state, _) = update(
        state,
        Msg::RecordsNormalized {
            page: 1,
            records: vec![edge("1"), edge("2")],
        },
    );
    let (state, effects) = update(
        state,
        Msg::PageFailed {
            page: 2,
            kind: ErrorKind::Malformed,
            message: "missing page_info".to_string(),
            at: Utc::now(),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.remaining(), 0);
    assert_eq!(state.status(), HarvestStatus::Complete);

    let result = state.into_result(Duration::from_millis(5));
    assert_eq!(result.count(), 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::Malformed);
}

#[test]
fn not_found_cancels_siblings_and_sticks() {
    let (state, _) = start(150, 50);
    let (state, effects) = update(
        state,
        Msg::PageFailed {
            page: 1,
            kind: ErrorKind::NotFound,
            message: "NOT_FOUND <42>".to_string(),
            at: Utc::now(),
        },
    );
    assert_eq!(effects, vec![Effect::CancelSiblings]);
    assert_eq!(state.status(), HarvestStatus::NotFound);

    // A late success from another page must not restart the chain.
    let (state, effects) = fetched(state, 1, "c1", true);
    assert!(effects.is_empty());
    assert_eq!(state.status(), HarvestStatus::NotFound);
}

#[test]
fn cancellation_stops_spawning() {
    let (state, _) = start(150, 50);
    let (state, _) = update(state, Msg::CancelRequested { at: Utc::now() });
    let (state, effects) = fetched(state, 1, "c1", true);
    assert!(effects.is_empty());
    assert_eq!(state.status(), HarvestStatus::Cancelled);
    assert_eq!(state.errors().entries()[0].kind, ErrorKind::Cancelled);
}

#[test]
fn same_page_twice_counts_distinct_records() {
    let (state, _) = start(50, 50);
    let page = vec![edge("1"), edge("2"), edge("3"), edge("2")];
    let (state, _) = update(
        state,
        Msg::RecordsNormalized {
            page: 1,
            records: page.clone(),
        },
    );
    let (state, _) = update(
        state,
        Msg::RecordsNormalized {
            page: 1,
            records: page,
        },
    );
    assert_eq!(state.records().len(), 3);
}

#[test]
fn repeated_rate_limit_logs_once() {
    let (state, _) = start(50, 50);
    let mut state = state;
    for _ in 0..5 {
        let (next, _) = update(
            state,
            Msg::ErrorRaised {
                kind: ErrorKind::RateLimited,
                message: "RATE_LIMITED [media] <42>".to_string(),
                at: Utc::now(),
            },
        );
        state = next;
    }
    assert_eq!(state.errors().len(), 1);
}

#[test]
fn page_finished_counts_each_live_page_once() {
    let (state, _) = start(120, 50);
    let (state, _) = fetched(state, 1, "c1", true);
    assert_eq!(state.in_flight(), 2);

    let (state, effects) = update(state, Msg::PageFinished { page: 1 });
    assert!(effects.is_empty());
    let (state, effects) = update(state, Msg::PageFinished { page: 1 });
    assert!(effects.is_empty());
    let (state, effects) = update(state, Msg::PageFinished { page: 9 });
    assert!(effects.is_empty());
    assert_eq!(state.in_flight(), 1);
    assert_eq!(state.phase(), HarvestPhase::Fetching);

    // Page 2 is still live, so its continuation is allowed.
    let (state, effects) = fetched(state, 2, "c2", true);
    assert_eq!(fetch_sizes(&effects), vec![(3, 20)]);

    let (state, _) = update(state, Msg::PageFinished { page: 2 });
    let (state, effects) = update(state, Msg::PageFinished { page: 3 });
    assert_eq!(effects, vec![Effect::Drained]);
    assert!(state.is_done());
}

#[test]
fn late_fetch_after_done_spawns_nothing() {
    let (state, _) = start(120, 50);
    let (state, _) = update(state, Msg::PageFinished { page: 1 });
    assert!(state.is_done());

    let (state, effects) = fetched(state, 1, "c1", true);
    assert!(effects.is_empty());
    assert_eq!(state.pages_fetched(), 0);
}

#[test]
fn forbidden_page_mid_harvest_cancels_siblings_and_keeps_records() {
    let (state, _) = start(150, 50);
    let (state, _) = fetched(state, 1, "c1", true);
    let (state, _) = update(
        state,
        Msg::RecordsNormalized {
            page: 1,
            records: vec![edge("1"), edge("2")],
        },
    );
    let (state, effects) = update(
        state,
        Msg::PageFailed {
            page: 2,
            kind: ErrorKind::PrivateOrInaccessible,
            message: "PRIVATE_USER".to_string(),
            at: Utc::now(),
        },
    );
    assert_eq!(effects, vec![Effect::CancelSiblings]);
    assert_eq!(state.status(), HarvestStatus::Inaccessible);
    assert_eq!(state.remaining(), 0);

    // A later malformed page does not overwrite the terminal status.
    let (state, _) = update(
        state,
        Msg::PageFailed {
            page: 2,
            kind: ErrorKind::Malformed,
            message: "missing edges".to_string(),
            at: Utc::now(),
        },
    );
    assert_eq!(state.status(), HarvestStatus::Inaccessible);

    let result = state.into_result(Duration::from_millis(1));
    assert_eq!(result.status, HarvestStatus::Inaccessible);
    assert_eq!(result.count(), 2);
}
