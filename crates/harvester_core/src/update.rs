use crate::{
    Effect, ErrorEntry, ErrorKind, HarvestPhase, HarvestState, HarvestStatus, Msg,
};

/// Pure update function: applies a message to harvest state and returns any effects.
pub fn update(mut state: HarvestState, msg: Msg) -> (HarvestState, Vec<Effect>) {
    let effects = match msg {
        Msg::Start { cursor } => {
            if state.phase != HarvestPhase::Planning {
                return (state, Vec::new());
            }
            if state.plan.is_empty() {
                state.close_chain();
                state.phase = HarvestPhase::Done;
                return (state, vec![Effect::Drained]);
            }
            state.phase = HarvestPhase::Fetching;
            let page_size = state.plan.size_for_remaining(state.remaining);
            let page = state.allocate_page();
            vec![Effect::FetchPage {
                page,
                cursor,
                page_size,
            }]
        }
        Msg::PageFetched {
            page,
            next_cursor,
            has_more,
            ..
        } => {
            if state.phase == HarvestPhase::Done || !state.live.contains(&page) {
                return (state, Vec::new());
            }
            state.pages_fetched += 1;
            let next_cursor = next_cursor.filter(|cursor| !cursor.is_empty());
            match next_cursor {
                Some(cursor) if has_more && state.status == HarvestStatus::Complete => {
                    state.remaining = state.remaining.saturating_sub(1);
                    if state.remaining > 0 {
                        let page_size = state.plan.size_for_remaining(state.remaining);
                        let page = state.allocate_page();
                        vec![Effect::FetchPage {
                            page,
                            cursor,
                            page_size,
                        }]
                    } else {
                        Vec::new()
                    }
                }
                _ => {
                    // End of collection, or a terminal status already closed it.
                    state.close_chain();
                    Vec::new()
                }
            }
        }
        Msg::RecordsNormalized { records, .. } => {
            for record in records {
                state.records.insert(record);
            }
            Vec::new()
        }
        Msg::ErrorRaised { kind, message, at } => {
            state.errors.record(ErrorEntry::new(kind, message, at));
            Vec::new()
        }
        Msg::PageFailed {
            kind, message, at, ..
        } => {
            state.errors.record(ErrorEntry::new(kind, message, at));
            // Pages form a single chain, so a dead lineage ends it.
            state.close_chain();
            match kind {
                ErrorKind::NotFound => {
                    state.set_terminal(HarvestStatus::NotFound);
                    vec![Effect::CancelSiblings]
                }
                ErrorKind::PrivateOrInaccessible => {
                    state.set_terminal(HarvestStatus::Inaccessible);
                    vec![Effect::CancelSiblings]
                }
                ErrorKind::Cancelled => {
                    state.set_terminal(HarvestStatus::Cancelled);
                    Vec::new()
                }
                _ => Vec::new(),
            }
        }
        Msg::PageFinished { page } => {
            if !state.finish_page(page) {
                return (state, Vec::new());
            }
            if state.live.is_empty() && state.phase != HarvestPhase::Done {
                state.phase = HarvestPhase::Done;
                vec![Effect::Drained]
            } else {
                Vec::new()
            }
        }
        Msg::DrainRequested => match state.phase {
            HarvestPhase::Fetching if !state.live.is_empty() => {
                state.phase = HarvestPhase::Draining;
                Vec::new()
            }
            HarvestPhase::Done => Vec::new(),
            _ => {
                state.phase = HarvestPhase::Done;
                vec![Effect::Drained]
            }
        },
        Msg::CancelRequested { at } => {
            state.close_chain();
            state.set_terminal(HarvestStatus::Cancelled);
            state.errors.record(ErrorEntry::new(
                ErrorKind::Cancelled,
                "CANCELLED",
                at,
            ));
            Vec::new()
        }
    };

    (state, effects)
}
