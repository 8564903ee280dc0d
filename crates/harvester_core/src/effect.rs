use crate::PageId;

/// Side effects requested by [`crate::update`]; the engine executes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Spawn a page task for `cursor`, asking for `page_size` items.
    FetchPage {
        page: PageId,
        cursor: String,
        page_size: u32,
    },
    /// Abort every other in-flight page of this harvest.
    CancelSiblings,
    /// The last in-flight page finished; the harvest can be assembled.
    Drained,
}
