use serde::{Deserialize, Serialize};

/// Request schedule for one harvest: how many pages to ask for and how big.
///
/// `request_count` is only the starting value of the shared counter; the
/// running count lives in [`crate::HarvestState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PagePlan {
    pub request_count: u32,
    pub remainder_size: u32,
    pub page_size: u32,
}

impl PagePlan {
    /// Splits `total` wanted items into pages of `page_size`.
    ///
    /// A zero page size is treated as one so the plan is always finite.
    pub fn compute(total: u32, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        if total <= page_size {
            return Self {
                request_count: 1,
                remainder_size: total,
                page_size,
            };
        }

        let remainder_size = total % page_size;
        let request_count = total / page_size + u32::from(remainder_size > 0);
        Self {
            request_count,
            remainder_size,
            page_size,
        }
    }

    /// True when the plan asks for nothing (a total of zero).
    pub fn is_empty(&self) -> bool {
        self.request_count == 0 || (self.request_count == 1 && self.remainder_size == 0)
    }

    /// Size of the last page in the chain.
    pub fn final_page_size(&self) -> u32 {
        if self.remainder_size > 0 {
            self.remainder_size
        } else {
            self.page_size
        }
    }

    /// Fetch size for a page entered while `remaining` requests are left.
    pub fn size_for_remaining(&self, remaining: u32) -> u32 {
        if remaining > 1 {
            self.page_size
        } else {
            self.final_page_size()
        }
    }
}
