//! Harvester core: pagination plan, canonical records and the pure harvest state machine.
mod effect;
mod error_log;
mod model;
mod msg;
mod plan;
mod records;
mod result;
mod state;
mod update;

pub use effect::Effect;
pub use error_log::{ErrorEntry, ErrorKind, ErrorLog};
pub use model::{
    CanonicalRecord, Dimensions, EdgeRecord, MediaKind, MediaRecord, NotificationFeed,
    ProfileInfo, StoryBundle, ThumbnailLink,
};
pub use msg::Msg;
pub use plan::PagePlan;
pub use records::RecordSet;
pub use result::{CollectionResult, HarvestStatus};
pub use state::{HarvestPhase, HarvestState, PageId};
pub use update::update;
