use serde_json::Value;
use ssb_msg::Msg;
use std::sync::Arc;

use crate::{bump::BumpVerdict, item::FeedItem};

/// Gates which roots may appear in the feed at all.
pub type RootFilter = Arc<dyn Fn(&Msg<Value>) -> bool + Send + Sync>;

/// Called with a message and its thread root.
pub type BumpFilter = Arc<dyn Fn(&Msg<Value>, &Msg<Value>) -> BumpVerdict + Send + Sync>;

/// Called with a message and, for replies, the item it is shown under.
pub type CompactFilter = Arc<dyn Fn(&Msg<Value>, Option<&FeedItem>) -> bool + Send + Sync>;

pub type DisplayFilter = Arc<dyn Fn(&Msg<Value>) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Filters {
    pub root: RootFilter,
    pub bump: BumpFilter,
    pub compact: CompactFilter,
    pub display: DisplayFilter,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            root: accept_all(),
            bump: accept_all_bumps(),
            compact: Arc::new(|_, _| false),
            display: accept_all(),
        }
    }
}

pub fn accept_all() -> Arc<dyn Fn(&Msg<Value>) -> bool + Send + Sync> {
    Arc::new(|_| true)
}

pub fn accept_all_bumps() -> BumpFilter {
    Arc::new(|_, _| BumpVerdict::Accept)
}
