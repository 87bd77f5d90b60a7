use serde::{Deserialize, Serialize};
use serde_json::Value;
use ssb_msg::Msg;
use ssb_ref::MsgRef;
use std::ops::Deref;

/// The thread root attached to a message. `msg` is `None` when the root
/// could not be fetched or unboxed.
#[derive(Clone, Debug)]
pub struct Root {
    pub key: MsgRef,
    pub msg: Option<Msg<Value>>,
}

/// Metadata an upstream filter attaches to the messages it let through.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct FilterResult {
    #[serde(default)]
    pub matching_tags: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct RootedMsg {
    pub msg: Msg<Value>,
    pub root: Option<Root>,
    pub filter_result: Option<FilterResult>,
}

impl RootedMsg {
    pub fn key(&self) -> &MsgRef {
        &self.msg.key
    }

    /// The resolved root message, if one was attached and could be read.
    pub fn root_msg(&self) -> Option<&Msg<Value>> {
        self.root.as_ref().and_then(|root| root.msg.as_ref())
    }

    pub fn with_root(self, root: Root) -> Self {
        Self {
            root: Some(root),
            ..self
        }
    }

    pub fn with_filter_result(self, filter_result: FilterResult) -> Self {
        Self {
            filter_result: Some(filter_result),
            ..self
        }
    }
}

impl From<Msg<Value>> for RootedMsg {
    fn from(msg: Msg<Value>) -> Self {
        Self {
            msg,
            root: None,
            filter_result: None,
        }
    }
}

impl Deref for RootedMsg {
    type Target = Msg<Value>;

    fn deref(&self) -> &Self::Target {
        &self.msg
    }
}

/// One thread in the feed: its root and every reply the scan attached, in
/// the order the pipeline delivered them.
#[derive(Clone, Debug)]
pub struct FeedItem {
    pub msg: Msg<Value>,
    pub replies: Vec<RootedMsg>,
    pub filter_result: Option<FilterResult>,
}

impl FeedItem {
    pub fn key(&self) -> &MsgRef {
        &self.msg.key
    }

    /// The root key followed by every reply key.
    pub fn msg_ids(&self) -> Vec<MsgRef> {
        std::iter::once(self.msg.key.clone())
            .chain(self.replies.iter().map(|reply| reply.key().clone()))
            .collect()
    }
}
