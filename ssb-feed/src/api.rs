//! The collaborators a feed needs from its host.

use futures::{future::BoxFuture, stream::BoxStream};
use serde_json::Value;
use ssb_msg::{Msg, MsgValue};
use ssb_ref::{FeedRef, MsgRef};
use std::sync::Arc;

use crate::{item::RootedMsg, view::Node, Error};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderOptions {
    pub previous_id: Option<MsgRef>,
    pub compact: bool,
    /// 2 for items new since the last refresh, 1 for unread, 0 otherwise.
    pub priority: u8,
    pub include_forks: bool,
}

pub trait Render: Send + Sync {
    fn can_render(&self, msg: &Msg<Value>) -> bool;

    fn render(&self, msg: &Msg<Value>, options: &RenderOptions) -> Option<Node>;

    /// Placeholder for a message that is referenced but could not be found.
    fn missing(&self, key: Option<&MsgRef>, context: &Msg<Value>) -> Node;

    fn person(&self, author: &FeedRef) -> Node;

    fn channel_link(&self, channel: &str) -> Node;
}

pub trait MessageSync: Send + Sync {
    fn is_blocked(&self, _msg: &Msg<Value>) -> bool {
        false
    }

    /// Decrypts boxed content, `None` when it is not for us.
    fn unbox(&self, _value: MsgValue<Value>) -> Option<MsgValue<Value>> {
        None
    }

    /// Replies name their root; votes hang off the message they vote on.
    fn root_of(&self, msg: &Msg<Value>) -> Option<MsgRef> {
        msg.value.root().or_else(|| msg.value.vote_link())
    }

    fn timestamp_of(&self, msg: &Msg<Value>) -> f64 {
        msg.value.timestamp_asserted
    }

    /// True when the message was already surfaced somewhere else.
    fn external_handler(&self, _msg: &Msg<Value>) -> bool {
        false
    }
}

pub trait MessageStore: Send + Sync {
    fn get(&self, key: MsgRef) -> BoxFuture<'_, Result<MsgValue<Value>, Error>>;

    /// Every message linking back to `root` as its thread root.
    fn replies(&self, root: MsgRef) -> BoxFuture<'_, Result<Vec<RootedMsg>, Error>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageQuery {
    pub reverse: bool,
    pub limit: usize,
    /// Only messages received strictly before this timestamp.
    pub lt: Option<f64>,
}

/// Where a feed reads its messages from.
pub trait FeedSource: Send + Sync {
    fn page(&self, query: PageQuery) -> BoxFuture<'_, Result<Vec<RootedMsg>, Error>>;

    /// Messages as they arrive, starting now.
    fn live(&self) -> BoxStream<'static, RootedMsg>;
}

pub trait Intl: Send + Sync {
    fn i18n(&self, key: &str) -> String;

    /// Fills `%s` in `template` with `n`.
    fn i18n_plural(&self, template: &str, n: usize) -> String;
}

#[derive(Clone)]
pub struct Api {
    pub render: Arc<dyn Render>,
    pub sync: Arc<dyn MessageSync>,
    pub store: Arc<dyn MessageStore>,
    pub intl: Arc<dyn Intl>,
    pub local_id: FeedRef,
}

/// Message handling with no blocking, no private keys and no external handlers.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSync;

impl MessageSync for DefaultSync {}

/// Keys are English already, so lookups return them as they are.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnglishIntl;

impl Intl for EnglishIntl {
    fn i18n(&self, key: &str) -> String {
        key.to_string()
    }

    fn i18n_plural(&self, template: &str, n: usize) -> String {
        template.replace("%s", &n.to_string())
    }
}
