//! Which messages bump a thread, and as what.

use serde_json::Value;
use ssb_msg::Msg;
use std::collections::HashMap;

use crate::{filter::BumpFilter, item::FeedItem};

/// Types that bump a root even when it has no replies yet.
pub const ROOT_BUMP_TYPES: [&str; 2] = ["mention", "channel-mention"];

/// Bump type a channel filter reports for roots it matched by tag.
pub const MATCHES_CHANNEL: &str = "matches-channel";

/// What a bump filter says about one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BumpVerdict {
    Reject,
    /// Bumps as its own content type.
    Accept,
    Typed(String),
}

impl BumpVerdict {
    pub fn accepts(&self) -> bool {
        !matches!(self, BumpVerdict::Reject)
    }
}

impl From<bool> for BumpVerdict {
    fn from(accept: bool) -> Self {
        if accept {
            BumpVerdict::Accept
        } else {
            BumpVerdict::Reject
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Bump {
    NoBump,
    Bump(String),
}

impl Bump {
    pub fn bump_type(&self) -> Option<&str> {
        match self {
            Bump::NoBump => None,
            Bump::Bump(bump_type) => Some(bump_type),
        }
    }
}

/// Resolves a verdict into a bump type. Accepted messages without a content
/// type have nothing to group under, so they do not bump.
pub fn classify(filter: &BumpFilter, msg: &Msg<Value>, root: &Msg<Value>) -> Bump {
    match filter(msg, root) {
        BumpVerdict::Reject => Bump::NoBump,
        BumpVerdict::Typed(bump_type) => Bump::Bump(bump_type),
        BumpVerdict::Accept => match msg.content_type() {
            Some(content_type) => Bump::Bump(content_type.to_string()),
            None => Bump::NoBump,
        },
    }
}

pub fn is_root_bump(bump_type: &str) -> bool {
    ROOT_BUMP_TYPES.contains(&bump_type)
}

/// i18n key describing what a bump of this type did.
pub fn description(bump_type: &str) -> &'static str {
    match bump_type {
        "vote" => "liked this message",
        "post" => "replied to this message",
        "about" => "added changes",
        "mention" => "mentioned you",
        "channel-mention" => "mentioned this channel",
        _ => "added changes",
    }
}

/// Bumping messages of one feed item, grouped by type. Built per render.
#[derive(Debug)]
pub struct BumpGroups<'a> {
    pub root_bump: Bump,
    groups: HashMap<String, Vec<&'a Msg<Value>>>,
    latest: Option<String>,
}

impl<'a> BumpGroups<'a> {
    /// Classifies the root and then every reply in arrival order; the last
    /// bumping reply picks the group the meta line describes.
    pub fn collect(item: &'a FeedItem, filter: &BumpFilter) -> Self {
        let mut groups: HashMap<String, Vec<&'a Msg<Value>>> = HashMap::new();
        let mut latest = None;

        let root_bump = classify(filter, &item.msg, &item.msg);
        if let Some(bump_type) = root_bump.bump_type().filter(|t| is_root_bump(t)) {
            groups.insert(bump_type.to_string(), vec![&item.msg]);
            latest = Some(bump_type.to_string());
        }

        for reply in &item.replies {
            if let Bump::Bump(bump_type) = classify(filter, &reply.msg, &item.msg) {
                groups.entry(bump_type.clone()).or_default().insert(0, &reply.msg);
                latest = Some(bump_type);
            }
        }

        Self {
            root_bump,
            groups,
            latest,
        }
    }

    /// The latest bump type and the messages grouped under it, newest first.
    pub fn latest(&self) -> Option<(&str, &[&'a Msg<Value>])> {
        let bump_type = self.latest.as_deref()?;
        let group = self.groups.get(bump_type)?;
        Some((bump_type, group.as_slice()))
    }

    pub fn group(&self, bump_type: &str) -> &[&'a Msg<Value>] {
        self.groups.get(bump_type).map_or(&[], Vec::as_slice)
    }
}
