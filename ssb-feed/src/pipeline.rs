//! Stream stages turning a message scan into feed items.
//!
//! Two compositions share the same stages: a prefiltered scan whose items are
//! already roots, and a bump scan that rolls replies up under their roots.

use futures::{future::ready, stream::BoxStream, StreamExt};
use log::{debug, trace};
use serde_json::Value;
use ssb_msg::Msg;
use ssb_ref::MsgRef;
use std::collections::HashSet;

use crate::{
    api::Api,
    filter::{BumpFilter, RootFilter},
    item::{FeedItem, RootedMsg},
    lookup::fetch_root,
};

#[derive(Clone)]
pub struct Pipeline {
    pub api: Api,
    pub root_filter: RootFilter,
    pub bump_filter: BumpFilter,
    pub concurrency: usize,
}

impl Pipeline {
    pub fn compose(
        &self,
        stream: BoxStream<'static, RootedMsg>,
        prefiltered: bool,
    ) -> BoxStream<'static, FeedItem> {
        let stream = stream.filter(|msg| ready(msg.has_content())).boxed();
        if prefiltered {
            self.prefiltered(stream)
        } else {
            self.bumped(stream)
        }
    }

    fn prefiltered(&self, stream: BoxStream<'static, RootedMsg>) -> BoxStream<'static, FeedItem> {
        trace!("Composing prefiltered scan");
        let api = self.api.clone();
        let root_filter = self.root_filter.clone();
        let stream = stream
            .filter(move |msg| ready(!api.sync.is_blocked(msg)))
            .filter(move |msg| ready(root_filter(&msg.msg)))
            .boxed();
        with_replies(unique(stream, self.api.clone()), self.api.clone(), self.concurrency)
    }

    fn bumped(&self, stream: BoxStream<'static, RootedMsg>) -> BoxStream<'static, FeedItem> {
        trace!("Composing bump scan");
        let bump_filter = self.bump_filter.clone();
        let stream = stream
            .filter(move |msg| ready(bump_filter(&msg.msg, &msg.msg).accepts()))
            .boxed();
        rollup(
            stream,
            self.api.clone(),
            self.root_filter.clone(),
            self.concurrency,
        )
    }
}

fn thread_key(api: &Api, msg: &Msg<Value>) -> MsgRef {
    api.sync.root_of(msg).unwrap_or_else(|| msg.key.clone())
}

/// Keeps the first message seen for each thread.
pub fn unique(stream: BoxStream<'static, RootedMsg>, api: Api) -> BoxStream<'static, RootedMsg> {
    let mut seen: HashSet<MsgRef> = HashSet::new();
    stream
        .filter(move |msg| ready(seen.insert(thread_key(&api, msg))))
        .boxed()
}

/// Joins each message to its thread root and the root's replies, keeping
/// input order. Messages whose root cannot be read are dropped.
pub fn with_replies(
    stream: BoxStream<'static, RootedMsg>,
    api: Api,
    concurrency: usize,
) -> BoxStream<'static, FeedItem> {
    stream
        .map(move |msg| {
            let api = api.clone();
            async move {
                let filter_result = msg.filter_result.clone();
                let root = thread_root(&api, msg).await?;
                let replies = fetch_replies(&api, &root.key).await;
                Some(FeedItem {
                    msg: root,
                    replies,
                    filter_result,
                })
            }
        })
        .buffered(concurrency.max(1))
        .filter_map(ready)
        .boxed()
}

/// Dedups by thread, then resolves and filters each thread's root before
/// attaching replies. A thread is marked seen before its root is checked, so
/// a rejected root stays rejected for the rest of the scan.
pub fn rollup(
    stream: BoxStream<'static, RootedMsg>,
    api: Api,
    root_filter: RootFilter,
    concurrency: usize,
) -> BoxStream<'static, FeedItem> {
    let mut seen: HashSet<MsgRef> = HashSet::new();
    let dedup_api = api.clone();
    stream
        .filter(move |msg| ready(seen.insert(thread_key(&dedup_api, msg))))
        .map(move |msg| {
            let api = api.clone();
            let root_filter = root_filter.clone();
            async move {
                let filter_result = msg.filter_result.clone();
                let root = thread_root(&api, msg).await?;
                let eligible = root.has_content()
                    && api.sync.root_of(&root).is_none()
                    && root_filter(&root)
                    && !api.sync.is_blocked(&root);
                if !eligible {
                    trace!("Skipping thread {}", root.key);
                    return None;
                }
                let replies = fetch_replies(&api, &root.key).await;
                Some(FeedItem {
                    msg: root,
                    replies,
                    filter_result,
                })
            }
        })
        .buffered(concurrency.max(1))
        .filter_map(ready)
        .boxed()
}

async fn thread_root(api: &Api, msg: RootedMsg) -> Option<Msg<Value>> {
    let Some(key) = api.sync.root_of(&msg) else {
        return Some(msg.msg);
    };
    if let Some(root) = msg.root.and_then(|root| root.msg) {
        return Some(root);
    }
    let root = fetch_root(api, key.clone()).await;
    if root.is_none() {
        debug!("Dropping {} with unreadable root {}", msg.msg.key, key);
    }
    root
}

async fn fetch_replies(api: &Api, root: &MsgRef) -> Vec<RootedMsg> {
    match api.store.replies(root.clone()).await {
        Ok(replies) => replies
            .into_iter()
            .filter(|reply| reply.has_content() && !api.sync.is_blocked(reply))
            .collect(),
        Err(err) => {
            debug!("Replies of {} unavailable: {}", root, err);
            Vec::new()
        }
    }
}
