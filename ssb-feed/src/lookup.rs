use futures::{stream::BoxStream, StreamExt};
use log::debug;
use serde_json::Value;
use ssb_msg::Msg;
use ssb_ref::MsgRef;

use crate::{
    api::Api,
    item::{Root, RootedMsg},
};

/// Attaches thread roots to a live stream. Lookups run `concurrency` at a
/// time and finish in any order.
pub fn lookup_root(
    stream: BoxStream<'static, RootedMsg>,
    api: Api,
    concurrency: usize,
) -> BoxStream<'static, RootedMsg> {
    stream
        .map(move |msg| {
            let api = api.clone();
            async move { resolve_root(&api, msg).await }
        })
        .buffer_unordered(concurrency.max(1))
        .boxed()
}

/// Root messages and messages that already carry a root pass through.
/// A root that cannot be read is attached without a message.
pub async fn resolve_root(api: &Api, msg: RootedMsg) -> RootedMsg {
    if msg.root.is_some() {
        return msg;
    }
    let Some(key) = api.sync.root_of(&msg) else {
        return msg;
    };
    let root = fetch_root(api, key.clone()).await;
    msg.with_root(Root { key, msg: root })
}

/// Fetches a message, unboxing private content. `None` on any failure.
pub async fn fetch_root(api: &Api, key: MsgRef) -> Option<Msg<Value>> {
    let value = match api.store.get(key.clone()).await {
        Ok(value) => value,
        Err(err) => {
            debug!("Root {} unavailable: {}", key, err);
            return None;
        }
    };

    let value = if value.is_boxed() {
        match api.sync.unbox(value) {
            Some(value) => value,
            None => {
                debug!("Root {} is boxed for someone else", key);
                return None;
            }
        }
    } else {
        value
    };

    Some(Msg {
        timestamp_received: value.timestamp_asserted,
        key,
        value,
    })
}
