//! Message builders and collaborator fixtures shared by the unit tests.

use serde_json::{json, Value};
use ssb_msg::{Msg, MsgValue};
use ssb_ref::{FeedRef, MsgRef};
use std::sync::{Arc, Mutex};

use crate::{
    api::{Api, EnglishIntl, MessageSync},
    item::{FeedItem, RootedMsg},
    memory::{MemoryStore, PlainRender},
};

pub fn feed_ref(n: u8) -> FeedRef {
    FeedRef::from_bytes([n; 32])
}

pub fn msg_ref(n: u8) -> MsgRef {
    MsgRef::from_bytes([n; 32])
}

pub fn msg(key: u8, author: u8, timestamp: f64, content: Value) -> Msg<Value> {
    Msg {
        key: msg_ref(key),
        value: MsgValue {
            author: feed_ref(author),
            sequence: 1,
            timestamp_asserted: timestamp,
            content,
        },
        timestamp_received: timestamp,
    }
}

pub fn post(key: u8, author: u8, timestamp: f64) -> Msg<Value> {
    msg(
        key,
        author,
        timestamp,
        json!({ "type": "post", "text": format!("post {}", key) }),
    )
}

pub fn channel_post(key: u8, author: u8, channel: &str, timestamp: f64) -> Msg<Value> {
    msg(
        key,
        author,
        timestamp,
        json!({ "type": "post", "text": format!("post {}", key), "channel": channel }),
    )
}

pub fn reply(key: u8, author: u8, root: &Msg<Value>, timestamp: f64) -> Msg<Value> {
    msg(
        key,
        author,
        timestamp,
        json!({
            "type": "post",
            "text": format!("reply {}", key),
            "root": root.key.to_string(),
            "branch": root.key.to_string(),
        }),
    )
}

pub fn vote(key: u8, author: u8, root: &Msg<Value>, value: i64, timestamp: f64) -> Msg<Value> {
    msg(
        key,
        author,
        timestamp,
        json!({ "type": "vote", "vote": { "link": root.key.to_string(), "value": value } }),
    )
}

pub fn erased(key: u8, author: u8, timestamp: f64) -> Msg<Value> {
    msg(key, author, timestamp, Value::Null)
}

pub fn feed_item(root: Msg<Value>, replies: Vec<RootedMsg>) -> FeedItem {
    FeedItem {
        msg: root,
        replies,
        filter_result: None,
    }
}

/// Message handling with switchable blocking and external handling.
#[derive(Default)]
pub struct TestSync {
    pub blocked: Mutex<Vec<FeedRef>>,
    pub handled_elsewhere: Mutex<Vec<MsgRef>>,
}

impl MessageSync for TestSync {
    fn is_blocked(&self, msg: &Msg<Value>) -> bool {
        self.blocked.lock().unwrap().contains(&msg.value.author)
    }

    fn external_handler(&self, msg: &Msg<Value>) -> bool {
        self.handled_elsewhere.lock().unwrap().contains(&msg.key)
    }
}

pub struct Fixture {
    pub api: Api,
    pub store: Arc<MemoryStore>,
    pub sync: Arc<TestSync>,
}

/// Collaborators backed by one in-memory store; the local identity is author 1.
pub fn fixture(msgs: Vec<Msg<Value>>) -> Fixture {
    let store = Arc::new(MemoryStore::new(msgs));
    let sync = Arc::new(TestSync::default());
    let api = Api {
        render: Arc::new(PlainRender::new(Some(store.clone()))),
        sync: sync.clone(),
        store: store.clone(),
        intl: Arc::new(EnglishIntl),
        local_id: feed_ref(1),
    };
    Fixture { api, store, sync }
}
