//! In-memory collaborators: a message store that doubles as a feed source,
//! and a plain renderer. Enough to drive a feed without a database.

use futures::{
    channel::mpsc,
    future::{self, BoxFuture},
    stream::BoxStream,
    FutureExt, StreamExt,
};
use log::trace;
use serde_json::Value;
use ssb_msg::{Msg, MsgContent, MsgValue};
use ssb_ref::{FeedRef, MsgRef};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, RwLock,
};

use crate::{
    api::{FeedSource, MessageStore, PageQuery, Render, RenderOptions},
    item::RootedMsg,
    view::Node,
    Error,
};

#[derive(Default)]
pub struct MemoryStore {
    msgs: RwLock<Vec<Msg<Value>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<RootedMsg>>>,
    pages_served: AtomicUsize,
}

impl MemoryStore {
    pub fn new(msgs: Vec<Msg<Value>>) -> Self {
        Self {
            msgs: RwLock::new(msgs),
            ..Default::default()
        }
    }

    /// Loads a message log, see [`ssb_msg::parse_log`].
    pub fn from_log(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::new(ssb_msg::parse_log(bytes)?))
    }

    /// Appends a message and hands it to every live subscriber.
    pub fn publish(&self, msg: Msg<Value>) {
        trace!("Publishing {}", msg.key);
        write(&self.msgs).push(msg.clone());

        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| tx.unbounded_send(msg.clone().into()).is_ok());
    }

    /// Drops a message so later lookups of it fail.
    pub fn forget(&self, key: &MsgRef) {
        write(&self.msgs).retain(|msg| &msg.key != key);
    }

    pub fn contains(&self, key: &MsgRef) -> bool {
        read(&self.msgs).iter().any(|msg| &msg.key == key)
    }

    pub fn len(&self) -> usize {
        read(&self.msgs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    fn lookup(&self, key: &MsgRef) -> Result<MsgValue<Value>, Error> {
        read(&self.msgs)
            .iter()
            .find(|msg| &msg.key == key)
            .map(|msg| msg.value.clone())
            .ok_or_else(|| Error::NotFound(key.clone()))
    }

    fn backlinks(&self, root: &MsgRef) -> Vec<RootedMsg> {
        let mut replies: Vec<Msg<Value>> = read(&self.msgs)
            .iter()
            .filter(|msg| {
                msg.value.root().as_ref() == Some(root)
                    || msg.value.vote_link().as_ref() == Some(root)
            })
            .cloned()
            .collect();
        replies.sort_by(|a, b| {
            a.value
                .timestamp_asserted
                .total_cmp(&b.value.timestamp_asserted)
        });
        replies.into_iter().map(RootedMsg::from).collect()
    }

    fn select(&self, query: &PageQuery) -> Vec<RootedMsg> {
        let mut msgs: Vec<Msg<Value>> = read(&self.msgs)
            .iter()
            .filter(|msg| query.lt.map_or(true, |lt| msg.timestamp_received < lt))
            .cloned()
            .collect();
        msgs.sort_by(|a, b| a.timestamp_received.total_cmp(&b.timestamp_received));
        if query.reverse {
            msgs.reverse();
        }
        msgs.into_iter()
            .take(query.limit)
            .map(RootedMsg::from)
            .collect()
    }
}

impl MessageStore for MemoryStore {
    fn get(&self, key: MsgRef) -> BoxFuture<'_, Result<MsgValue<Value>, Error>> {
        future::ready(self.lookup(&key)).boxed()
    }

    fn replies(&self, root: MsgRef) -> BoxFuture<'_, Result<Vec<RootedMsg>, Error>> {
        future::ready(Ok(self.backlinks(&root))).boxed()
    }
}

impl FeedSource for MemoryStore {
    fn page(&self, query: PageQuery) -> BoxFuture<'_, Result<Vec<RootedMsg>, Error>> {
        self.pages_served.fetch_add(1, Ordering::SeqCst);
        future::ready(Ok(self.select(&query))).boxed()
    }

    fn live(&self) -> BoxStream<'static, RootedMsg> {
        let (tx, rx) = mpsc::unbounded();
        lock(&self.subscribers).push(tx);
        rx.boxed()
    }
}

/// Renders messages as short text lines.
#[derive(Clone, Default)]
pub struct PlainRender {
    store: Option<Arc<MemoryStore>>,
}

impl PlainRender {
    /// With a store, branch markers only show for messages it lacks.
    pub fn new(store: Option<Arc<MemoryStore>>) -> Self {
        Self { store }
    }
}

impl Render for PlainRender {
    fn can_render(&self, msg: &Msg<Value>) -> bool {
        matches!(
            msg.content_type(),
            Some("post") | Some("vote") | Some("about") | Some("contact")
        )
    }

    fn render(&self, msg: &Msg<Value>, options: &RenderOptions) -> Option<Node> {
        let summary = match msg.value.typed_content()? {
            MsgContent::Post(post) => post.text,
            MsgContent::Vote(vote) => match vote.vote.expression {
                Some(expression) => expression,
                None if vote.vote.value > 0.0 => "Like".to_string(),
                None => "Unlike".to_string(),
            },
            MsgContent::About(about) => match (about.name, about.attendee) {
                (Some(name), _) => format!("named {}", name),
                (None, Some(_)) => "attending".to_string(),
                (None, None) => "updated".to_string(),
            },
            MsgContent::Contact(contact) => match contact.following {
                Some(false) => format!("unfollowed {}", short(&contact.contact)),
                _ => format!("followed {}", short(&contact.contact)),
            },
            MsgContent::Unknown => return None,
        };

        let mut element = Node::element("Message").attr("data-key", msg.key.to_string());
        match options.priority {
            2 => element = element.class("-new"),
            1 => element = element.class("-unread"),
            _ => {}
        }
        if options.compact {
            element = element.class("-compact");
        }

        Some(
            element
                .child(self.person(&msg.value.author))
                .child(Node::text(": "))
                .child(Node::text(summary))
                .into(),
        )
    }

    fn missing(&self, key: Option<&MsgRef>, _context: &Msg<Value>) -> Node {
        match (key, &self.store) {
            (None, _) => Node::empty(),
            (Some(key), Some(store)) if store.contains(key) => Node::empty(),
            (Some(key), _) => Node::element("MissingMessage")
                .attr("data-key", key.to_string())
                .child("message not found")
                .into(),
        }
    }

    fn person(&self, author: &FeedRef) -> Node {
        Node::element("a")
            .class("ProfileLink")
            .attr("href", author.to_page_url())
            .child(short(author))
            .into()
    }

    fn channel_link(&self, channel: &str) -> Node {
        Node::element("a")
            .class("ChannelLink")
            .attr("href", format!("/channel/{}", channel))
            .child(format!("#{}", channel))
            .into()
    }
}

fn short(feed: &FeedRef) -> String {
    feed.to_string().chars().take(7).collect()
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
