//! Decides what a live message does to the unread bookkeeping.

use ssb_ref::MsgRef;
use std::collections::HashSet;

use crate::{
    api::Api,
    filter::Filters,
    item::{Root, RootedMsg},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackerState {
    /// Waiting for the readiness gate.
    #[default]
    Idle,
    Watching,
}

/// Unread bookkeeping of one feed, kept across refreshes.
#[derive(Clone, Debug, Default)]
pub struct UnreadSets {
    pub unread_ids: HashSet<MsgRef>,
    pub new_since_refresh: HashSet<MsgRef>,
    pub highlight_items: HashSet<MsgRef>,
}

impl UnreadSets {
    /// Highlights what arrived since the last refresh and starts counting afresh.
    pub fn refresh(&mut self) {
        self.highlight_items = std::mem::take(&mut self.new_since_refresh);
    }

    pub fn priority(&self, key: &MsgRef) -> u8 {
        if self.highlight_items.contains(key) {
            2
        } else if self.unread_ids.contains(key) {
            1
        } else {
            0
        }
    }

    pub fn mark_read<'a>(&mut self, keys: impl IntoIterator<Item = &'a MsgRef>) {
        for key in keys {
            self.unread_ids.remove(key);
        }
    }

    pub fn clear(&mut self) {
        self.unread_ids.clear();
        self.new_since_refresh.clear();
        self.highlight_items.clear();
    }
}

/// What an arriving message asks of the feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arrival {
    Ignored,
    /// Show this many pending updates.
    Pending(usize),
    /// The local identity posted while the view sits at the top.
    Refresh,
}

pub struct Tracker<'a> {
    pub api: &'a Api,
    pub filters: &'a Filters,
    pub top_threshold: f64,
}

impl<'a> Tracker<'a> {
    /// The feed's own filters, applied against the message's thread root.
    /// A message whose root could not be read is rejected.
    pub fn accepts(&self, msg: &RootedMsg) -> bool {
        let root = match &msg.root {
            Some(Root { msg: Some(root), .. }) => root,
            Some(Root { msg: None, .. }) => return false,
            None => &msg.msg,
        };
        root.has_content()
            && (self.filters.root)(root)
            && (self.filters.bump)(&msg.msg, root).accepts()
            && (self.filters.display)(&msg.msg)
            && !self.api.sync.is_blocked(&msg.msg)
    }

    /// Records an accepted message. `updates` is the raw counter before the
    /// message arrived.
    pub fn drain(
        &self,
        msg: &RootedMsg,
        sets: &mut UnreadSets,
        updates: usize,
        scroll_top: f64,
    ) -> Arrival {
        if msg.content_type() == Some("vote") {
            return Arrival::Ignored;
        }
        if self.api.sync.external_handler(&msg.msg) {
            return Arrival::Ignored;
        }

        let render = &self.api.render;
        let own = msg.value.author == self.api.local_id;
        let root_renderable = msg.root_msg().map_or(true, |root| render.can_render(root));
        if render.can_render(&msg.msg) && !own && root_renderable {
            sets.new_since_refresh.insert(msg.key().clone());
            sets.unread_ids.insert(msg.key().clone());
        }

        if updates == 0 && own && scroll_top < self.top_threshold {
            Arrival::Refresh
        } else {
            Arrival::Pending(sets.new_since_refresh.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bump::BumpVerdict, testing::*};
    use serde_json::json;
    use std::sync::Arc;

    fn tracker<'a>(f: &'a Fixture, filters: &'a Filters) -> Tracker<'a> {
        Tracker {
            api: &f.api,
            filters,
            top_threshold: 20.0,
        }
    }

    #[test]
    fn counts_messages_from_others() {
        let root = post(1, 1, 1.0);
        let f = fixture(vec![root.clone()]);
        let filters = Filters::default();
        let t = tracker(&f, &filters);
        let mut sets = UnreadSets::default();

        let msg: RootedMsg = post(2, 2, 2.0).into();
        assert!(t.accepts(&msg));
        assert_eq!(t.drain(&msg, &mut sets, 0, 0.0), Arrival::Pending(1));
        assert!(sets.new_since_refresh.contains(&msg_ref(2)));
        assert!(sets.unread_ids.contains(&msg_ref(2)));
        assert_eq!(sets.priority(&msg_ref(2)), 1);
    }

    #[test]
    fn own_post_at_top_refreshes() {
        let f = fixture(vec![]);
        let filters = Filters::default();
        let t = tracker(&f, &filters);
        let mut sets = UnreadSets::default();

        let own: RootedMsg = post(2, 1, 2.0).into();
        assert_eq!(t.drain(&own, &mut sets, 0, 0.0), Arrival::Refresh);
        assert!(sets.new_since_refresh.is_empty());

        // scrolled away, or with updates already pending, it only recounts
        assert_eq!(t.drain(&own, &mut sets, 0, 400.0), Arrival::Pending(0));
        assert_eq!(t.drain(&own, &mut sets, 3, 0.0), Arrival::Pending(0));
    }

    #[test]
    fn votes_are_never_counted() {
        let root = post(1, 3, 1.0);
        let f = fixture(vec![root.clone()]);
        let filters = Filters::default();
        let t = tracker(&f, &filters);
        let mut sets = UnreadSets::default();

        for (key, value) in [(2, -1), (3, 1)] {
            let msg = RootedMsg::from(vote(key, 2, &root, value, 2.0)).with_root(Root {
                key: root.key.clone(),
                msg: Some(root.clone()),
            });
            assert!(t.accepts(&msg));
            assert_eq!(t.drain(&msg, &mut sets, 0, 0.0), Arrival::Ignored);
        }
        assert!(sets.unread_ids.is_empty());
        assert!(sets.new_since_refresh.is_empty());
    }

    #[test]
    fn unresolvable_roots_are_rejected() {
        let root = post(1, 1, 1.0);
        let f = fixture(vec![]);
        let filters = Filters::default();
        let msg = RootedMsg::from(reply(2, 2, &root, 2.0)).with_root(Root {
            key: root.key.clone(),
            msg: None,
        });
        assert!(!tracker(&f, &filters).accepts(&msg));
    }

    #[test]
    fn filters_apply_against_the_root() {
        let root = post(1, 3, 1.0);
        let f = fixture(vec![root.clone()]);
        let msg = RootedMsg::from(reply(2, 2, &root, 2.0)).with_root(Root {
            key: root.key.clone(),
            msg: Some(root.clone()),
        });

        let no_root = Filters {
            root: Arc::new(|root| root.key != msg_ref(1)),
            ..Default::default()
        };
        assert!(!tracker(&f, &no_root).accepts(&msg));

        let no_bump = Filters {
            bump: Arc::new(|_, _| BumpVerdict::Reject),
            ..Default::default()
        };
        assert!(!tracker(&f, &no_bump).accepts(&msg));

        let hidden = Filters {
            display: Arc::new(|msg| msg.key != msg_ref(2)),
            ..Default::default()
        };
        assert!(!tracker(&f, &hidden).accepts(&msg));

        assert!(tracker(&f, &Filters::default()).accepts(&msg));
    }

    #[test]
    fn blocked_and_externally_handled_are_skipped() {
        let f = fixture(vec![]);
        let filters = Filters::default();
        let t = tracker(&f, &filters);
        let mut sets = UnreadSets::default();

        f.sync.blocked.lock().unwrap().push(feed_ref(5));
        assert!(!t.accepts(&post(2, 5, 2.0).into()));

        f.sync.handled_elsewhere.lock().unwrap().push(msg_ref(3));
        let handled: RootedMsg = post(3, 2, 3.0).into();
        assert!(t.accepts(&handled));
        assert_eq!(t.drain(&handled, &mut sets, 0, 0.0), Arrival::Ignored);
    }

    #[test]
    fn unrenderable_messages_only_recount() {
        let f = fixture(vec![]);
        let filters = Filters::default();
        let t = tracker(&f, &filters);
        let mut sets = UnreadSets::default();
        sets.new_since_refresh.insert(msg_ref(9));

        let odd: RootedMsg = msg(2, 2, 2.0, json!({ "type": "gathering" })).into();
        assert_eq!(t.drain(&odd, &mut sets, 1, 0.0), Arrival::Pending(1));
        assert!(!sets.unread_ids.contains(&msg_ref(2)));
    }

    #[test]
    fn refresh_moves_new_into_highlights() {
        let mut sets = UnreadSets::default();
        sets.new_since_refresh.insert(msg_ref(1));
        sets.unread_ids.insert(msg_ref(1));
        sets.refresh();
        assert!(sets.new_since_refresh.is_empty());
        assert_eq!(sets.priority(&msg_ref(1)), 2);

        sets.refresh();
        assert_eq!(sets.priority(&msg_ref(1)), 1);
        sets.mark_read([msg_ref(1)].iter());
        assert_eq!(sets.priority(&msg_ref(1)), 0);
    }
}
