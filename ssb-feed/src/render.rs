//! Turns one feed item into its element: the meta line naming who bumped
//! it, the root, and a preview of the newest replies.

use serde_json::Value;
use ssb_msg::Msg;
use ssb_ref::MsgRef;

use crate::{
    api::{Api, RenderOptions},
    authors::{authors, enumerate, like_authors},
    bump::{self, BumpGroups, MATCHES_CHANNEL},
    config::RollupConfig,
    filter::Filters,
    item::{FeedItem, RootedMsg},
    view::{Element, Node},
};

/// A rendered item together with every message key it shows.
#[derive(Clone, Debug)]
pub struct RenderedItem {
    pub root: MsgRef,
    pub msg_ids: Vec<MsgRef>,
    pub node: Node,
}

pub struct ItemRenderer<'a> {
    pub api: &'a Api,
    pub filters: &'a Filters,
    pub config: &'a RollupConfig,
}

impl<'a> ItemRenderer<'a> {
    /// `priority` ranks a message: 2 new since refresh, 1 unread, 0 seen.
    pub fn render(&self, item: &FeedItem, priority: impl Fn(&MsgRef) -> u8) -> RenderedItem {
        let api = self.api;
        let groups = BumpGroups::collect(item, &self.filters.bump);

        let mut replies: Vec<&RootedMsg> = item
            .replies
            .iter()
            .filter(|reply| reply.value.is_reply_like())
            .collect();
        // stable, so replies asserted at the same time keep arrival order
        replies.sort_by(|a, b| {
            api.sync
                .timestamp_of(&a.msg)
                .total_cmp(&api.sync.timestamp_of(&b.msg))
        });

        let highlighted: Vec<&RootedMsg> = replies
            .iter()
            .copied()
            .filter(|reply| priority(reply.key()) > 0)
            .collect();

        let shown: Vec<&RootedMsg> = replies
            .iter()
            .copied()
            .filter(|reply| (self.filters.display)(&reply.msg))
            .collect();
        let shown = &shown[shown.len().saturating_sub(self.config.reply_previews)..];

        let mut previous_id = item.key().clone();
        let reply_elements: Vec<Node> = shown
            .iter()
            .map(|reply| {
                let options = RenderOptions {
                    previous_id: Some(previous_id.clone()),
                    compact: (self.filters.compact)(&reply.msg, Some(item)),
                    priority: priority(reply.key()),
                    include_forks: true,
                };
                let rendered = api.render.render(&reply.msg, &options);
                previous_id = reply.key().clone();

                let rendered = rendered.unwrap_or_else(Node::empty);
                let marker = api.render.missing(reply.value.branch().last(), &reply.msg);
                if marker.is_empty() {
                    rendered
                } else {
                    Node::Fragment(vec![marker, rendered])
                }
            })
            .collect();

        let rendered = api.render.render(
            &item.msg,
            &RenderOptions {
                previous_id: None,
                compact: (self.filters.compact)(&item.msg, None),
                priority: priority(item.key()),
                // forks of a root already show up as its replies
                include_forks: false,
            },
        );

        let msg_ids = item.msg_ids();
        let Some(rendered) = rendered else {
            return RenderedItem {
                root: item.key().clone(),
                msg_ids,
                node: Node::element("div").into(),
            };
        };

        let anchor = if highlighted.len() >= self.config.highlight_anchor_min {
            highlighted.first()
        } else {
            replies.first()
        };

        let mut element = Node::element("FeedEvent")
            .class("-post")
            .attr("data-root-id", item.key().to_string());
        if let Some(meta) = self.meta(item, &groups) {
            element = element.child(meta);
        }
        element = element.child(rendered);
        if replies.len() > reply_elements.len() {
            let mut link = Node::element("a")
                .class("full")
                .attr("href", item.key().to_page_url());
            if let Some(anchor) = anchor {
                link = link.attr("anchor", anchor.key().to_string());
            }
            element = element.child(link.child(format!(
                "{} ({})",
                api.intl.i18n("View full thread"),
                replies.len()
            )));
        }
        element = element.child(Node::element("div").class("replies").children(reply_elements));

        RenderedItem {
            root: item.key().clone(),
            msg_ids,
            node: element.into(),
        }
    }

    fn meta(&self, item: &FeedItem, groups: &BumpGroups<'_>) -> Option<Element> {
        let api = self.api;
        let intl = api.intl.as_ref();

        if groups.root_bump.bump_type() == Some(MATCHES_CHANNEL) {
            let mut channels: Vec<String> = Vec::new();
            if let Some(channel) = item.msg.value.channel() {
                channels.push(channel.to_string());
            }
            if let Some(filter_result) = &item.filter_result {
                channels.extend(filter_result.matching_tags.iter().cloned());
            }
            return Some(meta_line(vec![
                enumerate(&channels, |c| api.render.channel_link(c), intl),
                Node::text(" "),
                Node::text(intl.i18n("mentioned in your network")),
            ]));
        }

        let (bump_type, group) = groups.latest()?;

        if bump_type == MATCHES_CHANNEL {
            if let Some(channel) = item.msg.value.channel() {
                return Some(meta_line(vec![
                    Node::text(intl.i18n_plural(
                        "%s people from your network replied to this message on ",
                        group.len(),
                    )),
                    api.render.channel_link(channel),
                ]));
            }
        }

        let names = bumpers(bump_type, group);
        Some(meta_line(vec![
            enumerate(&names, |author| api.render.person(author), intl),
            Node::text(" "),
            Node::text(intl.i18n(bump::description(bump_type))),
        ]))
    }
}

fn bumpers(bump_type: &str, group: &[&Msg<Value>]) -> Vec<ssb_ref::FeedRef> {
    if bump_type == "vote" {
        // groups are newest first, likes resolve in arrival order
        like_authors(group.iter().rev().copied())
    } else {
        authors(group.iter().copied())
    }
}

fn meta_line(children: Vec<Node>) -> Element {
    Node::element("div").class("meta").children(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bump::BumpVerdict, item::FilterResult, testing::*};
    use std::{collections::HashSet, sync::Arc};

    fn render_with(
        f: &Fixture,
        filters: &Filters,
        item: &FeedItem,
        unread: &HashSet<MsgRef>,
    ) -> RenderedItem {
        let config = RollupConfig::default();
        let renderer = ItemRenderer {
            api: &f.api,
            filters,
            config: &config,
        };
        renderer.render(item, |key| u8::from(unread.contains(key)))
    }

    fn render(f: &Fixture, item: &FeedItem) -> RenderedItem {
        render_with(f, &Filters::default(), item, &HashSet::new())
    }

    fn meta_text(rendered: &RenderedItem) -> Option<String> {
        rendered.node.find_class("meta").map(|m| Node::from(m.clone()).to_text())
    }

    fn name(n: u8) -> String {
        feed_ref(n).to_string().chars().take(7).collect()
    }

    #[test]
    fn lone_root_has_no_meta() {
        let root = post(1, 1, 1.0);
        let f = fixture(vec![root.clone()]);
        let rendered = render(&f, &feed_item(root, vec![]));
        assert!(meta_text(&rendered).is_none());
        assert!(rendered.node.find_class("full").is_none());
        assert_eq!(rendered.msg_ids, vec![msg_ref(1)]);
    }

    #[test]
    fn names_repliers() {
        let root = post(1, 1, 1.0);
        let replies = vec![reply(2, 2, &root, 2.0).into(), reply(3, 3, &root, 3.0).into()];
        let f = fixture(vec![root.clone()]);
        let rendered = render(&f, &feed_item(root, replies));
        assert_eq!(
            meta_text(&rendered),
            Some(format!("{} and {} replied to this message", name(3), name(2)))
        );
    }

    #[test]
    fn names_likers_after_retractions() {
        let root = post(1, 1, 1.0);
        let replies = vec![
            vote(2, 2, &root, 1, 2.0).into(),
            vote(3, 3, &root, 1, 3.0).into(),
            vote(4, 2, &root, -1, 4.0).into(),
        ];
        let f = fixture(vec![root.clone()]);
        let rendered = render(&f, &feed_item(root, replies));
        assert_eq!(
            meta_text(&rendered),
            Some(format!("{} liked this message", name(3)))
        );
    }

    #[test]
    fn unlike_retracts_earlier_like() {
        let root = post(1, 1, 1.0);
        let replies = vec![
            vote(2, 2, &root, 1, 2.0).into(),
            vote(3, 2, &root, -1, 4.0).into(),
        ];
        let f = fixture(vec![root.clone()]);
        let rendered = render(&f, &feed_item(root, replies));
        assert_eq!(meta_text(&rendered), Some(" liked this message".to_string()));
    }

    #[test]
    fn relike_after_unlike_counts() {
        let root = post(1, 1, 1.0);
        let replies = vec![
            vote(2, 2, &root, 1, 2.0).into(),
            vote(3, 2, &root, -1, 3.0).into(),
            vote(4, 2, &root, 1, 4.0).into(),
        ];
        let f = fixture(vec![root.clone()]);
        let rendered = render(&f, &feed_item(root, replies));
        assert_eq!(
            meta_text(&rendered),
            Some(format!("{} liked this message", name(2)))
        );
    }

    #[test]
    fn mention_bumps_without_replies() {
        let root = post(1, 2, 1.0);
        let f = fixture(vec![root.clone()]);
        let filters = Filters {
            bump: Arc::new(|_, _| BumpVerdict::Typed("mention".to_string())),
            ..Default::default()
        };
        let rendered = render_with(&f, &filters, &feed_item(root, vec![]), &HashSet::new());
        assert_eq!(
            meta_text(&rendered),
            Some(format!("{} mentioned you", name(2)))
        );
    }

    #[test]
    fn channel_matches_list_tags() {
        let root = channel_post(1, 2, "rust", 1.0);
        let f = fixture(vec![root.clone()]);
        let filters = Filters {
            bump: Arc::new(|_, _| BumpVerdict::Typed(MATCHES_CHANNEL.to_string())),
            ..Default::default()
        };
        let mut item = feed_item(root, vec![]);
        item.filter_result = Some(FilterResult {
            matching_tags: vec!["ssb".to_string()],
        });
        let rendered = render_with(&f, &filters, &item, &HashSet::new());
        assert_eq!(
            meta_text(&rendered),
            Some("#rust and #ssb mentioned in your network".to_string())
        );
    }

    #[test]
    fn channel_replies_count_people() {
        let root = channel_post(1, 1, "rust", 1.0);
        let replies = vec![reply(2, 2, &root, 2.0).into(), reply(3, 3, &root, 3.0).into()];
        let f = fixture(vec![root.clone()]);
        let filters = Filters {
            bump: Arc::new(|msg, root| {
                if msg.key == root.key {
                    BumpVerdict::Reject
                } else {
                    BumpVerdict::Typed(MATCHES_CHANNEL.to_string())
                }
            }),
            ..Default::default()
        };
        let rendered = render_with(&f, &filters, &feed_item(root, replies), &HashSet::new());
        assert_eq!(
            meta_text(&rendered),
            Some("2 people from your network replied to this message on #rust".to_string())
        );
    }

    #[test]
    fn previews_newest_three_replies_in_time_order() {
        let root = post(1, 1, 1.0);
        // arrival order differs from asserted order
        let replies: Vec<RootedMsg> = [(2, 5.0), (3, 2.0), (4, 4.0), (5, 3.0), (6, 6.0)]
            .iter()
            .map(|(key, ts)| reply(*key, 2, &root, *ts).into())
            .collect();
        let f = fixture(vec![root.clone()]);
        let rendered = render(&f, &feed_item(root, replies));

        let shown: Vec<String> = match rendered.node.find_class("replies") {
            Some(element) => element
                .children
                .iter()
                .map(|child| child.to_text())
                .collect(),
            None => panic!("no replies section"),
        };
        assert_eq!(shown.len(), 3);
        assert!(shown[0].ends_with("reply 4"));
        assert!(shown[1].ends_with("reply 2"));
        assert!(shown[2].ends_with("reply 6"));

        let full = rendered.node.find_class("full").unwrap();
        assert_eq!(Node::from(full.clone()).to_text(), "View full thread (5)");
        // nothing highlighted, so the link anchors at the first reply
        assert_eq!(full.get_attr("anchor"), Some(msg_ref(3).to_string().as_str()));
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let root = post(1, 1, 1.0);
        let replies: Vec<RootedMsg> = (2..5).map(|key| reply(key, 2, &root, 7.0).into()).collect();
        let f = fixture(vec![root.clone()]);
        let rendered = render(&f, &feed_item(root, replies));
        let text = rendered.node.find_class("replies").map(|e| Node::from(e.clone()).to_text());
        let text = text.unwrap();
        let positions: Vec<usize> = ["reply 2", "reply 3", "reply 4"]
            .iter()
            .map(|needle| text.find(needle).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn anchors_at_first_highlighted_reply() {
        let root = post(1, 1, 1.0);
        let replies: Vec<RootedMsg> = (2..8).map(|key| reply(key, 2, &root, key as f64).into()).collect();
        let f = fixture(vec![root.clone()]);
        let unread: HashSet<MsgRef> = [msg_ref(4), msg_ref(5), msg_ref(6)].into_iter().collect();
        let rendered = render_with(&f, &Filters::default(), &feed_item(root, replies), &unread);
        let full = rendered.node.find_class("full").unwrap();
        assert_eq!(full.get_attr("anchor"), Some(msg_ref(4).to_string().as_str()));
        assert!(rendered.node.find_class("-unread").is_some());
    }

    #[test]
    fn unrenderable_root_leaves_placeholder() {
        let root = msg(1, 1, 1.0, serde_json::json!({ "type": "gathering" }));
        let f = fixture(vec![root.clone()]);
        let rendered = render(&f, &feed_item(root, vec![]));
        assert_eq!(rendered.node, Node::from(Node::element("div")));
        assert_eq!(rendered.root, msg_ref(1));
    }

    #[test]
    fn display_filter_hides_replies() {
        let root = post(1, 1, 1.0);
        let replies = vec![reply(2, 2, &root, 2.0).into(), reply(3, 3, &root, 3.0).into()];
        let f = fixture(vec![root.clone()]);
        let filters = Filters {
            display: Arc::new(|msg| msg.key != msg_ref(2)),
            ..Default::default()
        };
        let rendered = render_with(&f, &filters, &feed_item(root, replies), &HashSet::new());
        assert!(rendered.node.find_class("full").is_some());
        let shown = rendered.node.find_class("replies").unwrap().children.len();
        assert_eq!(shown, 1);
    }

    #[test]
    fn missing_branch_is_marked() {
        let root = post(1, 1, 1.0);
        let f = fixture(vec![]);
        let rendered = render(&f, &feed_item(root.clone(), vec![reply(2, 2, &root, 2.0).into()]));
        assert!(rendered.node.find_class("replies").is_some());
        assert!(rendered.node.to_text().contains("message not found"));
    }

    #[test]
    fn known_branch_adds_no_marker() {
        let root = post(1, 1, 1.0);
        let f = fixture(vec![root.clone()]);
        let rendered = render(&f, &feed_item(root.clone(), vec![reply(2, 2, &root, 2.0).into()]));
        let replies = rendered.node.find_class("replies").unwrap();
        assert_eq!(replies.children.len(), 1);
        assert!(matches!(replies.children[0], Node::Element(_)));
        assert!(!rendered.node.to_text().contains("message not found"));
    }
}
