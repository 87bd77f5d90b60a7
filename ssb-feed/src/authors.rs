use serde_json::Value;
use ssb_msg::Msg;
use ssb_ref::FeedRef;

use crate::{api::Intl, view::Node};

/// Distinct authors, in order of first appearance.
pub fn authors<'a>(msgs: impl IntoIterator<Item = &'a Msg<Value>>) -> Vec<FeedRef> {
    let mut result: Vec<FeedRef> = Vec::new();
    for msg in msgs {
        if !result.contains(&msg.value.author) {
            result.push(msg.value.author.clone());
        }
    }
    result
}

/// Authors whose latest vote in `msgs` is a like. A later unlike from the
/// same author cancels an earlier like; non-votes are ignored.
pub fn like_authors<'a>(msgs: impl IntoIterator<Item = &'a Msg<Value>>) -> Vec<FeedRef> {
    let mut result: Vec<FeedRef> = Vec::new();
    for msg in msgs {
        if msg.content_type() != Some("vote") {
            continue;
        }
        let author = &msg.value.author;
        if msg.value.vote_value() == Some(1) {
            if !result.contains(author) {
                result.push(author.clone());
            }
        } else {
            result.retain(|a| a != author);
        }
    }
    result
}

/// "A", "A and B", "A, B and C", "A, B, C and D", then
/// "A, B, C and 2 others" past four.
pub fn enumerate<T>(ids: &[T], render: impl Fn(&T) -> Node, intl: &dyn Intl) -> Node {
    let and = || Node::text(intl.i18n(" and "));
    let comma = || Node::text(", ");

    let nodes = match ids {
        [] => Vec::new(),
        [a] => vec![render(a)],
        [a, b] => vec![render(a), and(), render(b)],
        [a, b, c] => vec![render(a), comma(), render(b), and(), render(c)],
        [a, b, c, d] => vec![
            render(a),
            comma(),
            render(b),
            comma(),
            render(c),
            and(),
            render(d),
        ],
        [a, b, c, ..] => vec![
            render(a),
            comma(),
            render(b),
            comma(),
            render(c),
            and(),
            Node::text((ids.len() - 3).to_string()),
            Node::text(intl.i18n(" others")),
        ],
    };

    Node::Fragment(nodes)
}
