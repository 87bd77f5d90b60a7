// https://github.com/ssbc/ssb-typescript

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError, OneOrMany};
use ssb_ref::{FeedRef, MsgRef};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Json error, cause: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Log line {line} is not a message, cause: {source}")]
    LogLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(bound(deserialize = "Content: Deserialize<'de> + Default"))]
pub struct Msg<Content> {
    pub key: MsgRef,
    pub value: MsgValue<Content>,
    #[serde(alias = "timestamp", default)]
    pub timestamp_received: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(bound(deserialize = "Content: Deserialize<'de> + Default"))]
pub struct MsgValue<Content> {
    pub author: FeedRef,
    #[serde(default)]
    pub sequence: u64,
    #[serde(alias = "timestamp")]
    pub timestamp_asserted: f64,
    // erased and malformed messages come through with no content at all
    #[serde(default)]
    pub content: Content,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum MsgContent {
    #[serde(alias = "post")]
    Post(PostContent),
    #[serde(alias = "contact")]
    Contact(ContactContent),
    #[serde(alias = "vote")]
    Vote(VoteContent),
    #[serde(alias = "about")]
    About(AboutContent),
    #[serde(other)]
    Unknown,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PostContent {
    pub text: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub channel: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub root: Option<MsgRef>,
    #[serde_as(as = "Option<DefaultOnError<OneOrMany<_>>>")]
    #[serde(default)]
    pub branch: Option<Vec<MsgRef>>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub fork: Option<MsgRef>,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ContactContent {
    pub contact: FeedRef,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub following: Option<bool>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub blocking: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VoteContent {
    pub vote: Vote,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Vote {
    pub link: MsgRef,
    pub value: f64,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub expression: Option<String>,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AboutContent {
    pub about: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub name: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub description: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub attendee: Option<Attendee>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Attendee {
    pub link: FeedRef,
    #[serde(default)]
    pub remove: Option<bool>,
}

// Lenient view over the threading fields every content type may carry.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct Threading {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    root: Option<MsgRef>,
    #[serde_as(deserialize_as = "Option<DefaultOnError<OneOrMany<_>>>")]
    #[serde(default)]
    branch: Option<Vec<MsgRef>>,
}

impl MsgValue<Value> {
    /// The `type` discriminator of object content.
    pub fn content_type(&self) -> Option<&str> {
        self.content.get("type").and_then(Value::as_str)
    }

    pub fn has_content(&self) -> bool {
        self.content.is_object()
    }

    /// Private messages keep their content as a `.box` string until unboxed.
    pub fn is_boxed(&self) -> bool {
        self.content.is_string()
    }

    pub fn channel(&self) -> Option<&str> {
        self.content.get("channel").and_then(Value::as_str)
    }

    /// The value of a vote, `None` when this is not a well-formed vote.
    pub fn vote_value(&self) -> Option<i64> {
        self.content
            .get("vote")
            .and_then(|vote| vote.get("value"))
            .and_then(|value| {
                // JSON writers may emit a like as `1.0`
                value.as_i64().or_else(|| {
                    value
                        .as_f64()
                        .filter(|value| value.fract() == 0.0)
                        .map(|value| value as i64)
                })
            })
    }

    /// The message a vote points at.
    pub fn vote_link(&self) -> Option<MsgRef> {
        let link = self.content.get("vote")?.get("link")?.as_str()?;
        MsgRef::from_string(link.to_string()).ok()
    }

    pub fn root(&self) -> Option<MsgRef> {
        self.threading().root
    }

    pub fn branch(&self) -> Vec<MsgRef> {
        self.threading().branch.unwrap_or_default()
    }

    /// Posts and gathering attendance both read as replies within a thread.
    pub fn is_reply_like(&self) -> bool {
        match self.content_type() {
            Some("post") => true,
            Some("about") => self
                .content
                .get("attendee")
                .map_or(false, |attendee| !attendee.is_null()),
            _ => false,
        }
    }

    pub fn typed_content(&self) -> Option<MsgContent> {
        serde_json::from_value(self.content.clone()).ok()
    }

    fn threading(&self) -> Threading {
        if !self.has_content() {
            return Threading::default();
        }
        serde_json::from_value(self.content.clone()).unwrap_or_default()
    }
}

impl Msg<Value> {
    pub fn content_type(&self) -> Option<&str> {
        self.value.content_type()
    }

    pub fn has_content(&self) -> bool {
        self.value.has_content()
    }
}

/// Reads a message log, either a JSON array or one message per line.
pub fn parse_log(bytes: &[u8]) -> Result<Vec<Msg<Value>>, Error> {
    let text = String::from_utf8_lossy(bytes);
    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(&text)?);
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| Error::LogLine {
                line: index + 1,
                source,
            })
        })
        .collect()
}
