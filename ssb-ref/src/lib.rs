use base64::{
    engine::{
        general_purpose::STANDARD as b64, general_purpose::URL_SAFE_NO_PAD as b64url, Engine,
    },
    DecodeError,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt};
use thiserror::Error as ThisError;

#[derive(Clone, Debug, ThisError)]
pub enum RefError {
    #[error("Does not match as {ref_type}: {input}")]
    BadFormat {
        ref_type: &'static str,
        input: String,
    },
    #[error("Failed to decode base64: {0}")]
    DecodeError(#[from] DecodeError),
}

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedRef(Vec<u8>);

impl FeedRef {
    // From string that starts with @
    pub fn from_string(string: String) -> Result<Self, RefError> {
        if !Self::is_match(string.as_str()) {
            Err(RefError::BadFormat {
                ref_type: "Feed",
                input: string,
            })
        } else {
            Ok(Self(Self::parse_data(string.as_str())?))
        }
    }

    /// Builds a ref straight from an ed25519 public key.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex = canonical_base64("@", ".ed25519", 32);
        }
        &RE
    }

    pub fn is_match(string: &str) -> bool {
        let regex = Self::single_regex();
        regex.is_match(string)
    }

    pub fn to_page_url(&self) -> String {
        format!("/feed/{}", self.urlsafe_data())
    }

    fn string_data(&self) -> String {
        b64.encode(&self.0)
    }

    fn urlsafe_data(&self) -> String {
        b64url.encode(&self.0)
    }

    fn parse_data(key: &str) -> Result<Vec<u8>, RefError> {
        let base64_data = &key[1..key.len() - 8];
        Ok(b64.decode(base64_data)?)
    }
}

impl fmt::Display for FeedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}.ed25519", self.string_data())
    }
}

impl fmt::Debug for FeedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedRef({})", self)
    }
}

impl TryFrom<String> for FeedRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FeedRef::from_string(value)
    }
}

impl From<FeedRef> for String {
    fn from(value: FeedRef) -> String {
        value.to_string()
    }
}

impl From<&FeedRef> for String {
    fn from(value: &FeedRef) -> String {
        value.to_string()
    }
}

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct MsgRef(Vec<u8>);

impl MsgRef {
    // From string that starts with %
    pub fn from_string(string: String) -> Result<Self, RefError> {
        if !Self::is_match(string.as_str()) {
            Err(RefError::BadFormat {
                ref_type: "Msg",
                input: string,
            })
        } else {
            Ok(Self(Self::parse_data(string.as_str())?))
        }
    }

    /// Builds a ref straight from a sha256 digest.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex = canonical_base64("%", ".sha256", 32);
        }
        &RE
    }

    pub fn is_match(string: &str) -> bool {
        let regex = Self::single_regex();
        regex.is_match(string)
    }

    pub fn to_page_url(&self) -> String {
        format!("/message/{}", self.urlsafe_data())
    }

    fn string_data(&self) -> String {
        b64.encode(&self.0)
    }

    fn urlsafe_data(&self) -> String {
        b64url.encode(&self.0)
    }

    fn parse_data(key: &str) -> Result<Vec<u8>, RefError> {
        let base64_data = &key[1..key.len() - 7];
        Ok(b64.decode(base64_data)?)
    }
}

impl fmt::Display for MsgRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}.sha256", self.string_data())
    }
}

impl fmt::Debug for MsgRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MsgRef({})", self)
    }
}

impl TryFrom<String> for MsgRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MsgRef::from_string(value)
    }
}

impl From<MsgRef> for String {
    fn from(value: MsgRef) -> String {
        value.to_string()
    }
}

impl From<&MsgRef> for String {
    fn from(value: &MsgRef) -> String {
        value.to_string()
    }
}

// https://github.com/dominictarr/is-canonical-base64/blob/master/index.js
fn canonical_base64(prefix: &str, suffix: &str, length: u32) -> Regex {
    let char = "[a-zA-Z0-9/+]";
    let trail2 = "[AQgw]==";
    let trail4 = "[AEIMQUYcgkosw048]=";

    let mut re = String::from("^");
    re.push_str(&regex::escape(prefix));
    re.push_str(char);
    re.push('{');
    re.push_str(&((length * 8) / 6).to_string());
    re.push('}');

    let pad = length % 3;
    re.push_str(if pad == 0 {
        ""
    } else if pad == 1 {
        trail2
    } else {
        trail4
    });

    re.push_str(&regex::escape(suffix));
    re.push('$');

    Regex::new(&re).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_message_id() {
        assert!(MsgRef::is_match(
            "%pGzeEydYdHjKW1iIchR0Yumydsr3QSp8+FuYcwVwi8Q=.sha256"
        ));
        assert!(MsgRef::is_match(
            "%09abcdefghyq9KH6dYMc/g17L04jDbl1py8arGQmL1I=.sha256"
        ));
        assert!(!MsgRef::is_match(
            "@jEA8WSl0URsB/g/XYG5zCGBkMOyTeBZfGtbw3RJMIuk=.ed25519"
        ));
    }

    #[test]
    fn test_parse_message_id_data() {
        assert_eq!(
            MsgRef::parse_data("%pGzeEydYdHjKW1iIchR0Yumydsr3QSp8+FuYcwVwi8Q=.sha256").unwrap(),
            b64.decode("pGzeEydYdHjKW1iIchR0Yumydsr3QSp8+FuYcwVwi8Q=")
                .unwrap()
        );
    }

    #[test]
    fn test_is_feed_id() {
        assert!(FeedRef::is_match(
            "@jEA8WSl0URsB/g/XYG5zCGBkMOyTeBZfGtbw3RJMIuk=.ed25519"
        ));
        assert!(!FeedRef::is_match("@not-a-key.ed25519"));
    }

    #[test]
    fn test_refs_must_span_whole_string() {
        let feed = "@jEA8WSl0URsB/g/XYG5zCGBkMOyTeBZfGtbw3RJMIuk=.ed25519";
        assert!(!FeedRef::is_match(&format!("hi {}", feed)));
        assert!(!FeedRef::is_match(&format!("{} and more", feed)));

        let msg = "%pGzeEydYdHjKW1iIchR0Yumydsr3QSp8+FuYcwVwi8Q=.sha256";
        assert!(MsgRef::from_string(format!("[{}]", msg)).is_err());
    }

    #[test]
    fn test_parse_feed_id_data() {
        assert_eq!(
            FeedRef::parse_data("@jEA8WSl0URsB/g/XYG5zCGBkMOyTeBZfGtbw3RJMIuk=.ed25519").unwrap(),
            b64.decode("jEA8WSl0URsB/g/XYG5zCGBkMOyTeBZfGtbw3RJMIuk=")
                .unwrap()
        );
    }

    #[test]
    fn test_display_matches_input() {
        let input = "%pGzeEydYdHjKW1iIchR0Yumydsr3QSp8+FuYcwVwi8Q=.sha256";
        let msg_ref = MsgRef::from_string(input.to_string()).unwrap();
        assert_eq!(msg_ref.to_string(), input);
    }

    #[test]
    fn test_from_bytes_is_canonical() {
        let feed_ref = FeedRef::from_bytes([7; 32]);
        assert!(FeedRef::is_match(&feed_ref.to_string()));

        let msg_ref = MsgRef::from_bytes([9; 32]);
        assert!(MsgRef::is_match(&msg_ref.to_string()));
    }

    #[test]
    fn test_serde_as_string() {
        let input = "\"@jEA8WSl0URsB/g/XYG5zCGBkMOyTeBZfGtbw3RJMIuk=.ed25519\"";
        let feed_ref: FeedRef = serde_json::from_str(input).unwrap();
        assert_eq!(serde_json::to_string(&feed_ref).unwrap(), input);

        let bad: Result<MsgRef, _> = serde_json::from_str("\"%nope.sha256\"");
        assert!(bad.is_err());
    }
}
