use ssb_ref::MsgRef;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Message not found: {0}")]
    NotFound(MsgRef),
    #[error("Failed to read page from source, cause: {0}")]
    Page(String),
    #[error("Failed to read message log, cause: {0}")]
    Log(#[from] ssb_msg::Error),
}
