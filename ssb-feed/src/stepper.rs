use futures::{
    stream::{self, BoxStream},
    StreamExt,
};
use log::{trace, warn};
use std::sync::Arc;

use crate::{
    api::{FeedSource, PageQuery},
    item::RootedMsg,
};

/// Walks the source backwards one page at a time. The next page is only
/// requested once the previous one has been consumed; an empty or failed
/// page ends the scan.
pub fn next_stepper(source: Arc<dyn FeedSource>, limit: usize) -> BoxStream<'static, RootedMsg> {
    // `None` once the scan is over, otherwise the cursor of the next page.
    let start: Option<Option<f64>> = Some(None);

    stream::unfold(start, move |state| {
        let source = source.clone();
        async move {
            let lt = state?;
            let query = PageQuery {
                reverse: true,
                limit,
                lt,
            };
            trace!("Requesting page before {:?}", lt);

            match source.page(query).await {
                Ok(page) if page.is_empty() => None,
                Ok(page) => {
                    let cursor = page.last().map(|msg| msg.timestamp_received);
                    Some((stream::iter(page), Some(cursor)))
                }
                Err(err) => {
                    warn!("Stopping scan, page failed: {}", err);
                    None
                }
            }
        }
    })
    .flatten()
    .boxed()
}
