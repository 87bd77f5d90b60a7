//! Feeds scanned items into the view as it scrolls.
//!
//! The scroller pulls items from the scan into a queue until the queue is
//! full, and moves them from the queue to the view while render demand is
//! outstanding. The host adds demand by scrolling near the bottom.

use futures::{Stream, StreamExt};
use log::trace;
use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};
use tokio::sync::Notify;

use crate::{config::RollupConfig, item::FeedItem, obs::Value};

/// Scroll position reported by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollMetrics {
    pub fn near_bottom(&self, threshold: f64) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height - threshold
    }
}

struct State {
    queue: VecDeque<FeedItem>,
    demand: usize,
    done: bool,
    closed: bool,
}

pub struct Scroller {
    state: Mutex<State>,
    wake: Notify,
    queue_depth: Value<usize>,
    done: Value<bool>,
    loading: Value<bool>,
    high_water: usize,
    loading_threshold: usize,
}

impl Scroller {
    /// `done` and `loading` belong to the owning feed and are reset here.
    pub fn new(config: &RollupConfig, done: Value<bool>, loading: Value<bool>) -> Self {
        done.set(false);
        loading.set(true);
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                demand: config.initial_render,
                done: false,
                closed: false,
            }),
            wake: Notify::new(),
            queue_depth: Value::new(0),
            done,
            loading,
            high_water: config.queue_high_water.max(1),
            loading_threshold: config.loading_queue_threshold,
        }
    }

    pub fn queue_depth(&self) -> &Value<usize> {
        &self.queue_depth
    }

    /// Asks for `count` more items to be rendered.
    pub fn request(&self, count: usize) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.demand += count;
        drop(state);
        self.wake.notify_one();
    }

    /// Stops the scroller; nothing is pulled or rendered after this returns.
    /// Safe to call more than once.
    pub fn close(&self) {
        self.lock().closed = true;
        self.wake.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Drives `items` into `render` until the scan ends and the queue drains,
    /// the scroller is closed, or `render` returns false.
    pub async fn run<S, F>(&self, mut items: S, mut render: F)
    where
        S: Stream<Item = FeedItem> + Unpin,
        F: FnMut(FeedItem) -> bool,
    {
        let mut exhausted = false;
        loop {
            let (next, pull) = {
                let mut state = self.lock();
                if state.closed {
                    return;
                }
                let next = if state.demand > 0 {
                    state.queue.pop_front()
                } else {
                    None
                };
                if next.is_some() {
                    state.demand -= 1;
                    self.publish(&state);
                }
                (next, !exhausted && state.queue.len() < self.high_water)
            };

            if let Some(item) = next {
                if !render(item) {
                    trace!("Scroller render refused, stopping");
                    return;
                }
                continue;
            }

            if !pull {
                let drained = exhausted && self.lock().queue.is_empty();
                if drained {
                    return;
                }
                self.wake.notified().await;
                continue;
            }

            tokio::select! {
                item = items.next() => {
                    let mut state = self.lock();
                    if state.closed {
                        return;
                    }
                    match item {
                        Some(item) => state.queue.push_back(item),
                        None => {
                            exhausted = true;
                            state.done = true;
                        }
                    }
                    self.publish(&state);
                }
                _ = self.wake.notified() => {}
            }
        }
    }

    fn publish(&self, state: &State) {
        let depth = state.queue.len();
        self.queue_depth.set(depth);
        self.done.set(state.done);
        self.loading
            .set(!state.done && depth < self.loading_threshold);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use futures::stream;
    use std::sync::Arc;

    fn items(n: u8) -> Vec<FeedItem> {
        (1..=n).map(|k| feed_item(post(k, 1, k as f64), vec![])).collect()
    }

    fn config(initial_render: usize) -> RollupConfig {
        RollupConfig {
            initial_render,
            queue_high_water: 4,
            loading_queue_threshold: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn renders_everything_when_demand_allows() {
        let scroller = Scroller::new(&config(100), Value::new(false), Value::new(true));
        let mut rendered = Vec::new();
        scroller
            .run(stream::iter(items(6)), |item| {
                rendered.push(item.key().clone());
                true
            })
            .await;
        assert_eq!(rendered, (1..=6).map(msg_ref).collect::<Vec<_>>());
        assert!(scroller.done.get());
        assert!(!scroller.loading.get());
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_demand() {
        let done = Value::new(false);
        let loading = Value::new(true);
        let scroller = Arc::new(Scroller::new(&config(2), done.clone(), loading.clone()));
        let rendered = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let scroller = scroller.clone();
            let rendered = rendered.clone();
            tokio::spawn(async move {
                scroller
                    .run(stream::iter(items(10)), |item| {
                        rendered.lock().unwrap().push(item.key().clone());
                        true
                    })
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(rendered.lock().unwrap().len(), 2);
        // the scan stops pulling at the high-water mark
        assert_eq!(scroller.queue_depth().get(), 4);
        assert!(!loading.get());
        assert!(!done.get());

        scroller.request(3);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(rendered.lock().unwrap().len(), 5);

        scroller.request(100);
        task.await.unwrap();
        assert_eq!(rendered.lock().unwrap().len(), 10);
        assert!(done.get());
    }

    #[tokio::test(start_paused = true)]
    async fn close_stops_rendering() {
        let scroller = Arc::new(Scroller::new(&config(1), Value::new(false), Value::new(true)));
        let rendered = Arc::new(Mutex::new(0usize));

        let task = {
            let scroller = scroller.clone();
            let rendered = rendered.clone();
            tokio::spawn(async move {
                scroller
                    .run(stream::iter(items(10)), |_| {
                        *rendered.lock().unwrap() += 1;
                        true
                    })
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        scroller.close();
        scroller.close();
        scroller.request(10);
        task.await.unwrap();
        assert_eq!(*rendered.lock().unwrap(), 1);
        assert!(scroller.is_closed());
    }

    #[test]
    fn near_bottom_uses_threshold() {
        let metrics = ScrollMetrics {
            scroll_top: 700.0,
            client_height: 200.0,
            scroll_height: 1000.0,
        };
        assert!(metrics.near_bottom(200.0));
        assert!(!metrics.near_bottom(50.0));
    }
}
