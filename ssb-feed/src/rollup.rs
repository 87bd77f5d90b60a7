//! The feed widget: one backward scan rendered as it scrolls, and a live
//! subscription counting what arrived since.

use futures::stream::{self, AbortHandle, BoxStream, StreamExt};
use log::{debug, info, trace};
use ssb_ref::MsgRef;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    api::{Api, FeedSource},
    config::RollupConfig,
    filter::{BumpFilter, CompactFilter, DisplayFilter, Filters, RootFilter},
    item::{FeedItem, RootedMsg},
    lookup::lookup_root,
    obs::{self, Throttled, Value},
    pipeline::Pipeline,
    render::{ItemRenderer, RenderedItem},
    scroller::{ScrollMetrics, Scroller},
    stepper::next_stepper,
    tracker::{Arrival, Tracker, TrackerState, UnreadSets},
    view::Node,
};

pub struct RollupOptions {
    /// Shown above the items, for example a compose box.
    pub prepend: Vec<Node>,
    pub filters: Filters,
    /// The source already yields roots, so bump rollup is skipped.
    pub prefiltered: bool,
    /// Replaces the source's live stream. Messages should carry their roots.
    pub update_stream: Option<BoxStream<'static, RootedMsg>>,
    /// Nothing is scanned or watched until this reads true.
    pub wait_for: watch::Receiver<bool>,
}

impl Default for RollupOptions {
    fn default() -> Self {
        Self {
            prepend: Vec::new(),
            filters: Filters::default(),
            prefiltered: false,
            update_stream: None,
            wait_for: watch::channel(true).1,
        }
    }
}

impl RollupOptions {
    pub fn prepend(mut self, nodes: Vec<Node>) -> Self {
        self.prepend = nodes;
        self
    }

    pub fn root_filter(mut self, filter: RootFilter) -> Self {
        self.filters.root = filter;
        self
    }

    pub fn bump_filter(mut self, filter: BumpFilter) -> Self {
        self.filters.bump = filter;
        self
    }

    pub fn compact_filter(mut self, filter: CompactFilter) -> Self {
        self.filters.compact = filter;
        self
    }

    pub fn display_filter(mut self, filter: DisplayFilter) -> Self {
        self.filters.display = filter;
        self
    }

    pub fn prefiltered(mut self, prefiltered: bool) -> Self {
        self.prefiltered = prefiltered;
        self
    }

    pub fn update_stream(mut self, stream: BoxStream<'static, RootedMsg>) -> Self {
        self.update_stream = Some(stream);
        self
    }

    pub fn wait_for(mut self, gate: watch::Receiver<bool>) -> Self {
        self.wait_for = gate;
        self
    }
}

struct Scan {
    generation: u64,
    abort: AbortHandle,
    scroller: Arc<Scroller>,
    task: JoinHandle<()>,
}

impl Scan {
    fn cancel(self) {
        debug!("Cancelling scan {}", self.generation);
        self.scroller.close();
        self.abort.abort();
        self.task.abort();
    }
}

#[derive(Default)]
struct State {
    sets: UnreadSets,
    scroll: ScrollMetrics,
    generation: u64,
    scan: Option<Scan>,
    tracker: TrackerState,
    tracker_task: Option<JoinHandle<()>>,
    waiters: Vec<JoinHandle<()>>,
    torn_down: bool,
}

struct Inner {
    api: Api,
    source: Arc<dyn FeedSource>,
    config: RollupConfig,
    filters: Filters,
    prefiltered: bool,
    prepend: Vec<Node>,
    wait_for: watch::Receiver<bool>,
    updates: Value<usize>,
    pending: Throttled<usize>,
    loading: Value<bool>,
    done: Value<bool>,
    content: Value<Vec<RenderedItem>>,
    state: Mutex<State>,
}

/// Handle to a running feed. Dropping it tears the feed down.
pub struct Rollup {
    inner: Arc<Inner>,
}

impl Rollup {
    /// Starts the live tracker and the first scan, each once `wait_for`
    /// opens. Must be called from within a tokio runtime.
    pub fn new(
        api: Api,
        source: Arc<dyn FeedSource>,
        options: RollupOptions,
        config: RollupConfig,
    ) -> Self {
        let updates = Value::new(0);
        let pending = obs::throttle(&updates, config.throttle());
        let RollupOptions {
            prepend,
            filters,
            prefiltered,
            update_stream,
            wait_for,
        } = options;

        let inner = Arc::new(Inner {
            api,
            source,
            config,
            filters,
            prefiltered,
            prepend,
            wait_for,
            updates,
            pending,
            loading: Value::new(false),
            done: Value::new(false),
            content: Value::new(Vec::new()),
            state: Mutex::new(State::default()),
        });

        inner.start_tracker(update_stream);
        inner.refresh_when_ready();
        Self { inner }
    }

    /// Drops the current scan and starts over from the newest message.
    pub fn reload(&self) {
        self.inner.refresh_when_ready();
    }

    /// Records the host's scroll position, rendering more near the bottom.
    pub fn scrolled(&self, metrics: ScrollMetrics) {
        let scroller = {
            let mut state = self.inner.lock();
            state.scroll = metrics;
            state.scan.as_ref().map(|scan| scan.scroller.clone())
        };
        if metrics.near_bottom(self.inner.config.bottom_threshold) {
            if let Some(scroller) = scroller {
                trace!("Near bottom, requesting more items");
                scroller.request(self.inner.config.render_step);
            }
        }
    }

    /// Marks every message of a rendered item as read.
    pub fn item_visible(&self, root: &MsgRef) {
        let ids = self.inner.content.with(|content| {
            content
                .iter()
                .find(|item| &item.root == root)
                .map(|item| item.msg_ids.clone())
        });
        if let Some(ids) = ids {
            self.inner.lock().sets.mark_read(ids.iter());
        }
    }

    /// The pending update count as displayed, throttled.
    pub fn pending_updates(&self) -> watch::Receiver<usize> {
        self.inner.pending.watch()
    }

    /// The raw pending update count.
    pub fn updates(&self) -> usize {
        self.inner.updates.get()
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.inner.loading.watch()
    }

    pub fn done(&self) -> bool {
        self.inner.done.get()
    }

    pub fn content(&self) -> Vec<RenderedItem> {
        self.inner.content.get()
    }

    pub fn watch_content(&self) -> watch::Receiver<Vec<RenderedItem>> {
        self.inner.content.watch()
    }

    pub fn tracker_state(&self) -> TrackerState {
        self.inner.lock().tracker
    }

    pub fn unread_ids(&self) -> HashSet<MsgRef> {
        self.inner.lock().sets.unread_ids.clone()
    }

    pub fn new_since_refresh(&self) -> HashSet<MsgRef> {
        self.inner.lock().sets.new_since_refresh.clone()
    }

    pub fn highlight_items(&self) -> HashSet<MsgRef> {
        self.inner.lock().sets.highlight_items.clone()
    }

    /// The notifier, while updates are pending, followed by the scroller.
    pub fn view(&self) -> Node {
        let inner = &self.inner;
        let intl = inner.api.intl.as_ref();
        let mut nodes = Vec::new();

        let pending = inner.pending.get();
        if pending > 0 {
            let noun = if pending == 1 { "update" } else { "updates" };
            nodes.push(
                Node::element("a")
                    .class("Notifier")
                    .class("-loader")
                    .attr("href", "#")
                    .child(intl.i18n("Show "))
                    .child(Node::element("strong").child(pending.to_string()))
                    .child(format!(" {}", intl.i18n(noun)))
                    .into(),
            );
        }

        let items: Vec<Node> = inner
            .content
            .with(|content| content.iter().map(|item| item.node.clone()).collect());
        let mut scroller = Node::element("Scroller")
            .child(
                Node::element("section")
                    .class("prepend")
                    .children(inner.prepend.clone()),
            )
            .child(Node::element("section").class("content").children(items));
        if inner.loading.get() {
            scroller = scroller.child(Node::element("Loading").class("-large"));
        }
        nodes.push(scroller.into());

        Node::Fragment(nodes)
    }

    /// Cancels the scan, the tracker, the throttle timer and any refresh
    /// still waiting on the gate. Later calls do nothing.
    pub fn teardown(&self) {
        self.inner.teardown();
    }
}

impl Drop for Rollup {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refresh_when_ready(self: &Arc<Self>) {
        if *self.wait_for.borrow() {
            self.refresh();
            return;
        }

        trace!("Feed not ready, deferring refresh");
        let inner = self.clone();
        let waiter = tokio::spawn(async move {
            if gate_open(inner.wait_for.clone()).await {
                inner.refresh();
            }
        });

        let mut state = self.lock();
        state.waiters.retain(|waiter| !waiter.is_finished());
        if state.torn_down {
            waiter.abort();
        } else {
            state.waiters.push(waiter);
        }
    }

    fn refresh(self: &Arc<Self>) {
        let mut state = self.lock();
        if state.torn_down {
            return;
        }
        if let Some(scan) = state.scan.take() {
            scan.cancel();
        }

        state.generation += 1;
        let generation = state.generation;
        self.updates.set(0);
        state.sets.refresh();
        self.content.update(|content| content.clear());

        let pipeline = Pipeline {
            api: self.api.clone(),
            root_filter: self.filters.root.clone(),
            bump_filter: self.filters.bump.clone(),
            concurrency: self.config.lookup_concurrency,
        };
        let steps = next_stepper(self.source.clone(), self.config.batch_limit);
        let (items, abort) = stream::abortable(pipeline.compose(steps, self.prefiltered));

        let scroller = Arc::new(Scroller::new(
            &self.config,
            self.done.clone(),
            self.loading.clone(),
        ));
        let task = tokio::spawn({
            let inner = self.clone();
            let scroller = scroller.clone();
            async move {
                scroller
                    .run(items, |item| inner.push_item(generation, item))
                    .await;
                trace!("Scan {} finished", generation);
            }
        });

        state.scan = Some(Scan {
            generation,
            abort,
            scroller,
            task,
        });
        info!("Refreshed feed, starting scan {}", generation);
    }

    /// Renders an item of scan `generation`. False once that scan is stale.
    fn push_item(&self, generation: u64, item: FeedItem) -> bool {
        let mut state = self.lock();
        if state.torn_down || state.generation != generation {
            debug!("Dropping {} from stale scan {}", item.key(), generation);
            return false;
        }

        let renderer = ItemRenderer {
            api: &self.api,
            filters: &self.filters,
            config: &self.config,
        };
        let sets = &state.sets;
        let rendered = renderer.render(&item, |key| sets.priority(key));
        state.sets.unread_ids.remove(item.key());
        self.content.update(|content| content.push(rendered));
        true
    }

    fn start_tracker(self: &Arc<Self>, update_stream: Option<BoxStream<'static, RootedMsg>>) {
        let inner = self.clone();
        let task = tokio::spawn(async move {
            if !gate_open(inner.wait_for.clone()).await {
                return;
            }
            let mut updates = match update_stream {
                Some(stream) => stream,
                None => lookup_root(
                    inner.source.live(),
                    inner.api.clone(),
                    inner.config.lookup_concurrency,
                ),
            };
            inner.lock().tracker = TrackerState::Watching;
            debug!("Watching for updates");

            while let Some(msg) = updates.next().await {
                inner.arrive(msg);
            }
        });
        self.lock().tracker_task = Some(task);
    }

    fn arrive(self: &Arc<Self>, msg: RootedMsg) {
        let tracker = Tracker {
            api: &self.api,
            filters: &self.filters,
            top_threshold: self.config.top_threshold,
        };
        if !tracker.accepts(&msg) {
            trace!("Update {} filtered out", msg.key());
            return;
        }

        let arrival = {
            let mut state = self.lock();
            if state.torn_down {
                return;
            }
            let scroll_top = state.scroll.scroll_top;
            let arrival = tracker.drain(&msg, &mut state.sets, self.updates.get(), scroll_top);
            if let Arrival::Pending(count) = arrival {
                self.updates.set(count);
            }
            arrival
        };

        if arrival == Arrival::Refresh {
            info!("Own message {} arrived at the top, refreshing", msg.key());
            self.refresh();
        }
    }

    fn teardown(&self) {
        let (scan, tracker, waiters) = {
            let mut state = self.lock();
            if state.torn_down {
                return;
            }
            state.torn_down = true;
            state.tracker = TrackerState::Idle;
            state.sets.clear();
            (
                state.scan.take(),
                state.tracker_task.take(),
                std::mem::take(&mut state.waiters),
            )
        };

        if let Some(scan) = scan {
            scan.cancel();
        }
        if let Some(tracker) = tracker {
            tracker.abort();
        }
        for waiter in waiters {
            waiter.abort();
        }
        self.pending.stop();
        info!("Feed torn down");
    }
}

/// Resolves once the gate reads true. False if it closed without opening.
async fn gate_open(mut gate: watch::Receiver<bool>) -> bool {
    loop {
        if *gate.borrow_and_update() {
            return true;
        }
        if gate.changed().await.is_err() {
            return false;
        }
    }
}
