//! Observable cells.
//!
//! A [`Value`] has a single writer and any number of readers subscribed via
//! [`Value::watch`]. [`throttle`] derives a second cell that follows the first
//! at most once per window.

use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::sleep};

pub struct Value<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Value<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.tx.borrow().clone()
    }

    /// Runs `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Stores `value`, notifying readers only when it differs.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    pub fn watch(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

/// A cell that trails its source by at most one window.
pub struct Throttled<T> {
    rx: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Throttled<T> {
    pub fn watch(&self) -> watch::Receiver<T> {
        self.rx.clone()
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.rx.borrow().clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl<T> Drop for Throttled<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Follows `source`, publishing the first change of a burst immediately and
/// the latest value once the window closes.
///
/// Must be called from within a tokio runtime.
pub fn throttle<T>(source: &Value<T>, window: Duration) -> Throttled<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let mut input = source.watch();
    let (tx, rx) = watch::channel(input.borrow_and_update().clone());

    let task = tokio::spawn(async move {
        loop {
            if input.changed().await.is_err() {
                return;
            }
            loop {
                let value = input.borrow_and_update().clone();
                tx.send_if_modified(|current| {
                    if *current == value {
                        false
                    } else {
                        *current = value;
                        true
                    }
                });
                sleep(window).await;
                match input.has_changed() {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(_) => return,
                }
            }
        }
    });

    Throttled { rx, task }
}
