//! Rolls a Secure Scuttlebutt message stream up into a feed of threads.
//!
//! A [`Rollup`] scans a [`FeedSource`] backwards, groups replies under their
//! roots, renders threads as the host scrolls, and counts what arrives live
//! until the host reloads.

pub mod api;
pub mod authors;
pub mod bump;
pub mod config;
mod error;
pub mod filter;
pub mod item;
pub mod lookup;
pub mod memory;
pub mod obs;
pub mod pipeline;
pub mod render;
pub mod rollup;
pub mod scroller;
pub mod stepper;
pub mod tracker;
pub mod view;

#[cfg(test)]
mod testing;

pub use api::{Api, FeedSource, Intl, MessageStore, MessageSync, Render, RenderOptions};
pub use config::RollupConfig;
pub use error::Error;
pub use filter::Filters;
pub use item::{FeedItem, RootedMsg};
pub use rollup::{Rollup, RollupOptions};
pub use scroller::ScrollMetrics;
pub use view::{Element, Node};
