//! Core types and logic for Parley, the contact-visibility and realtime chat
//! layer of the event-scheduling application.
//!
//! This crate has no HTTP or database dependencies. The
//! backing store is reached only through [`store::MessagingStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod event;
pub mod graph;
pub mod message;
pub mod registry;
pub mod session;
pub mod store;
pub mod user;
pub mod visibility;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
