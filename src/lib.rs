//! Voice-driven hint labels for web pages.
//!
//! Each frame runs a [`context::context::DocumentContext`] that tracks which
//! elements can be hinted, keeps their labels and executes actions on them.
//! A [`coordinator::coordinator::Coordinator`] owns the per-tab label stacks
//! and routes controller requests to the frames that own the named labels.

pub mod cli;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod dispatch;
pub mod dom;
pub mod error;
pub mod hints;
pub mod protocol;
pub mod registry;
pub mod scenario;
pub mod tracker;
