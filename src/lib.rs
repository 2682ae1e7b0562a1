//! Discourse Keyword Scanner library.
//!
//! Polls a Discourse forum's latest posts on a fixed interval and reports the posts
//! whose title or raw content contains one of the configured keywords.

pub mod checker;
pub mod config;
pub mod fetcher;
pub mod notify;
pub mod post;
