//! Takedown bot — stateless Telegram back end for screenshot analysis,
//! takedown drafting, and multi-identity dispatch.

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod presentation;
pub mod store;
pub mod webhook;
pub mod wizard;
