//! Chat session synchronizer.
//!
//! Keeps one ordered, deduplicated view of the open conversation while history
//! pages, live channel pushes and optimistic sends arrive in any order.

pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;
pub mod realtime;
pub mod usecases;
