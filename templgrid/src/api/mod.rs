//! REST API module for templgrid
//!
//! Provides the send endpoint, template previews and a health check

pub mod handlers;
pub mod server;

pub use server::{ApiServer, Routes};
