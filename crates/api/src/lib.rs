//! HTTP API: routing, request/response mapping, and error envelopes over
//! the workforce analytics engine.

pub mod app;
pub mod context;
pub mod middleware;
