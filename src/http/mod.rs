//! HTTP transport for artifact downloads.

mod client;

pub use client::{FetchError, HttpClient, USER_AGENT};
