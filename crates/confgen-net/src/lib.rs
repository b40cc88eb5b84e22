//! confgen Network Layer
//!
//! A deliberately small HTTPS client for talking to VPN provider APIs.
//!
//! Architecture:
//! 1. Build a [`GetRequest`] (URL, query filters, headers, basic auth)
//! 2. Connect over TCP, wrap in rustls for `https`
//! 3. One HTTP/1.1 exchange through hyper, body buffered up to a limit
//! 4. Cancellation token and timeouts race the whole exchange

mod client;

pub use client::{GetRequest, HttpClient, HttpClientConfig, HttpError, Response};
pub use hyper::StatusCode;
pub use tokio_util::sync::CancellationToken;
