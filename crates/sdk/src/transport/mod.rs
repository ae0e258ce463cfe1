//! Transport layer for the docflow SDK.

pub mod http;

pub use http::HttpTransport;
