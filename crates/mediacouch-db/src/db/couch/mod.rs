//! CouchDB over HTTP.

mod client;
mod store;

pub use client::RetryPolicy;
pub use store::{CouchDocumentStore, CouchServer};
