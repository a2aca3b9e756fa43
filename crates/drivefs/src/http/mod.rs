//! Backend speaking the remote store's REST API.

mod auth;
#[cfg(test)]
mod canned;
mod client;
mod upload;

pub use client::{HttpBackend, PAGE_SIZE};
