//! Test helpers for pullmirror-server.

#![allow(dead_code, unused_imports)]

pub mod client;
pub mod fixtures;

pub use client::{TestClient, TestResponse, post_hook};
pub use fixtures::{FakeWebhooks, Mirrors, Running, eventually, repo_label};
