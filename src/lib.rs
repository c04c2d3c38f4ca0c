//! framehouse: an on-demand media render service.
//!
//! Requests name a registered composition and its input props; the service
//! drives an external rendering engine, keeps the produced artifacts on disk
//! under a retention policy and answers repeat requests from that cache.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
