//! Offline-resilience layer for a library-management web client: a
//! request cache with per-class strategies, a durable queue for mutations
//! issued while offline, notifications that survive navigation, and the
//! lifecycle manager that wires platform signals into all three.

pub mod app;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod event;
pub mod http;
pub mod lifecycle;
pub mod notify;
pub mod queue;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
