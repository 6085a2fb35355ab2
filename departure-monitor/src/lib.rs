//! Public transport departure monitor.
//!
//! Polls departure boards of configured stops from regional providers
//! (EFA networks, Trafiklab, GTFS-Realtime feeds) and serves boards, delay
//! reports and stop search over HTTP.

pub mod cache;
pub mod config;
pub mod domain;
pub mod gtfs;
pub mod monitor;
pub mod provider;
pub mod rate_limit;
pub mod registry;
pub mod stops;
pub mod web;
