//! Weather data that survives outages.
//!
//! [`cache`] holds the service-independent part: named slots that keep the last
//! good result of a remote operation, and [`cache::fetch_with_fallback`] which
//! turns every call into fresh data, stale data, or an explicit
//! `Unavailable`. [`owm`] wires the OpenWeatherMap endpoints through it.

pub mod cache;
pub mod commands;
pub mod config;
pub mod logging;
pub mod owm;
