//! Watches chat messages for real-estate listing links, scrapes each listing,
//! finds the nearest emergency hospital and records the result.

pub mod bot;
pub mod config;
pub mod geo;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod scrapers;
pub mod store;
