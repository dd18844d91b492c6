//! Taxi booking web service.
//!
//! Serves the booking, feedback and comment pages, forwards bookings and
//! emergencies to the telephony provider, and streams the simulated taxi
//! position to every connected WebSocket client.

pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod http_server;
pub mod models;
pub mod state;
pub mod tasks;
pub mod telephony;
pub mod views;

pub use broadcast::{BroadcastHub, WsClientMap, WsServerMessage};
pub use error::{AppError, Result};
