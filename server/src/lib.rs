pub extern crate actix_web;

pub mod connection;
mod connection_tx_storage;
pub mod handlers;
pub mod server;
pub mod settings;
