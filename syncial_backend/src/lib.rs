pub mod api;
pub mod bootstrap;
pub mod chain;
pub mod cli;
pub mod config;
pub mod contracts;
pub mod database;
pub mod error;
pub mod feed;
pub mod node;
pub mod polling;
pub mod prices;
pub mod services;
pub mod storage;
pub mod telemetry;
pub mod upload_client;
pub mod utils;
pub mod wallet;
