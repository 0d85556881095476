pub mod cameras;
pub mod cli;
pub mod config;
pub mod error;
pub mod openapi;
pub mod poller;
pub mod routes;
pub mod services;
pub mod snapshot;
pub mod state;
pub mod static_assets;
pub mod tile;
pub mod time;
pub mod view;

#[cfg(test)]
pub mod test_support;
