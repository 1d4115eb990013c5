pub mod api;
pub mod app;
pub mod auth;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod error;
pub mod highlight;
pub mod model;
pub mod proxy;
pub mod search;
pub mod session;
pub mod store;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use error::{ClientError, ClientResult};
