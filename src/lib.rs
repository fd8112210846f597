#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod agent;
pub mod channels;
pub mod config;
pub mod credentials;
pub mod gateway;
pub mod logging;
pub mod security;
pub mod util;

pub use config::Config;
