//! `alertrelay` - Relay vehicle alerts to their owners' browsers
//!
//! This library provides owner accounts with token authentication, storage of
//! browser push subscriptions, and a webhook that turns incoming vehicle
//! alerts into web push notifications.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod push;
pub mod storage;
pub mod user;

pub use auth::TokenIssuer;
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use push::{PushSender, VapidKeys, WebPushSender};
pub use storage::{Database, Storage, StorageStats};
pub use user::User;
