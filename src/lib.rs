//! USSD event registration: dialog engine, storage and webhooks.

pub mod config;
pub mod error;
pub mod notify;
pub mod registration;
pub mod store;
pub mod ussd;
pub mod webhook;
