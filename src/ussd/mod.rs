//! The dialog core: input decoding, sessions, retries, menus and routing.

pub mod catalog;
pub mod engine;
pub mod input;
pub mod response;
pub mod retry;
pub mod session;

pub use catalog::{MenuCatalog, School};
pub use engine::UssdEngine;
pub use response::{UssdResponse, WireResponse};
pub use retry::{RetryGuard, RetryVerdict};
pub use session::{
    Clock, ManualClock, Session, SessionData, SessionStore, SessionSweeper, SystemClock,
    spawn_sweeper,
};
