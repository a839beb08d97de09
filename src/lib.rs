pub mod api;
pub mod app;
pub mod engine;
pub mod error;
pub mod extract;
pub mod names;
pub mod notify;
pub mod storage;
pub mod utils;

pub use engine::{ConnectionState, Engine, Signal};
