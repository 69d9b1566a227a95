#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod explain;
pub mod menu;
pub mod popup;
pub mod router;
pub mod server;
pub mod session;
pub mod tui;

pub use error::{Error, Result};
