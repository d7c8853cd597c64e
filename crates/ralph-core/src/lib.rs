pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod io;
pub mod iterate;
pub mod paths;
pub mod pipeline;
pub mod plan;
pub mod prompt;
pub mod state;
pub mod ticket;

pub use error::{RalphError, Result};
