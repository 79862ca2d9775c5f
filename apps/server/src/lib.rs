pub mod api;
pub mod config;
pub mod error;
pub mod main_lib;
pub mod scheduler;

pub use main_lib::{assemble_state, build_state, init_tracing, AppState};
