//! QueryBrick API server — library crate for the decision HTTP surface.
//!
//! Re-exports all modules so the binary (`main.rs`) and integration tests
//! can access internal types like `AppState` and `build_router`.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
