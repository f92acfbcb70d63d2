//! Terminal User Interface for slurmtop.
//!
//! A thin consumer of the providers: it reads filtered copies on every render
//! and asks the refresh scheduler for fetches.

mod app;
mod event;
mod input;
mod render;
mod state;
mod style;

pub use app::App;
pub use state::AppState;
