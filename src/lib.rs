pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;

pub use router::{app, AppState};
