pub mod handlers;
pub mod state;
mod tracker;
