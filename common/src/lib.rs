mod auth;
mod wire;

pub mod games;
pub mod api;

pub use auth::*;
pub use api::*;
pub use games::matches::{Match, Move, Turn};
pub use games::rock_paper_scissors::RPSMove;
