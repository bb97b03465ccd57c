//! Conversation state: history, saved sessions and the turn controller.

pub mod history;
pub mod session;
pub mod turn;

pub use history::History;
pub use turn::{TurnController, TurnOutcome};
