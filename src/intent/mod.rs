//! Local intent resolution ahead of the model.

pub mod chain;
pub mod interpreter;

pub use chain::{Intent, IntentChain, Stage};
pub use interpreter::{Interpretation, SessionContext};
