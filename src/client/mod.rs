//! Client-side game state machine.
//!
//! The controller task owns the board, consumes decoded server events
//! and user intents through one serialized loop, and publishes
//! notifications for a presentation layer to render.
mod controller;
mod messages;

pub use controller::{start_controller, GameHandle};
pub use messages::{GameNotification, GamePhase, UserIntent};
