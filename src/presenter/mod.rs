//! Presentation side of a bell detection: the deck of names and the sinks
//! that react to accepted strikes.

pub mod deck;
pub mod sink;

pub use deck::{Deck, DeckEntry, PALETTE};
pub use sink::{ConfirmationPlayer, ConfirmationSound, DeckAdvanceSink, LoggingPlayer, TriggerSink};
