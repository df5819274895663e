//! Trigger sinks: what happens when the detector accepts a bell strike.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::deck::{Deck, DeckEntry};
use crate::analysis::DetectionEvent;

/// Receives accepted detections. Called on the sampling thread, at most once
/// per cooldown window; implementations must return quickly.
pub trait TriggerSink: Send + Sync {
    fn on_detection_event(&self, event: &DetectionEvent);
}

/// Sound played to confirm an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationSound {
    Bell,
    Alternate,
}

impl ConfirmationSound {
    /// Pick a sound, `Alternate` with the given probability.
    pub fn pick<R: Rng + ?Sized>(rng: &mut R, alternate_probability: f64) -> Self {
        let p = if alternate_probability.is_nan() {
            0.0
        } else {
            alternate_probability.clamp(0.0, 1.0)
        };
        if rng.gen_bool(p) {
            ConfirmationSound::Alternate
        } else {
            ConfirmationSound::Bell
        }
    }
}

/// Playback of confirmation sounds. Failures are the player's own concern.
pub trait ConfirmationPlayer: Send + Sync {
    fn play(&self, sound: ConfirmationSound);
}

/// Player that only logs what would have been played.
#[derive(Debug, Default)]
pub struct LoggingPlayer;

impl ConfirmationPlayer for LoggingPlayer {
    fn play(&self, sound: ConfirmationSound) {
        tracing::info!("[ConfirmationPlayer] playing {:?}", sound);
    }
}

/// Advances a deck on every detection and plays a confirmation sound.
pub struct DeckAdvanceSink {
    deck: Mutex<Deck>,
    rng: Mutex<StdRng>,
    player: Option<Box<dyn ConfirmationPlayer>>,
    alternate_probability: f64,
}

impl DeckAdvanceSink {
    pub fn new(deck: Deck, player: Option<Box<dyn ConfirmationPlayer>>) -> Self {
        Self::with_rng(deck, player, StdRng::from_entropy())
    }

    /// Deterministic sound selection for tests and replays.
    pub fn with_seed(deck: Deck, player: Option<Box<dyn ConfirmationPlayer>>, seed: u64) -> Self {
        Self::with_rng(deck, player, StdRng::seed_from_u64(seed))
    }

    fn with_rng(deck: Deck, player: Option<Box<dyn ConfirmationPlayer>>, rng: StdRng) -> Self {
        Self {
            deck: Mutex::new(deck),
            rng: Mutex::new(rng),
            player,
            alternate_probability: 0.01,
        }
    }

    pub fn with_alternate_probability(mut self, probability: f64) -> Self {
        self.alternate_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Manual advance, same path as a detected bell minus the sound.
    pub fn tap(&self) -> Option<DeckEntry> {
        let mut deck = self.deck.lock().unwrap_or_else(|e| e.into_inner());
        deck.advance().cloned()
    }

    pub fn current_entry(&self) -> Option<DeckEntry> {
        let deck = self.deck.lock().unwrap_or_else(|e| e.into_inner());
        deck.current().cloned()
    }

    pub fn counter_label(&self) -> String {
        let deck = self.deck.lock().unwrap_or_else(|e| e.into_inner());
        deck.counter_label()
    }

    fn pick_sound(&self) -> ConfirmationSound {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        ConfirmationSound::pick(&mut *rng, self.alternate_probability)
    }
}

impl TriggerSink for DeckAdvanceSink {
    fn on_detection_event(&self, event: &DetectionEvent) {
        let (entry, label) = {
            let mut deck = self.deck.lock().unwrap_or_else(|e| e.into_inner());
            let entry = deck.advance().map(|e| e.name.clone());
            (entry, deck.counter_label())
        };
        tracing::info!(
            "[DeckAdvanceSink] bell at {}ms -> {} ({})",
            event.timestamp_ms,
            entry.as_deref().unwrap_or("<empty deck>"),
            label
        );

        if let Some(player) = &self.player {
            player.play(self.pick_sound());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn event(timestamp_ms: u64) -> DetectionEvent {
        DetectionEvent {
            timestamp_ms,
            level_db: -10.0,
            spike_strength: 40.0,
            oscillation_score: 40.0,
            baseline_db: -60.0,
        }
    }

    #[derive(Default)]
    struct RecordingPlayer {
        played: Arc<Mutex<Vec<ConfirmationSound>>>,
    }

    impl ConfirmationPlayer for RecordingPlayer {
        fn play(&self, sound: ConfirmationSound) {
            self.played.lock().unwrap().push(sound);
        }
    }

    #[test]
    fn detection_advances_deck_and_plays() {
        let played = Arc::new(Mutex::new(Vec::new()));
        let player = RecordingPlayer {
            played: Arc::clone(&played),
        };
        let sink = DeckAdvanceSink::with_seed(
            Deck::from_names(["a", "b"]),
            Some(Box::new(player)),
            7,
        );

        sink.on_detection_event(&event(100));
        assert_eq!(sink.current_entry().map(|e| e.name), Some("b".to_string()));
        sink.on_detection_event(&event(900));
        assert_eq!(sink.current_entry().map(|e| e.name), Some("a".to_string()));
        assert_eq!(played.lock().unwrap().len(), 2);
    }

    #[test]
    fn tap_shares_advance() {
        let sink = DeckAdvanceSink::with_seed(Deck::from_names(["a", "b", "c"]), None, 1);
        assert_eq!(sink.tap().map(|e| e.name), Some("b".to_string()));
        sink.on_detection_event(&event(0));
        assert_eq!(sink.counter_label(), "3 / 3");
    }

    #[test]
    fn empty_deck_does_not_panic() {
        let sink = DeckAdvanceSink::with_seed(Deck::new(), Some(Box::new(LoggingPlayer)), 1);
        sink.on_detection_event(&event(0));
        assert!(sink.current_entry().is_none());
    }

    #[test]
    fn alternate_sound_is_rare() {
        let mut rng = StdRng::seed_from_u64(42);
        let alternates = (0..10_000)
            .filter(|_| ConfirmationSound::pick(&mut rng, 0.01) == ConfirmationSound::Alternate)
            .count();
        assert!((40..=170).contains(&alternates), "alternates: {}", alternates);
    }

    #[test]
    fn probability_extremes() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(ConfirmationSound::pick(&mut rng, 0.0), ConfirmationSound::Bell);
        assert_eq!(ConfirmationSound::pick(&mut rng, 1.0), ConfirmationSound::Alternate);
    }
}
