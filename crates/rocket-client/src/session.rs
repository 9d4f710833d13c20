//! session.rs — client-side prediction with rollback-and-replay (§4.8, §9).
//!
//! Converted from: myq2-client's cl_pred.rs prediction-and-correction shape
//! (predict locally, then snap to the server's authoritative state when it
//! disagrees), re-expressed around the shared pure `physics::step` function
//! instead of a Quake2 pmove trace against map geometry.

use std::collections::VecDeque;

use rocket_common::physics;
use rocket_common::player::PlayerState;
use rocket_common::wire::Keyboard;

const MAX_BUFFERED_INPUTS: usize = 128;

#[derive(Debug, Clone, Copy)]
struct BufferedInput {
    local_seq: u16,
    keyboard: Keyboard,
    delta_time: f32,
}

/// Drives one local player's predicted state, replaying buffered inputs on
/// top of whatever the server last told us was authoritative.
pub struct PredictionSession {
    pub predicted: PlayerState,
    pending_inputs: VecDeque<BufferedInput>,
}

impl PredictionSession {
    pub fn new(player_id: u8, spawn_pos: (f32, f32)) -> Self {
        Self {
            predicted: PlayerState::spawn(player_id, spawn_pos),
            pending_inputs: VecDeque::with_capacity(MAX_BUFFERED_INPUTS),
        }
    }

    /// Apply one locally-generated input immediately (optimistic prediction)
    /// and remember it in case a later rollback needs to replay it.
    pub fn apply_local_input(&mut self, local_seq: u16, keyboard: Keyboard, delta_time: f32) {
        self.predicted.keyboard = keyboard;
        self.predicted.delta_time = delta_time;
        self.predicted = physics::step(&self.predicted);

        if self.pending_inputs.len() == MAX_BUFFERED_INPUTS {
            self.pending_inputs.pop_front();
        }
        self.pending_inputs.push_back(BufferedInput { local_seq, keyboard, delta_time });
    }

    /// Reseed from an authoritative snapshot of this player's state, drop
    /// every input the server has already applied (everything up to and
    /// including `acked_seq`), and replay what's left so prediction doesn't
    /// visibly rewind.
    pub fn reconcile(&mut self, authoritative: PlayerState, acked_seq: u16) {
        self.pending_inputs
            .retain(|input| rocket_common::reliability::seq_greater_than(input.local_seq, acked_seq));

        self.predicted = authoritative;
        for input in self.pending_inputs.clone() {
            self.predicted.keyboard = input.keyboard;
            self.predicted.delta_time = input.delta_time;
            self.predicted = physics::step(&self.predicted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaying_after_reconcile_reaches_same_state_as_uninterrupted_prediction() {
        let mut baseline = PredictionSession::new(0, (0.0, 0.0));
        for seq in 0..5u16 {
            baseline.apply_local_input(seq, Keyboard::UP, 1.0 / 60.0);
        }

        let mut rolled_back = PredictionSession::new(0, (0.0, 0.0));
        for seq in 0..3u16 {
            rolled_back.apply_local_input(seq, Keyboard::UP, 1.0 / 60.0);
        }
        // Server acked input 1, and told us the resulting state.
        let mut authoritative = PlayerState::spawn(0, (0.0, 0.0));
        authoritative.keyboard = Keyboard::UP;
        authoritative.delta_time = 1.0 / 60.0;
        authoritative = physics::step(&authoritative);
        authoritative = physics::step(&authoritative);
        rolled_back.reconcile(authoritative, 1);
        for seq in 3..5u16 {
            rolled_back.apply_local_input(seq, Keyboard::UP, 1.0 / 60.0);
        }

        assert!((baseline.predicted.pos.0 - rolled_back.predicted.pos.0).abs() < 1e-3);
        assert!((baseline.predicted.pos.1 - rolled_back.predicted.pos.1).abs() < 1e-3);
    }

    #[test]
    fn fully_acked_inputs_are_dropped_from_replay_buffer() {
        let mut session = PredictionSession::new(0, (0.0, 0.0));
        for seq in 0..10u16 {
            session.apply_local_input(seq, Keyboard::UP, 1.0 / 60.0);
        }
        session.reconcile(PlayerState::spawn(0, (1.0, 1.0)), 9);
        assert!(session.pending_inputs.is_empty());
    }
}
