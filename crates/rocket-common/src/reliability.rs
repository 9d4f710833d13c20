//! reliability.rs — sequence/ack bookkeeping layered over the unordered
//! datagram socket (§4.2).
//!
//! Converted from: myq2-common's net_chan.rs (`netchan_transmit`,
//! `netchan_process`, its reliable-bit/ack dance), re-expressed for a
//! 16-bit wire sequence extended to a monotonic u64, and a 32-bit ack
//! bitfield instead of net_chan's single reliable-ack flag.

use std::collections::VecDeque;

/// Longest run of in-flight packets either side remembers for ack matching
/// and RTT sampling. One more than the ack bitfield's 32 bits so the
/// bitfield can always describe the full window.
pub const HISTORY_WINDOW: usize = 33;

/// Wire sequence numbers wrap at 16 bits; this computes `a - b` accounting
/// for wraparound the way TCP-style sequence comparisons do.
pub fn seq_diff(a: u16, b: u16) -> i32 {
    (a as i32).wrapping_sub(b as i32) as i16 as i32
}

pub fn seq_greater_than(a: u16, b: u16) -> bool {
    seq_diff(a, b) > 0
}

#[derive(Debug, Clone, Copy)]
struct SentEntry {
    wire_seq: u16,
    monotonic_seq: u64,
    sent_at_ms: i64,
    acked: bool,
}

#[derive(Debug, Clone, Copy)]
struct RecvEntry {
    wire_seq: u16,
}

/// Per-peer outgoing/incoming sequence state: assigns our own sequence
/// numbers, tracks which of our packets the peer has acked, and builds the
/// ack bitfield we attach to outgoing packets describing what we've received.
#[derive(Debug)]
pub struct ReliabilityState {
    next_local_seq: u16,
    local_monotonic: u64,
    highest_remote_seq: Option<u16>,
    remote_monotonic: u64,
    sent_history: VecDeque<SentEntry>,
    recv_history: VecDeque<RecvEntry>,
    round_trip_time_ms: Option<f64>,
    packets_lost: u64,
    duplicates_dropped: u64,
    out_of_order_dropped: u64,
}

impl ReliabilityState {
    pub fn new() -> Self {
        Self {
            next_local_seq: 0,
            local_monotonic: 0,
            highest_remote_seq: None,
            remote_monotonic: 0,
            sent_history: VecDeque::with_capacity(HISTORY_WINDOW),
            recv_history: VecDeque::with_capacity(HISTORY_WINDOW),
            round_trip_time_ms: None,
            packets_lost: 0,
            duplicates_dropped: 0,
            out_of_order_dropped: 0,
        }
    }

    /// Allocate the next outgoing sequence number and record it as sent,
    /// so a later ack against it can be matched and timed. An entry evicted
    /// from the window while still unacknowledged counts as packet loss.
    pub fn next_outgoing(&mut self, now_ms: i64) -> (u16, u64) {
        let wire_seq = self.next_local_seq;
        let monotonic_seq = self.local_monotonic;
        self.next_local_seq = self.next_local_seq.wrapping_add(1);
        self.local_monotonic += 1;
        self.push_sent(SentEntry { wire_seq, monotonic_seq, sent_at_ms: now_ms, acked: false });
        (wire_seq, monotonic_seq)
    }

    /// Record that `wire_seq` — assigned by a caller that owns sequencing
    /// itself (the client's frame thread, so the same number also keys its
    /// prediction replay buffer) — was just sent, for ack matching, RTT
    /// sampling, and packet-loss accounting. Unlike `next_outgoing`, this
    /// does not advance `next_local_seq`/`local_monotonic`.
    pub fn record_sent(&mut self, wire_seq: u16, now_ms: i64) {
        self.push_sent(SentEntry { wire_seq, monotonic_seq: wire_seq as u64, sent_at_ms: now_ms, acked: false });
    }

    fn push_sent(&mut self, entry: SentEntry) {
        if self.sent_history.len() == HISTORY_WINDOW {
            if let Some(evicted) = self.sent_history.pop_front() {
                if !evicted.acked {
                    self.packets_lost += 1;
                }
            }
        }
        self.sent_history.push_back(entry);
    }

    /// Fold a freshly received wire sequence number into our receive
    /// history and return the 32-bit ack bitfield to send back: bit 31 is
    /// set if `highest - 1` was received, bit 30 if `highest - 2`, down to
    /// bit 0 for `highest - 32` (the highest itself is carried out-of-band
    /// as the explicit ack, not in this bitfield). Only forward-progressing
    /// packets extend the history; exact duplicates and late out-of-order
    /// arrivals are dropped and counted instead.
    pub fn record_received(&mut self, wire_seq: u16) -> (u16, u32) {
        match self.highest_remote_seq {
            None => {
                self.highest_remote_seq = Some(wire_seq);
                self.remote_monotonic += 1;
                self.push_recv(wire_seq);
            }
            Some(highest) => {
                let diff = seq_diff(wire_seq, highest);
                if diff > 0 {
                    self.highest_remote_seq = Some(wire_seq);
                    self.remote_monotonic += diff as u64;
                    self.push_recv(wire_seq);
                } else if diff == 0 {
                    self.duplicates_dropped += 1;
                } else {
                    self.out_of_order_dropped += 1;
                }
            }
        }

        let highest = self.highest_remote_seq.unwrap();
        let mut ack_bits = 0u32;
        for entry in self.recv_history.iter() {
            let diff = seq_diff(highest, entry.wire_seq);
            if diff >= 1 && diff <= 32 {
                ack_bits |= 1 << (32 - diff);
            }
        }
        (highest, ack_bits)
    }

    fn push_recv(&mut self, wire_seq: u16) {
        if self.recv_history.len() == HISTORY_WINDOW {
            self.recv_history.pop_front();
        }
        self.recv_history.push_back(RecvEntry { wire_seq });
    }

    pub fn packets_lost(&self) -> u64 {
        self.packets_lost
    }

    pub fn duplicates_dropped(&self) -> u64 {
        self.duplicates_dropped
    }

    pub fn out_of_order_dropped(&self) -> u64 {
        self.out_of_order_dropped
    }

    /// Apply an incoming `(remote_ack, ack_bits)` pair against our own sent
    /// history, marking matched entries acked (first-ack-wins, so an entry
    /// already acked by an earlier call is left alone). The mean RTT over
    /// every entry newly acked this call is published as
    /// `round_trip_time_ms` and also returned.
    pub fn apply_ack(&mut self, remote_ack: u16, ack_bits: u32, now_ms: i64) -> Option<f64> {
        let mut newly_acked_rtts = Vec::new();
        for entry in self.sent_history.iter_mut() {
            if entry.acked {
                continue;
            }
            let diff = seq_diff(remote_ack, entry.wire_seq);
            let matched = diff == 0 || (diff >= 1 && diff <= 32 && (ack_bits & (1 << (32 - diff))) != 0);
            if matched {
                entry.acked = true;
                newly_acked_rtts.push((now_ms - entry.sent_at_ms).max(0) as f64);
            }
        }
        if newly_acked_rtts.is_empty() {
            return None;
        }
        let mean_rtt = newly_acked_rtts.iter().sum::<f64>() / newly_acked_rtts.len() as f64;
        self.round_trip_time_ms = Some(mean_rtt);
        Some(mean_rtt)
    }

    pub fn round_trip_time_ms(&self) -> Option<f64> {
        self.round_trip_time_ms
    }

    pub fn local_monotonic(&self) -> u64 {
        self.local_monotonic
    }

    pub fn remote_monotonic(&self) -> u64 {
        self.remote_monotonic
    }
}

impl Default for ReliabilityState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_diff_handles_wraparound() {
        assert_eq!(seq_diff(1, 0), 1);
        assert_eq!(seq_diff(0, 1), -1);
        assert_eq!(seq_diff(0, 65535), 1);
        assert_eq!(seq_diff(65535, 0), -1);
    }

    #[test]
    fn ack_bitfield_reflects_received_history() {
        let mut state = ReliabilityState::new();
        state.record_received(0);
        state.record_received(1);
        let (highest, bits) = state.record_received(2);
        assert_eq!(highest, 2);
        // bit 31 => seq 1 received (highest - 1), bit 30 => seq 0 received (highest - 2)
        assert_eq!(bits, (1 << 31) | (1 << 30));
    }

    #[test]
    fn ack_bitfield_matches_scenario_s4() {
        let mut state = ReliabilityState::new();
        state.record_received(95);
        state.record_received(97);
        state.record_received(99);
        let (highest, bits) = state.record_received(100);
        assert_eq!(highest, 100);
        assert_eq!(bits, 0xA800_0000);
    }

    #[test]
    fn duplicate_arrival_is_dropped_and_counted() {
        let mut state = ReliabilityState::new();
        state.record_received(7);
        let (highest, _) = state.record_received(7);
        assert_eq!(highest, 7);
        assert_eq!(state.duplicates_dropped(), 1);
    }

    #[test]
    fn sequence_wrap_advances_monotonic_counter_across_the_16_bit_boundary() {
        let mut state = ReliabilityState {
            highest_remote_seq: Some(65535),
            remote_monotonic: 100_000,
            ..ReliabilityState::new()
        };
        let (highest, _) = state.record_received(0);
        assert_eq!(highest, 0);
        assert_eq!(state.remote_monotonic(), 100_001);
    }

    #[test]
    fn remote_monotonic_advances_by_the_gap_size() {
        let mut state = ReliabilityState::new();
        state.record_received(10);
        state.record_received(15);
        assert_eq!(state.remote_monotonic(), 6);
    }

    #[test]
    fn unacknowledged_eviction_from_sent_history_counts_as_loss() {
        let mut state = ReliabilityState::new();
        for i in 0..(HISTORY_WINDOW as i64 + 1) {
            state.next_outgoing(1_000 + i);
        }
        assert_eq!(state.packets_lost(), 1);
    }

    #[test]
    fn out_of_order_arrival_does_not_regress_highest() {
        let mut state = ReliabilityState::new();
        state.record_received(5);
        let (highest, _) = state.record_received(3);
        assert_eq!(highest, 5);
        assert_eq!(state.out_of_order_dropped(), 1);
    }

    #[test]
    fn apply_ack_matches_via_bitfield_and_does_not_recount_already_acked_entries() {
        let mut state = ReliabilityState::new();
        let (seq_a, _) = state.next_outgoing(1_000);
        let (seq_b, _) = state.next_outgoing(1_010);
        // Peer says it has seq_b, and one bit back (seq_a) too: diff 1 => bit 31.
        let rtt_first = state.apply_ack(seq_b, 1 << 31, 1_050);
        assert!(rtt_first.is_some());
        // Re-applying the same ack should not double-count RTT.
        let rtt_second = state.apply_ack(seq_b, 1 << 31, 1_060);
        assert!(rtt_second.is_none());
        let _ = seq_a;
    }

    #[test]
    fn apply_ack_publishes_mean_rtt_over_entries_newly_acked_this_call() {
        let mut state = ReliabilityState::new();
        let (seq_a, _) = state.next_outgoing(1_000); // rtt 100 when acked at 1_100
        let (seq_b, _) = state.next_outgoing(1_050); // rtt 50 when acked at 1_100
        // Both land in the same ack: seq_b is the literal ack, seq_a is one bit back.
        let mean = state.apply_ack(seq_b, 1 << 31, 1_100).unwrap();
        assert!((mean - 75.0).abs() < 1e-6);
        assert_eq!(state.round_trip_time_ms(), Some(mean));
    }

    #[test]
    fn history_window_is_bounded() {
        let mut state = ReliabilityState::new();
        for seq in 0..100u16 {
            state.record_received(seq);
        }
        assert!(state.recv_history.len() <= HISTORY_WINDOW);
    }
}
