//! clock.rs — client/server clock synchronization (§4.5).
//!
//! Converted from: myq2-common's RTT-sampling shape in net_chan.rs, adapted
//! here to estimate a one-way clock *offset* rather than just round-trip
//! time: each sample pairs a `Clock`/`ClockResponse` exchange with the RTT
//! already tracked by `reliability::ReliabilityState`.

use crate::error::HandshakeError;

pub const SAMPLE_COUNT: usize = 5;

/// One `Clock -> ClockResponse` round trip's contribution to the offset
/// estimate.
#[derive(Debug, Clone, Copy)]
pub struct ClockSample {
    pub client_send_ms: i64,
    pub client_recv_ms: i64,
    pub server_time_ms: i64,
}

impl ClockSample {
    fn rtt_ms(&self) -> f64 {
        (self.client_recv_ms - self.client_send_ms) as f64
    }

    /// Offset such that `server_time ≈ client_time + offset`, estimated by
    /// averaging the send-side and receive-side estimates against half the
    /// round trip.
    fn offset_ms(&self) -> f64 {
        let half_rtt = self.rtt_ms() / 2.0;
        let from_send = self.server_time_ms as f64 - self.client_send_ms as f64 - half_rtt;
        let from_recv = self.server_time_ms as f64 - self.client_recv_ms as f64 - half_rtt;
        (from_send + from_recv) / 2.0
    }
}

/// Accumulates up to `SAMPLE_COUNT` samples, then reports the mean offset.
#[derive(Debug, Default)]
pub struct ClockSync {
    samples: Vec<ClockSample>,
}

impl ClockSync {
    pub fn new() -> Self {
        Self { samples: Vec::with_capacity(SAMPLE_COUNT) }
    }

    pub fn push(&mut self, sample: ClockSample) {
        if self.samples.len() < SAMPLE_COUNT {
            self.samples.push(sample);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.samples.len() >= SAMPLE_COUNT
    }

    /// Mean offset across collected samples. `server_time ≈ client_time + offset`.
    pub fn offset_ms(&self) -> Result<f64, HandshakeError> {
        if self.samples.is_empty() {
            return Err(HandshakeError::NoClockSamples);
        }
        let sum: f64 = self.samples.iter().map(ClockSample::offset_ms).sum();
        Ok(sum / self.samples.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_tracks_a_constant_clock_skew() {
        let mut sync = ClockSync::new();
        let skew = 500.0;
        for i in 0..SAMPLE_COUNT {
            let send = 1_000 + i as i64 * 100;
            let rtt = 40;
            let recv = send + rtt;
            let server_time = send + rtt / 2 + skew as i64;
            sync.push(ClockSample {
                client_send_ms: send,
                client_recv_ms: recv,
                server_time_ms: server_time,
            });
        }
        assert!(sync.is_complete());
        let offset = sync.offset_ms().unwrap();
        assert!((offset - skew).abs() < 1.0);
    }

    #[test]
    fn empty_sync_reports_no_samples() {
        let sync = ClockSync::new();
        assert!(matches!(sync.offset_ms(), Err(HandshakeError::NoClockSamples)));
    }

    #[test]
    fn extra_pushes_past_sample_count_are_ignored() {
        let mut sync = ClockSync::new();
        for i in 0..(SAMPLE_COUNT + 3) {
            sync.push(ClockSample {
                client_send_ms: i as i64,
                client_recv_ms: i as i64 + 10,
                server_time_ms: i as i64 + 5,
            });
        }
        assert_eq!(sync.samples.len(), SAMPLE_COUNT);
    }
}
