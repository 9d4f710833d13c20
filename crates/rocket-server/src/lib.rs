//! Authoritative server: single-threaded dispatch loop that owns every
//! connected player's reliability state and steps the shared physics
//! function once per inbound input frame.

pub mod dispatcher;
