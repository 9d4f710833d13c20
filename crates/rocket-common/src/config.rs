//! config.rs — shared constants and env-var fallback helpers used by the
//! server, client, and forwarder binaries' `clap` CLI layers (§2 ambient
//! stack, §4.6).
//!
//! Converted from: myq2-common's old Cvar-driven configuration; there is
//! no persistent settings file in this protocol, so this is deliberately a
//! handful of named constants plus one helper, not a full cvar registry.

pub const DEFAULT_PORT: u16 = 3501;
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const MAX_PLAYERS: usize = 8;
pub const IDLE_TICK_SECS: u64 = 5;
pub const IDLE_SHUTDOWN_TICKS: u32 = 20;
pub const DISCONNECT_RESEND_COUNT: u32 = 10;

/// Read an environment variable, falling back to `default` if unset or
/// unparsable, the same override precedence each binary's `clap` args use
/// for values not passed on the command line.
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
