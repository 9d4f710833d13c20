//! handshake.rs — two-round salt handshake that establishes a
//! `connection_salt` before any game traffic is trusted (§4.3, §4.4).
//!
//! Converted from: myq2-common's net_chan.rs `netchan_out_of_band`
//! connectionless-packet dance (`getchallenge`/`connect`), re-expressed as
//! an explicit state machine instead of string-parsed out-of-band commands,
//! and padded to `wire::HANDSHAKE_PAD_SIZE` per packet to block UDP
//! amplification the way the original's fixed-size `NetworkPacket` framing
//! already does implicitly.

use rand::Rng;

use crate::error::{AuthError, HandshakeError};
use crate::wire::Packet;

/// Client-side steps of §4.4: send a request, remember our salt, wait for
/// the matching challenge, then send the combined salt back.
#[derive(Debug)]
pub struct ClientHandshake {
    client_salt: u64,
    server_salt: Option<u64>,
}

impl ClientHandshake {
    pub fn new() -> Self {
        Self {
            client_salt: rand::thread_rng().gen(),
            server_salt: None,
        }
    }

    pub fn connection_request(&self) -> Packet {
        Packet::ConnectionRequest { client_salt: self.client_salt }
    }

    /// Validate an incoming `Challenge` replies to our own request, and
    /// produce the `ChallengeResponse` to send back.
    pub fn on_challenge(&mut self, packet: &Packet) -> Result<Packet, HandshakeError> {
        match packet {
            Packet::Challenge { client_salt, server_salt } => {
                if *client_salt != self.client_salt {
                    return Err(HandshakeError::ChallengeSaltMismatch);
                }
                self.server_salt = Some(*server_salt);
                Ok(Packet::ChallengeResponse { connection_salt: self.connection_salt() })
            }
            Packet::ConnectionDenied => Err(HandshakeError::Denied),
            _ => Err(HandshakeError::Timeout),
        }
    }

    /// XOR combination of both salts, known only to a peer that has seen
    /// both round-trip legs.
    pub fn connection_salt(&self) -> u64 {
        self.client_salt ^ self.server_salt.unwrap_or(0)
    }
}

impl Default for ClientHandshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-side steps: answer a request with a fresh server salt, then
/// validate the client's echoed combined salt before accepting.
#[derive(Debug)]
pub struct ServerHandshake;

impl ServerHandshake {
    pub fn challenge_for(client_salt: u64) -> (Packet, u64) {
        let server_salt: u64 = rand::thread_rng().gen();
        (Packet::Challenge { client_salt, server_salt }, server_salt)
    }

    /// Confirm the client's `ChallengeResponse` carries the combined salt
    /// we expect, given the salts from the first two legs.
    pub fn verify_response(
        packet: &Packet,
        client_salt: u64,
        server_salt: u64,
    ) -> Result<u64, AuthError> {
        match packet {
            Packet::ChallengeResponse { connection_salt } => {
                let expected = client_salt ^ server_salt;
                if *connection_salt == expected {
                    Ok(expected)
                } else {
                    Err(AuthError::SaltMismatch)
                }
            }
            _ => Err(AuthError::UnexpectedKind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_handshake_round_trip_agrees_on_connection_salt() {
        let mut client = ClientHandshake::new();
        let request = client.connection_request();
        let client_salt = match request {
            Packet::ConnectionRequest { client_salt } => client_salt,
            _ => unreachable!(),
        };

        let (challenge, server_salt) = ServerHandshake::challenge_for(client_salt);
        let response = client.on_challenge(&challenge).unwrap();

        let accepted_salt = ServerHandshake::verify_response(&response, client_salt, server_salt).unwrap();
        assert_eq!(accepted_salt, client.connection_salt());
    }

    #[test]
    fn mismatched_client_salt_in_challenge_is_rejected() {
        let mut client = ClientHandshake::new();
        let _ = client.connection_request();
        let forged = Packet::Challenge { client_salt: 0xDEAD_BEEF, server_salt: 1 };
        assert_eq!(client.on_challenge(&forged), Err(HandshakeError::ChallengeSaltMismatch));
    }

    #[test]
    fn tampered_connection_salt_is_rejected_by_server() {
        let response = Packet::ChallengeResponse { connection_salt: 12345 };
        let result = ServerHandshake::verify_response(&response, 1, 2);
        assert_eq!(result, Err(AuthError::SaltMismatch));
    }

    #[test]
    fn literal_salts_combine_by_xor() {
        let client_salt = 0x1111_1111_1111_1111u64;
        let server_salt = 0x2222_2222_2222_2222u64;

        let mut client = ClientHandshake { client_salt, server_salt: None };
        let response = client.on_challenge(&Packet::Challenge { client_salt, server_salt }).unwrap();
        assert_eq!(client.connection_salt(), 0x3333_3333_3333_3333u64);

        let accepted = ServerHandshake::verify_response(&response, client_salt, server_salt).unwrap();
        assert_eq!(accepted, 0x3333_3333_3333_3333u64);
    }

    #[test]
    fn denied_challenge_surfaces_as_handshake_denied() {
        let mut client = ClientHandshake::new();
        assert_eq!(client.on_challenge(&Packet::ConnectionDenied), Err(HandshakeError::Denied));
    }
}
