//! physics.rs — the single, pure simulation step shared by server and
//! client, so authoritative ticks and client-side prediction never diverge
//! on anything but input timing (§4.8).
//!
//! Converted from: original_source's RocketServer game-update logic
//! (rotation/thrust integration, world wrap, friction), re-expressed as a
//! stateless function over `PlayerState` rather than a method mutating a
//! global actor list. Step order (rotate, thrust, integrate position,
//! *then* apply friction, wrap, clamp) matches the original exactly,
//! friction-per-step included — see DESIGN.md for why that's kept as-is
//! rather than "fixed" to per-second decay.

use crate::player::PlayerState;
use crate::wire::Keyboard;

pub const WORLD_WIDTH: f32 = 1920.0;
pub const WORLD_HEIGHT: f32 = 1080.0;
pub const MAX_SPEED: f32 = 500.0;
pub const FRICTION: f32 = 0.95;
pub const ACCELERATION: f32 = 100.0;
const ROTATION_SPEED: f32 = std::f32::consts::PI; // radians/sec
const TWO_PI: f32 = std::f32::consts::TAU;

/// Advance one player's state by `delta_time` seconds according to its
/// currently-held keyboard bits. Deterministic: given the same input state
/// and `delta_time`, always produces the same output, so the server's tick
/// and the client's replay-after-rollback agree bit-for-bit on floats
/// derived from the same arithmetic.
pub fn step(state: &PlayerState) -> PlayerState {
    let mut next = *state;
    let dt = state.delta_time;

    if state.keyboard.contains(Keyboard::LEFT) {
        next.rotation -= ROTATION_SPEED * dt;
    }
    if state.keyboard.contains(Keyboard::RIGHT) {
        next.rotation += ROTATION_SPEED * dt;
    }
    next.rotation = next.rotation.rem_euclid(TWO_PI);

    if state.keyboard.contains(Keyboard::UP) {
        next.vel.0 += next.rotation.cos() * ACCELERATION * dt;
        next.vel.1 += next.rotation.sin() * ACCELERATION * dt;
    }
    if state.keyboard.contains(Keyboard::DOWN) {
        next.vel.0 -= 0.5 * next.rotation.cos() * ACCELERATION * dt;
        next.vel.1 -= 0.5 * next.rotation.sin() * ACCELERATION * dt;
    }

    next.pos.0 += next.vel.0 * dt;
    next.pos.1 += next.vel.1 * dt;

    next.vel.0 *= FRICTION;
    next.vel.1 *= FRICTION;

    next.speed = (next.vel.0 * next.vel.0 + next.vel.1 * next.vel.1).sqrt();

    next.pos.0 = wrap(next.pos.0, WORLD_WIDTH);
    next.pos.1 = wrap(next.pos.1, WORLD_HEIGHT);

    if next.speed > MAX_SPEED {
        let scale = MAX_SPEED / next.speed;
        next.vel.0 *= scale;
        next.vel.1 *= scale;
    }

    next
}

fn wrap(value: f32, bound: f32) -> f32 {
    let wrapped = value % bound;
    if wrapped < 0.0 {
        wrapped + bound
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(pos: (f32, f32)) -> PlayerState {
        PlayerState {
            delta_time: 1.0 / 60.0,
            ..PlayerState::spawn(0, pos)
        }
    }

    #[test]
    fn idle_player_decays_toward_rest() {
        let mut state = idle((500.0, 500.0));
        state.vel = (100.0, 0.0);
        let next = step(&state);
        assert!(next.vel.0 < 100.0);
        assert!(next.vel.0 > 0.0);
    }

    #[test]
    fn thrust_increases_speed_in_facing_direction() {
        let mut state = idle((100.0, 100.0));
        state.keyboard = Keyboard::UP;
        state.rotation = 0.0;
        let next = step(&state);
        assert!(next.vel.0 > 0.0);
        assert!(next.vel.1.abs() < 1e-3);
    }

    #[test]
    fn reverse_thrust_is_half_strength() {
        let mut up = idle((0.0, 0.0));
        up.keyboard = Keyboard::UP;
        up.rotation = 0.0;
        let up_next = step(&up);

        let mut down = idle((0.0, 0.0));
        down.keyboard = Keyboard::DOWN;
        down.rotation = 0.0;
        let down_next = step(&down);

        assert!((down_next.vel.0.abs() - up_next.vel.0.abs() / 2.0).abs() < 1e-3);
    }

    #[test]
    fn position_wraps_past_world_edge() {
        let mut state = idle((WORLD_WIDTH - 1.0, 0.0));
        state.vel = (100.0, 0.0);
        let next = step(&state);
        assert!(next.pos.0 < WORLD_WIDTH);
    }

    #[test]
    fn velocity_is_clamped_to_max_speed() {
        let mut state = idle((0.0, 0.0));
        state.vel = (10_000.0, 0.0);
        let next = step(&state);
        let magnitude = (next.vel.0 * next.vel.0 + next.vel.1 * next.vel.1).sqrt();
        assert!(magnitude <= MAX_SPEED + 1e-3);
    }

    #[test]
    fn rotation_stays_within_full_turn() {
        let mut state = idle((0.0, 0.0));
        state.keyboard = Keyboard::LEFT;
        state.rotation = 0.0;
        state.delta_time = 100.0; // force many full turns
        let next = step(&state);
        assert!(next.rotation >= 0.0 && next.rotation < TWO_PI);
    }

    #[test]
    fn step_is_deterministic() {
        let mut state = idle((10.0, 10.0));
        state.vel = (5.0, -3.0);
        state.keyboard = Keyboard::UP | Keyboard::RIGHT;
        let a = step(&state);
        let b = step(&state);
        assert_eq!(a.pos, b.pos);
        assert_eq!(a.vel, b.vel);
    }
}
