//! Time-driven playback: selects the frame to display, advances within an
//! animation, retires expired animations.

use crate::clock::Clock;
use crate::frame::Frame;
use crate::pool::AnimationPool;

/// Ticks an [`AnimationPool`] against an injected [`Clock`] and hands back
/// the frame that should be on the matrix right now.
pub struct Player {
    pool: AnimationPool,
    sentinel: Frame,
}

impl Player {
    pub const fn new() -> Self {
        Player { pool: AnimationPool::new(), sentinel: Frame::black() }
    }

    pub fn pool(&self) -> &AnimationPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut AnimationPool {
        &mut self.pool
    }

    /// Runs one step of the player algorithm and
    /// returns the frame to display.
    pub fn current_frame(&mut self, clock: &mut impl Clock) -> &Frame {
        let now = clock.now_ms();

        // Steps 1-2: retire an expired head, then any now-head animations
        // that are empty and sealed.
        self.pool.retire_expired_and_empty(now);

        // Step 3: nothing live, or the live head is still being filled.
        if self.pool.is_empty() || self.pool.head_is_loading() {
            return &self.sentinel;
        }

        // Step 4: first observation of this head — arm its deadlines.
        self.pool.ensure_head_started(now);

        // Step 5: advance the frame cursor past any elapsed deadlines.
        self.pool.advance_head_frame_if_expired(now);

        // Step 6.
        self.pool.head_frame().unwrap_or(&self.sentinel)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    fn load_solid(pool: &mut AnimationPool, duration: u32, frame_ms: u32, color: (u8, u8, u8)) {
        pool.start_loading(duration).unwrap();
        let f = pool.get_frame_to_load().unwrap();
        f.rewind();
        for y in 0..crate::MATRIX_WIDTH {
            for x in 0..crate::MATRIX_WIDTH {
                f.set_pixel(y, x, color.0, color.1, color.2);
            }
        }
        f.set_duration(frame_ms);
        pool.finalize_loading();
    }

    #[test]
    fn b3_sentinel_when_nothing_queued() {
        let mut player = Player::new();
        let mut clock = FakeClock(0);
        let f = player.current_frame(&mut clock);
        assert_eq!(f.pixel(0, 0), (0, 0, 0));
    }

    #[test]
    fn scenario_minimal_animation_plays_then_reverts_to_sentinel() {
        let mut player = Player::new();
        load_solid(player.pool_mut(), 2000, 1000, (0xFF, 0, 0));

        let mut clock = FakeClock(0);
        assert_eq!(player.current_frame(&mut clock).pixel(0, 0), (0xFF, 0, 0));

        clock.advance(1999);
        assert_eq!(player.current_frame(&mut clock).pixel(0, 0), (0xFF, 0, 0));

        clock.advance(2); // t=2001, past the 2000ms animation duration
        assert_eq!(player.current_frame(&mut clock).pixel(0, 0), (0, 0, 0));
    }

    #[test]
    fn scenario_skip_advances_to_second_animation() {
        let mut player = Player::new();
        load_solid(player.pool_mut(), 60_000, 1000, (1, 0, 0));
        load_solid(player.pool_mut(), 60_000, 1000, (2, 0, 0));

        let mut clock = FakeClock(0);
        assert_eq!(player.current_frame(&mut clock).pixel(0, 0), (1, 0, 0));

        player.pool_mut().skip_current();
        assert_eq!(player.current_frame(&mut clock).pixel(0, 0), (2, 0, 0));
    }

    #[test]
    fn loading_head_never_displayed() {
        let mut player = Player::new();
        player.pool_mut().start_loading(1000).unwrap();
        // Not finalized: still "being_loaded".
        let mut clock = FakeClock(0);
        assert_eq!(player.current_frame(&mut clock).pixel(0, 0), (0, 0, 0));
    }
}
