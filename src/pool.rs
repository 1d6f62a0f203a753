//! Bounded ring of [`Frame`]s and a parallel ring of animations, each owning
//! a contiguous span of the frame ring.
//!
//! Both rings are plain arrays indexed by `(start, length)` cursors rather
//! than an intrusive linked list threaded through sentinel indices — the
//! "frames of animation N are a contiguous span" invariant is
//! then checkable by construction instead of by convention.

use crate::error::PoolError;
use crate::frame::Frame;
use crate::{MAX_ANIMATIONS, MAX_FRAMES};

/// One queued or playing animation: a flag pair, a span into the frame ring,
/// and (once it becomes the head and starts playing) its own playback
/// cursor.
#[derive(Clone, Copy)]
struct Animation {
    being_loaded: bool,
    started: bool,
    frame_start: usize,
    num_frames: u16,
    duration_ms: u32,
    /// `started_at + duration`, valid once `started`.
    animation_expiration_ms: u32,
    /// Offset from `frame_start`, cycling within `[0, num_frames)`.
    current_frame_offset: u16,
    /// Deadline for the currently indexed frame, valid once `started`.
    frame_expiration_ms: u32,
}

impl Animation {
    const fn empty() -> Self {
        Animation {
            being_loaded: false,
            started: false,
            frame_start: 0,
            num_frames: 0,
            duration_ms: 0,
            animation_expiration_ms: 0,
            current_frame_offset: 0,
            frame_expiration_ms: 0,
        }
    }
}

/// Iterator over `(remaining_ms, num_frames)` for each live animation, head
/// first, backing the `QUE` command.
pub struct QueueIter<'a> {
    pool: &'a AnimationPool,
    now_ms: u32,
    offset: usize,
}

impl<'a> Iterator for QueueIter<'a> {
    type Item = (u32, u16);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.pool.animations_length {
            return None;
        }
        let idx = (self.pool.animations_start + self.offset) % MAX_ANIMATIONS;
        let a = &self.pool.animations[idx];
        // Remaining time for the head: duration minus elapsed, per the
        // Open Question resolution in DESIGN.md ("report remaining time").
        // Animations behind the head haven't started yet, so their full
        // duration is still ahead of them.
        let remaining = if a.started {
            a.animation_expiration_ms.saturating_sub(self.now_ms)
        } else {
            a.duration_ms
        };
        self.offset += 1;
        Some((remaining, a.num_frames))
    }
}

/// Ring of animations and their owned frames.
pub struct AnimationPool {
    frames: [Frame; MAX_FRAMES],
    frames_start: usize,
    frames_length: usize,
    animations: [Animation; MAX_ANIMATIONS],
    animations_start: usize,
    animations_length: usize,
}

impl AnimationPool {
    pub const fn new() -> Self {
        AnimationPool {
            frames: [Frame::black(); MAX_FRAMES],
            frames_start: 0,
            frames_length: 0,
            animations: [Animation::empty(); MAX_ANIMATIONS],
            animations_start: 0,
            animations_length: 0,
        }
    }

    /// True iff both pools have slack.
    pub fn can_load_animation(&self) -> bool {
        self.animations_length < MAX_ANIMATIONS && self.frames_length < MAX_FRAMES
    }

    /// Seals any previously loading animation, then allocates a new tail
    /// slot marked `being_loaded`.
    pub fn start_loading(&mut self, duration_ms: u32) -> Result<(), PoolError> {
        if !self.can_load_animation() {
            return Err(PoolError::Full);
        }
        if self.is_loading_animation() {
            self.finalize_loading();
        }
        let frame_start = (self.frames_start + self.frames_length) % MAX_FRAMES;
        let idx = (self.animations_start + self.animations_length) % MAX_ANIMATIONS;
        self.animations[idx] = Animation {
            being_loaded: true,
            frame_start,
            duration_ms,
            ..Animation::empty()
        };
        self.animations_length += 1;
        Ok(())
    }

    /// True iff the tail (most recently started) animation is still being
    /// loaded.
    pub fn is_loading_animation(&self) -> bool {
        self.tail().map(|a| a.being_loaded).unwrap_or(false)
    }

    /// Clears the loading flag on the tail animation. Idempotent.
    pub fn finalize_loading(&mut self) {
        if let Some(idx) = self.tail_index() {
            self.animations[idx].being_loaded = false;
        }
    }

    /// Allocates the next frame tail slot for the currently loading
    /// animation, rewinds it, and bumps that animation's frame count.
    pub fn get_frame_to_load(&mut self) -> Result<&mut Frame, PoolError> {
        if !self.is_loading_animation() {
            return Err(PoolError::NoAnimationLoading);
        }
        if self.frames_length >= MAX_FRAMES {
            return Err(PoolError::Full);
        }
        let frame_idx = (self.frames_start + self.frames_length) % MAX_FRAMES;
        self.frames[frame_idx].rewind();
        self.frames_length += 1;
        let tail_idx = self.tail_index().unwrap();
        self.animations[tail_idx].num_frames += 1;
        Ok(&mut self.frames[frame_idx])
    }

    /// The frame slot most recently handed out by [`Self::get_frame_to_load`],
    /// for appending successive `RGB` rows without reallocating a slot per
    /// row. The dispatcher only calls this while its own "frame armed"
    /// cursor is set, so the tail frame is always the right one.
    pub fn current_loading_frame_mut(&mut self) -> Option<&mut Frame> {
        if self.frames_length == 0 {
            return None;
        }
        let idx = (self.frames_start + self.frames_length - 1) % MAX_FRAMES;
        Some(&mut self.frames[idx])
    }

    /// Retires the head animation unless it's the only one — a no-op
    /// singleton skip is intentional, not a bug.
    pub fn skip_current(&mut self) {
        if self.animations_length >= 2 {
            self.retire_head();
            self.purge_empty_sealed_head();
        }
    }

    /// Zeroes every cursor. Slot contents are left in place; they're
    /// overwritten as the rings wrap back over them.
    pub fn reset(&mut self) {
        self.frames_start = 0;
        self.frames_length = 0;
        self.animations_start = 0;
        self.animations_length = 0;
    }

    /// `(animations_free, frames_free)`, backing `FRE`.
    pub fn free_counts(&self) -> (usize, usize) {
        (
            MAX_ANIMATIONS - self.animations_length,
            MAX_FRAMES - self.frames_length,
        )
    }

    pub fn queue_snapshot(&self, now_ms: u32) -> QueueIter<'_> {
        QueueIter { pool: self, now_ms, offset: 0 }
    }

    /// `(frames_start, frames_length, animations_start, animations_length)`,
    /// backing `DBG`.
    pub fn debug_snapshot(&self) -> (usize, usize, usize, usize) {
        (self.frames_start, self.frames_length, self.animations_start, self.animations_length)
    }

    pub fn is_empty(&self) -> bool {
        self.animations_length == 0
    }

    /// True iff the live region is non-empty and its head is the one still
    /// being loaded — the player must never display a loading animation.
    pub fn head_is_loading(&self) -> bool {
        self.head().map(|a| a.being_loaded).unwrap_or(false)
    }

    /// Retirement algorithm: retire an expired head, then
    /// discard any now-head animations that are empty and sealed, so the
    /// player never stalls on a legally-empty upload.
    pub fn retire_expired_and_empty(&mut self, now_ms: u32) {
        if let Some(head) = self.head() {
            if head.started && now_ms >= head.animation_expiration_ms {
                self.retire_head();
            }
        }
        self.purge_empty_sealed_head();
    }

    fn purge_empty_sealed_head(&mut self) {
        while let Some(head) = self.head() {
            if head.num_frames == 0 && !head.being_loaded {
                self.retire_head();
            } else {
                break;
            }
        }
    }

    /// Player step 4: transitions a not-yet-started, sealed head into
    /// "playing", arming its animation and first-frame deadlines.
    pub fn ensure_head_started(&mut self, now_ms: u32) {
        let head_idx = match self.animations_length {
            0 => return,
            _ => self.animations_start,
        };
        if self.animations[head_idx].being_loaded || self.animations[head_idx].started {
            return;
        }
        let frame_start = self.animations[head_idx].frame_start;
        let first_duration = self.frames[frame_start].duration();
        let a = &mut self.animations[head_idx];
        a.started = true;
        a.animation_expiration_ms = now_ms.saturating_add(a.duration_ms);
        a.current_frame_offset = 0;
        a.frame_expiration_ms = now_ms.saturating_add(first_duration);
    }

    /// Player step 5: advances the head's frame cursor cyclically through
    /// its span while the current frame's deadline has passed. Bounded by
    /// `num_frames` so a tick that lagged behind by more than one frame
    /// duration still catches up to the right frame in a single call,
    /// instead of needing one `tick()` per missed frame.
    pub fn advance_head_frame_if_expired(&mut self, now_ms: u32) {
        let head_idx = match self.animations_length {
            0 => return,
            _ => self.animations_start,
        };
        if !self.animations[head_idx].started {
            return;
        }
        let num_frames = self.animations[head_idx].num_frames;
        if num_frames == 0 {
            return;
        }
        for _ in 0..num_frames {
            if now_ms < self.animations[head_idx].frame_expiration_ms {
                break;
            }
            let frame_start = self.animations[head_idx].frame_start;
            let next_offset = (self.animations[head_idx].current_frame_offset + 1) % num_frames;
            let next_idx = (frame_start + next_offset as usize) % MAX_FRAMES;
            let next_duration = self.frames[next_idx].duration();
            let a = &mut self.animations[head_idx];
            a.current_frame_offset = next_offset;
            a.frame_expiration_ms = now_ms.saturating_add(next_duration);
        }
    }

    /// The frame currently indexed by the head animation's playback cursor.
    /// `None` if the region is empty or the head hasn't started yet.
    pub fn head_frame(&self) -> Option<&Frame> {
        let head = self.head()?;
        if !head.started {
            return None;
        }
        let idx = (head.frame_start + head.current_frame_offset as usize) % MAX_FRAMES;
        Some(&self.frames[idx])
    }

    fn head(&self) -> Option<&Animation> {
        if self.animations_length == 0 {
            None
        } else {
            Some(&self.animations[self.animations_start])
        }
    }

    fn tail_index(&self) -> Option<usize> {
        if self.animations_length == 0 {
            None
        } else {
            Some((self.animations_start + self.animations_length - 1) % MAX_ANIMATIONS)
        }
    }

    fn tail(&self) -> Option<&Animation> {
        self.tail_index().map(|i| &self.animations[i])
    }

    fn retire_head(&mut self) {
        if self.animations_length == 0 {
            crate::cant_happen("pool::retire_head on empty pool");
            return;
        }
        let head = self.animations[self.animations_start];
        self.frames_start = (self.frames_start + head.num_frames as usize) % MAX_FRAMES;
        self.frames_length -= head.num_frames as usize;
        self.animations_start = (self.animations_start + 1) % MAX_ANIMATIONS;
        self.animations_length -= 1;
    }
}

impl Default for AnimationPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_row(f: &mut Frame, color: (u8, u8, u8)) {
        f.rewind();
        for y in 0..crate::MATRIX_WIDTH {
            for x in 0..crate::MATRIX_WIDTH {
                f.set_pixel(y, x, color.0, color.1, color.2);
            }
        }
    }

    fn load_one_animation(pool: &mut AnimationPool, duration: u32, frame_durations: &[u32]) {
        pool.start_loading(duration).unwrap();
        for &fd in frame_durations {
            let f = pool.get_frame_to_load().unwrap();
            fill_row(f, (1, 2, 3));
            f.set_duration(fd);
        }
        pool.finalize_loading();
    }

    #[test]
    fn reset_then_free_counts_is_r1() {
        let mut pool = AnimationPool::new();
        pool.reset();
        assert_eq!(pool.free_counts(), (MAX_ANIMATIONS, MAX_FRAMES));
    }

    #[test]
    fn invariant_frame_span_matches_sum_of_num_frames() {
        let mut pool = AnimationPool::new();
        load_one_animation(&mut pool, 1000, &[100, 100]);
        load_one_animation(&mut pool, 2000, &[50]);
        let (_, frames_len, _, _) = pool.debug_snapshot();
        assert_eq!(frames_len, 3);
    }

    #[test]
    fn at_most_tail_is_being_loaded() {
        let mut pool = AnimationPool::new();
        pool.start_loading(1000).unwrap();
        assert!(pool.is_loading_animation());
        pool.start_loading(2000).unwrap(); // implicitly seals the first
        assert!(pool.is_loading_animation());
        pool.finalize_loading();
        assert!(!pool.is_loading_animation());
    }

    #[test]
    fn b2_animation_overflow_without_retirement() {
        let mut pool = AnimationPool::new();
        for _ in 0..MAX_ANIMATIONS {
            assert!(pool.start_loading(100).is_ok());
            pool.finalize_loading();
        }
        assert!(!pool.can_load_animation());
        assert_eq!(pool.start_loading(100), Err(PoolError::Full));
    }

    #[test]
    fn skip_current_noop_on_singleton() {
        let mut pool = AnimationPool::new();
        load_one_animation(&mut pool, 1000, &[100]);
        pool.skip_current();
        let (_, _, _, anims_len) = pool.debug_snapshot();
        assert_eq!(anims_len, 1);
    }

    #[test]
    fn skip_current_retires_head_with_two_live() {
        let mut pool = AnimationPool::new();
        load_one_animation(&mut pool, 60_000, &[1000]);
        load_one_animation(&mut pool, 60_000, &[1000]);
        pool.skip_current();
        let (_, _, _, anims_len) = pool.debug_snapshot();
        assert_eq!(anims_len, 1);
    }

    #[test]
    fn player_algorithm_starts_head_and_returns_sentinel_when_empty() {
        let pool = AnimationPool::new();
        assert!(pool.is_empty());
        assert!(pool.head_frame().is_none());
    }

    #[test]
    fn b4_short_duration_truncates_cycle() {
        let mut pool = AnimationPool::new();
        // Two 1000ms frames, but the animation only lives for 1500ms total.
        load_one_animation(&mut pool, 1500, &[1000, 1000]);
        pool.retire_expired_and_empty(0);
        pool.ensure_head_started(0);
        pool.advance_head_frame_if_expired(0);
        assert_eq!(pool.head_frame().unwrap().duration(), 1000);

        // At t=1400 we've cycled into the second frame, but the whole
        // animation expires at t=1500 regardless of frame cycling.
        pool.retire_expired_and_empty(1400);
        pool.advance_head_frame_if_expired(1400);
        assert!(!pool.is_empty());

        pool.retire_expired_and_empty(1500);
        assert!(pool.is_empty());
    }

    #[test]
    fn current_loading_frame_mut_targets_the_freshly_allocated_slot() {
        let mut pool = AnimationPool::new();
        pool.start_loading(1000).unwrap();
        let f = pool.get_frame_to_load().unwrap();
        f.rewind();
        f.set_pixel(0, 0, 9, 9, 9);
        assert_eq!(pool.current_loading_frame_mut().unwrap().pixel(0, 0), (9, 9, 9));
    }

    #[test]
    fn b4_long_duration_cycles_frames() {
        let mut pool = AnimationPool::new();
        load_one_animation(&mut pool, 10_000, &[100, 100]);
        pool.retire_expired_and_empty(0);
        pool.ensure_head_started(0);
        pool.advance_head_frame_if_expired(0);
        let (_, len, _, _) = pool.debug_snapshot();
        assert_eq!(len, 2);

        // After several frame periods it should still be live, just on a
        // different frame offset, because the animation duration (10s)
        // outlasts many frame cycles (100ms each).
        pool.retire_expired_and_empty(950);
        pool.advance_head_frame_if_expired(950);
        assert!(!pool.is_empty());
    }
}
