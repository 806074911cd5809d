//! Lock-free shared frame record
//!
//! A fixed array of 64-bit atomics holding
//! `[width, height, center_x, center_y, resolution, rotation]` plus a
//! generation counter. The single writer stages a complete record locally,
//! marks the generation odd, stores every field, marks it even again and
//! wakes the reader. A reader only accepts a load whose generation was even
//! and unchanged across the whole read, so it never observes a torn record.
//! Every wake means "the latest state"; intermediate publications may be
//! skipped.

use crate::core::geo::{Point, Size};
use crate::core::view::{RenderSnapshot, ViewState};
use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub mod field {
    //! Indices into the field array.

    pub const WIDTH: usize = 0;
    pub const HEIGHT: usize = 1;
    pub const CENTER_X: usize = 2;
    pub const CENTER_Y: usize = 3;
    pub const RESOLUTION: usize = 4;
    pub const ROTATION: usize = 5;
}

pub const FIELD_COUNT: usize = 6;

#[derive(Debug, Default)]
pub struct SharedFrameBuffer {
    fields: [AtomicU64; FIELD_COUNT],
    /// Even when stable, odd while a write is in progress; 0 = never published
    generation: AtomicU32,
    closed: AtomicBool,
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl SharedFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn encode(snapshot: &RenderSnapshot) -> [u64; FIELD_COUNT] {
        let mut staged = [0u64; FIELD_COUNT];
        staged[field::WIDTH] = snapshot.size.width as u64;
        staged[field::HEIGHT] = snapshot.size.height as u64;
        staged[field::CENTER_X] = snapshot.view_state.center.x.to_bits();
        staged[field::CENTER_Y] = snapshot.view_state.center.y.to_bits();
        staged[field::RESOLUTION] = snapshot.view_state.resolution.to_bits();
        staged[field::ROTATION] = snapshot.view_state.rotation.to_bits();
        staged
    }

    fn decode(raw: &[u64; FIELD_COUNT]) -> RenderSnapshot {
        RenderSnapshot::new(
            Size::new(raw[field::WIDTH] as u32, raw[field::HEIGHT] as u32),
            ViewState::new(
                Point::new(
                    f64::from_bits(raw[field::CENTER_X]),
                    f64::from_bits(raw[field::CENTER_Y]),
                ),
                f64::from_bits(raw[field::RESOLUTION]),
                f64::from_bits(raw[field::ROTATION]),
            ),
        )
    }

    /// Publishes `snapshot` and wakes the reader. Must only be called from
    /// one writer thread. Returns the new generation.
    pub fn publish(&self, snapshot: &RenderSnapshot) -> u32 {
        let staged = Self::encode(snapshot);

        let start = self.generation.load(Ordering::Relaxed);
        debug_assert_eq!(start & 1, 0, "concurrent writers on a shared frame buffer");
        self.generation
            .store(start.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (slot, value) in self.fields.iter().zip(staged) {
            slot.store(value, Ordering::Relaxed);
        }
        let mut published = start.wrapping_add(2);
        if published == 0 {
            // 0 means "never published"
            published = 2;
        }
        self.generation.store(published, Ordering::Release);

        self.notify();
        published
    }

    /// Latest complete record and its generation, or `None` if nothing was published yet
    pub fn load(&self) -> Option<(RenderSnapshot, u32)> {
        loop {
            let before = self.generation.load(Ordering::Acquire);
            if before == 0 {
                return None;
            }
            if before & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }

            let mut raw = [0u64; FIELD_COUNT];
            for (value, slot) in raw.iter_mut().zip(&self.fields) {
                *value = slot.load(Ordering::Relaxed);
            }
            fence(Ordering::Acquire);
            if self.generation.load(Ordering::Relaxed) == before {
                return Some((Self::decode(&raw), before));
            }
        }
    }

    /// Blocks until a generation other than `last_seen` is published, the
    /// buffer is closed, or `timeout` elapses. Returns the new generation.
    pub fn wait_for_update(&self, last_seen: u32, timeout: Duration) -> Option<u32> {
        if let Some(generation) = self.fresh_generation(last_seen) {
            return Some(generation);
        }
        let guard = self.wake_lock.lock().ok()?;
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |_| {
                !self.is_closed() && self.fresh_generation(last_seen).is_none()
            })
            .ok()?;
        drop(guard);
        self.fresh_generation(last_seen)
    }

    /// Waits like [`wait_for_update`](Self::wait_for_update) and loads the latest record
    pub fn wait_and_load(&self, last_seen: u32, timeout: Duration) -> Option<(RenderSnapshot, u32)> {
        self.wait_for_update(last_seen, timeout)?;
        self.load()
    }

    /// Current generation; `generation() / 2` is the number of publications
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Wakes any blocked reader for good
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn fresh_generation(&self, last_seen: u32) -> Option<u32> {
        let generation = self.generation.load(Ordering::Acquire);
        (generation != 0 && generation != last_seen && generation & 1 == 0).then_some(generation)
    }

    fn notify(&self) {
        // Taking the lock orders this wake after a reader's predicate check.
        drop(self.wake_lock.lock());
        self.wake.notify_all();
    }
}
