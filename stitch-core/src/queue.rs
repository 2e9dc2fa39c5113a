//! Lock-free sample intake queue
#![allow(unsafe_code)] // Lock-free ring buffer needs atomics over raw slots
//!
//! ## Overview
//!
//! Bounded multi-producer multi-consumer ring buffer carrying
//! `SampleEvent`s from sensor callbacks into the fusion engine. Each
//! sensor delegate fires on its own thread (or ISR on embedded targets)
//! and pushes independently; none of them may block, and the engine
//! drains the queue on its own schedule.
//!
//! ## Algorithm
//!
//! Every slot carries a sequence counter alongside its payload. A
//! producer claims a slot by CAS on the head position once the slot's
//! sequence says it is free for this lap, writes the payload, then
//! publishes by bumping the sequence; consumers mirror the dance on the
//! tail. The sequence handshake is what makes concurrent producers
//! safe: a slot is never written until its previous occupant has been
//! fully read, and never read until fully written. Capacity must be a
//! power of two so the position wrap is a mask.
//!
//! ## Trade-offs
//!
//! - Claim-then-publish costs one CAS per push; there is no slow path
//!   that blocks a sensor callback.
//! - Fixed capacity: a full queue drops the sample and counts it in the
//!   stats rather than blocking.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::constants::QUEUE_CAPACITY;
use crate::events::SampleEvent;

const _: () = assert!(
    QUEUE_CAPACITY.is_power_of_two(),
    "queue capacity must be a power of 2"
);

/// One ring slot: payload plus the sequence counter guarding it
///
/// The sequence equals the slot's position when free for writing, the
/// position plus one when readable, and advances by the capacity each
/// lap.
struct Slot {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<SampleEvent>>,
}

/// Lock-free sample queue between sensor callbacks and the engine
///
/// ## Example
///
/// ```rust
/// use stitch_core::{SampleQueue, SampleEvent, QUEUE_CAPACITY};
///
/// static QUEUE: SampleQueue<QUEUE_CAPACITY> = SampleQueue::new();
///
/// // Any number of sensor callback threads
/// fn on_heart_rate(timestamp: u64, bpm: f64) {
///     if !QUEUE.push(SampleEvent::HeartRate { timestamp, bpm }) {
///         // Engine is behind; sample dropped and counted
///     }
/// }
///
/// // Engine thread
/// fn drain() {
///     while let Some(event) = QUEUE.pop() {
///         let _ = event;
///     }
/// }
/// ```
pub struct SampleQueue<const N: usize> {
    slots: [Slot; N],
    /// Next claim position for producers
    head: AtomicUsize,
    /// Next claim position for consumers
    tail: AtomicUsize,
    stats: QueueStats,
}

/// Intake health counters, updated with relaxed ordering
pub struct QueueStats {
    /// Samples accepted
    pub pushed: AtomicU32,
    /// Samples consumed
    pub popped: AtomicU32,
    /// Samples dropped because the queue was full
    pub dropped: AtomicU32,
    /// Deepest backlog observed
    pub max_depth: AtomicU32,
}

impl QueueStats {
    const fn new() -> Self {
        Self {
            pushed: AtomicU32::new(0),
            popped: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            max_depth: AtomicU32::new(0),
        }
    }

    fn update_max_depth(&self, current: u32) {
        let mut max = self.max_depth.load(Ordering::Relaxed);
        while current > max {
            match self.max_depth.compare_exchange_weak(
                max,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => max = actual,
            }
        }
    }
}

impl<const N: usize> SampleQueue<N> {
    /// Create an empty queue; usable in a `static`
    pub const fn new() -> Self {
        let mut slots = [const {
            Slot {
                sequence: AtomicUsize::new(0),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            }
        }; N];
        // Slot i is first writable at position i
        let mut i = 0;
        while i < N {
            slots[i].sequence = AtomicUsize::new(i);
            i += 1;
        }
        Self {
            slots,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            stats: QueueStats::new(),
        }
    }

    /// Push a sample; any number of producers may call concurrently
    ///
    /// Returns false and counts a drop when the queue is full.
    pub fn push(&self, event: SampleEvent) -> bool {
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & (N - 1)];
            let seq = slot.sequence.load(Ordering::Acquire);
            let dif = seq as isize - pos as isize;
            if dif == 0 {
                // Slot is free for this lap; claim the position
                match self.head.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // Claimed: nothing else touches this slot until
                        // the sequence bump below
                        unsafe { (*slot.value.get()).write(event) };
                        slot.sequence.store(pos.wrapping_add(1), Ordering::Release);
                        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
                        self.stats.update_max_depth(self.len() as u32);
                        return true;
                    }
                    Err(actual) => pos = actual,
                }
            } else if dif < 0 {
                // Slot still holds a lap-old unconsumed value
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            } else {
                // Another producer claimed this position; catch up
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Pop the oldest sample; any number of consumers may call
    pub fn pop(&self) -> Option<SampleEvent> {
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & (N - 1)];
            let seq = slot.sequence.load(Ordering::Acquire);
            let dif = seq as isize - pos.wrapping_add(1) as isize;
            if dif == 0 {
                // Slot is published; claim the position
                match self.tail.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let event = unsafe { (*slot.value.get()).assume_init_read() };
                        // Free the slot for the next lap
                        slot.sequence.store(pos.wrapping_add(N), Ordering::Release);
                        self.stats.popped.fetch_add(1, Ordering::Relaxed);
                        return Some(event);
                    }
                    Err(actual) => pos = actual,
                }
            } else if dif < 0 {
                return None;
            } else {
                // Another consumer claimed this position; catch up
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Current backlog, counting claimed-but-unpublished slots
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// Whether no samples are waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the next push would drop
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// Intake counters
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Drain everything currently queued
    pub fn drain(&self) -> QueueDrain<'_, N> {
        QueueDrain { queue: self }
    }
}

impl<const N: usize> Default for SampleQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

// The sequence handshake provides all cross-thread synchronization
unsafe impl<const N: usize> Send for SampleQueue<N> {}
unsafe impl<const N: usize> Sync for SampleQueue<N> {}

/// Iterator returned by [`SampleQueue::drain`]
pub struct QueueDrain<'a, const N: usize> {
    queue: &'a SampleQueue<N>,
}

impl<'a, const N: usize> Iterator for QueueDrain<'a, N> {
    type Item = SampleEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop()
    }
}
