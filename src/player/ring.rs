// SPDX-License-Identifier: MPL-2.0
//! Lock-free single-producer / single-consumer ring of decoded PCM chunks.
//!
//! The main loop owns the [`RingProducer`] and fills one slot per decoded
//! audio unit; the output thread owns the [`RingConsumer`] and writes slots to
//! the device in order. Each index is advanced by exactly one side.
//!
//! # Reset handshake
//!
//! Seeks and pauses must discard queued audio. The producer stores a reset
//! request and polls until the consumer acknowledges it by jumping its index
//! to the producer's. While a request is pending the producer refuses to fill.
//!
//! ```text
//!  producer                         consumer
//!  ────────                         ────────
//!  reset_request = Flush ─────────▶ sees request
//!  (poll 10 ms)                     consumed = produced
//!                          ◀─────── reset_request = None
//! ```

use crate::config::IDLE_POLL_MS;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const NO_RESET: u8 = 0;

/// Kind of reset requested from the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResetKind {
    /// Discard queued audio and keep playing.
    Flush = 1,
    /// Discard queued audio and park the device.
    FlushAndPause = 2,
}

impl ResetKind {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Flush),
            2 => Some(Self::FlushAndPause),
            _ => None,
        }
    }
}

/// One chunk of interleaved signed 16-bit PCM.
#[derive(Debug)]
struct AudioSlot {
    samples: Box<[i16]>,
    len: usize,
}

struct Shared {
    slots: Box<[UnsafeCell<AudioSlot>]>,
    mask: usize,
    slot_capacity: usize,
    produced: AtomicUsize,
    consumed: AtomicUsize,
    reset_request: AtomicU8,
    paused: AtomicBool,
    consumer_alive: AtomicBool,
}

// SAFETY: a slot is only touched by the producer while it lies outside
// [consumed, produced) and only by the consumer while it lies inside. Index
// publication uses release stores paired with acquire loads, so slot contents
// are visible to the other side before the index that hands the slot over.
unsafe impl Sync for Shared {}

impl Shared {
    fn is_empty(&self) -> bool {
        self.produced.load(Ordering::Acquire) == self.consumed.load(Ordering::Acquire)
    }

    fn is_full(&self) -> bool {
        let produced = self.produced.load(Ordering::Acquire);
        (produced + 1) & self.mask == self.consumed.load(Ordering::Acquire)
    }

    fn pending_reset(&self) -> Option<ResetKind> {
        ResetKind::from_raw(self.reset_request.load(Ordering::Acquire))
    }
}

/// Creates a ring of `slots` chunks holding `slot_capacity` samples each.
///
/// `slots` is rounded up to a power of two (at least 2). One slot is always
/// kept free to tell a full ring from an empty one.
#[must_use]
pub fn audio_ring(slots: usize, slot_capacity: usize) -> (RingProducer, RingConsumer) {
    let count = slots.max(2).next_power_of_two();
    let slots = (0..count)
        .map(|_| {
            UnsafeCell::new(AudioSlot {
                samples: vec![0; slot_capacity].into_boxed_slice(),
                len: 0,
            })
        })
        .collect();
    let shared = Arc::new(Shared {
        slots,
        mask: count - 1,
        slot_capacity,
        produced: AtomicUsize::new(0),
        consumed: AtomicUsize::new(0),
        reset_request: AtomicU8::new(NO_RESET),
        paused: AtomicBool::new(false),
        consumer_alive: AtomicBool::new(true),
    });
    (
        RingProducer {
            shared: Arc::clone(&shared),
        },
        RingConsumer { shared },
    )
}

/// Main-loop side of the ring.
pub struct RingProducer {
    shared: Arc<Shared>,
}

impl RingProducer {
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.shared.is_full()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }

    /// Returns true when the next [`produce`](Self::produce) would be refused.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.shared.pending_reset().is_some() || self.shared.is_full()
    }

    /// Number of samples a slot can hold.
    #[must_use]
    pub fn slot_capacity(&self) -> usize {
        self.shared.slot_capacity
    }

    #[must_use]
    pub fn is_consumer_alive(&self) -> bool {
        self.shared.consumer_alive.load(Ordering::Acquire)
    }

    /// Fills the next free slot with `fill` and publishes it.
    ///
    /// `fill` receives the whole slot and returns the number of samples it
    /// wrote. Returns `None` without calling `fill` while the ring is full or a
    /// reset is pending. A slot filled with zero samples is not published.
    pub fn produce<E>(
        &mut self,
        fill: impl FnOnce(&mut [i16]) -> Result<usize, E>,
    ) -> Option<Result<usize, E>> {
        if self.is_blocked() {
            return None;
        }
        let produced = self.shared.produced.load(Ordering::Relaxed);
        // SAFETY: the ring is not full, so the slot at `produced` is outside
        // the consumer's range until `produced` is advanced below.
        let slot = unsafe { &mut *self.shared.slots[produced].get() };
        let written = match fill(&mut slot.samples) {
            Ok(n) => n.min(slot.samples.len()),
            Err(err) => return Some(Err(err)),
        };
        if written > 0 {
            slot.len = written;
            self.shared
                .produced
                .store((produced + 1) & self.shared.mask, Ordering::Release);
        }
        Some(Ok(written))
    }

    /// Asks the consumer to discard queued audio and waits for it to comply.
    ///
    /// Gives up when the consumer has gone away or `exit` is raised; the
    /// request is withdrawn in that case. Returns whether it was acknowledged.
    pub fn request_reset(&mut self, kind: ResetKind, exit: &AtomicBool) -> bool {
        self.shared.reset_request.store(kind as u8, Ordering::Release);
        while self.shared.pending_reset().is_some() {
            if !self.is_consumer_alive() || exit.load(Ordering::Acquire) {
                let _ = self.shared.reset_request.compare_exchange(
                    kind as u8,
                    NO_RESET,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                tracing::debug!(?kind, "audio reset abandoned");
                return false;
            }
            std::thread::sleep(Duration::from_millis(IDLE_POLL_MS));
        }
        true
    }

    /// Parks or releases the consumer.
    pub fn set_paused(&self, paused: bool) {
        self.shared.paused.store(paused, Ordering::Release);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }
}

/// Output-thread side of the ring.
pub struct RingConsumer {
    shared: Arc<Shared>,
}

impl RingConsumer {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn pending_reset(&self) -> Option<ResetKind> {
        self.shared.pending_reset()
    }

    /// Discards everything queued so far and clears the reset request.
    pub fn acknowledge_reset(&mut self) {
        let produced = self.shared.produced.load(Ordering::Acquire);
        self.shared.consumed.store(produced, Ordering::Release);
        self.shared.reset_request.store(NO_RESET, Ordering::Release);
    }

    /// Hands the oldest queued slot to `write` and releases it.
    ///
    /// Returns `None` when the ring is empty.
    pub fn consume<R>(&mut self, write: impl FnOnce(&[i16]) -> R) -> Option<R> {
        if self.is_empty() {
            return None;
        }
        let consumed = self.shared.consumed.load(Ordering::Relaxed);
        // SAFETY: the ring is not empty, so the producer published this slot
        // with a release store observed by the acquire load in `is_empty`, and
        // will not touch it until `consumed` moves past it.
        let slot = unsafe { &*self.shared.slots[consumed].get() };
        let result = write(&slot.samples[..slot.len]);
        self.shared
            .consumed
            .store((consumed + 1) & self.shared.mask, Ordering::Release);
        Some(result)
    }
}

impl Drop for RingConsumer {
    fn drop(&mut self) {
        self.shared.consumer_alive.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn fill_with(
        value: i16,
        count: usize,
    ) -> impl FnOnce(&mut [i16]) -> Result<usize, Infallible> {
        move |slot| {
            slot[..count].fill(value);
            Ok(count)
        }
    }

    #[test]
    fn slot_count_is_rounded_to_power_of_two() {
        let (mut producer, _consumer) = audio_ring(5, 4);
        let mut published = 0;
        while producer.produce(fill_with(1, 1)).is_some() {
            published += 1;
        }
        assert_eq!(published, 7);
        assert_eq!(producer.slot_capacity(), 4);
    }

    #[test]
    fn never_full_and_empty_at_once() {
        let (mut producer, mut consumer) = audio_ring(4, 2);
        for round in 0..10 {
            assert!(!(producer.is_full() && producer.is_empty()));
            if round % 3 == 2 {
                consumer.consume(|_| ());
            } else {
                let _ = producer.produce(fill_with(0, 1));
            }
        }
    }

    #[test]
    fn slots_are_consumed_in_order() {
        let (mut producer, mut consumer) = audio_ring(4, 8);
        for value in 1..=3 {
            let written = producer.produce(fill_with(value, 2));
            assert!(matches!(written, Some(Ok(2))));
        }
        assert!(producer.is_full());
        assert!(producer.produce(fill_with(9, 2)).is_none());

        let mut seen = Vec::new();
        while let Some(samples) = consumer.consume(|s| s.to_vec()) {
            seen.push(samples);
        }
        assert_eq!(seen, vec![vec![1, 1], vec![2, 2], vec![3, 3]]);
        assert!(consumer.is_empty());
    }

    #[test]
    fn empty_fill_is_not_published() {
        let (mut producer, consumer) = audio_ring(2, 8);
        assert!(matches!(producer.produce(fill_with(0, 0)), Some(Ok(0))));
        assert!(consumer.is_empty());
    }

    #[test]
    fn fill_errors_are_returned() {
        let (mut producer, consumer) = audio_ring(2, 8);
        let result = producer.produce(|_| Err::<usize, &str>("decode"));
        assert!(matches!(result, Some(Err("decode"))));
        assert!(consumer.is_empty());
    }

    #[test]
    fn acknowledge_discards_queued_slots() {
        let (mut producer, mut consumer) = audio_ring(8, 4);
        for value in 1..=4 {
            let _ = producer.produce(fill_with(value, 1));
        }
        producer
            .shared
            .reset_request
            .store(ResetKind::Flush as u8, Ordering::Release);
        assert!(producer.is_blocked());
        assert!(producer.produce(fill_with(5, 1)).is_none());

        assert_eq!(consumer.pending_reset(), Some(ResetKind::Flush));
        consumer.acknowledge_reset();
        assert!(consumer.is_empty());
        assert_eq!(consumer.pending_reset(), None);

        let _ = producer.produce(fill_with(6, 1));
        assert_eq!(consumer.consume(|s| s[0]), Some(6));
    }

    #[test]
    fn reset_is_abandoned_when_consumer_is_gone() {
        let (mut producer, consumer) = audio_ring(2, 4);
        drop(consumer);
        let exit = AtomicBool::new(false);
        assert!(!producer.request_reset(ResetKind::Flush, &exit));
        assert!(!producer.is_blocked());
    }

    #[test]
    fn reset_is_abandoned_on_exit() {
        let (mut producer, _consumer) = audio_ring(2, 4);
        let exit = AtomicBool::new(true);
        assert!(!producer.request_reset(ResetKind::FlushAndPause, &exit));
    }

    #[test]
    fn paused_flag_is_shared() {
        let (producer, consumer) = audio_ring(2, 4);
        producer.set_paused(true);
        assert!(consumer.is_paused());
        producer.set_paused(false);
        assert!(!consumer.is_paused());
    }
}
