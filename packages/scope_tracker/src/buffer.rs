//! Per-thread append-only event logs with a lock-free capture path.
//!
//! An [`EventLog`] is a chain of heap-allocated segments. The owning thread
//! appends by writing a slot in the newest segment and publishing the new
//! length with a release-store; when a segment fills, the owner allocates a
//! bigger one and links it in. The drainer reads published lengths with
//! acquire semantics, consumes whole segments, and is the only side that
//! frees them. The append path takes no lock and performs no allocation
//! except when a segment fills.
//!
//! Concurrency contract (not enforced by the type system):
//!
//! * `append` is called only by the thread that owns the log.
//! * `drain` calls are serialized externally - in this crate by the
//!   thread-registry mutex, which is never taken on the append path.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering};

use crate::SiteId;

/// Initial segment size, chosen so that typical workloads never allocate on
/// the capture path after the first event.
const INITIAL_CAPACITY: usize = 4096;

/// One closed scope execution: enter/exit timestamps for one site on one thread.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct RawEvent {
    pub(crate) site: SiteId,
    pub(crate) t_enter: i64,
    pub(crate) t_exit: i64,
}

/// All events drained from one thread, in scope-exit order.
#[derive(Clone, Debug)]
pub(crate) struct ThreadEvents {
    pub(crate) thread_id: u64,
    pub(crate) events: Vec<RawEvent>,
}

/// One fixed-size block of event slots.
struct Segment {
    slots: Box<[UnsafeCell<MaybeUninit<RawEvent>>]>,

    /// Number of fully written slots. Release-stored by the owner after each
    /// slot write; acquire-loaded by the drainer. Never decreases.
    len: AtomicUsize,

    /// Number of slots already consumed by a drain. Written by the drainer
    /// only; the owner never reads it.
    drained: AtomicUsize,

    /// The next, newer segment. Set exactly once, by the owner, after this
    /// segment's final `len` has been published. A non-null `next` means the
    /// owner will never touch this segment again.
    next: AtomicPtr<Segment>,
}

impl Segment {
    /// Allocates an empty segment, or `None` if memory cannot be reserved.
    fn allocate(capacity: usize) -> Option<Box<Self>> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity).ok()?;
        for _ in 0..capacity {
            slots.push(UnsafeCell::new(MaybeUninit::uninit()));
        }

        Some(Box::new(Self {
            slots: slots.into_boxed_slice(),
            len: AtomicUsize::new(0),
            drained: AtomicUsize::new(0),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// A growable append-only log of closed-scope events, owned by one thread.
///
/// The capture path is one slot write plus one release-store: no lock, no
/// allocation while the current segment has room, and no shared state beyond
/// the atomics that publish completed events to the drainer.
#[derive(Debug)]
pub(crate) struct EventLog {
    /// Oldest segment not yet fully reclaimed; the drainer's entry point.
    /// Null until the first event. Advanced only by the drainer.
    head: AtomicPtr<Segment>,

    /// Newest segment; the owner appends here. Written only by the owner.
    tail: AtomicPtr<Segment>,
}

impl EventLog {
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            tail: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Appends one event. Must be called only by the owning thread.
    ///
    /// If a segment cannot be allocated, the event is dropped and counted in
    /// `lost_events` instead of aborting the process; the aggregator surfaces
    /// the count in the result meta.
    #[inline]
    pub(crate) fn append(&self, event: RawEvent, lost_events: &AtomicU64) {
        let mut segment_ptr = self.tail.load(Ordering::Relaxed);

        if segment_ptr.is_null() {
            match self.install_segment(ptr::null_mut(), INITIAL_CAPACITY) {
                Some(installed) => segment_ptr = installed,
                None => {
                    lost_events.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        }

        // SAFETY: the tail segment stays allocated for the lifetime of the
        // log; the drainer only frees segments whose successor is published.
        let mut segment = unsafe { &*segment_ptr };
        let mut len = segment.len.load(Ordering::Relaxed);

        if len == segment.slots.len() {
            let grown = segment.slots.len().saturating_mul(2);
            match self.install_segment(segment_ptr, grown) {
                Some(installed) => {
                    segment_ptr = installed;
                    // SAFETY: as above; the freshly installed tail is live.
                    segment = unsafe { &*segment_ptr };
                    len = 0;
                }
                None => {
                    lost_events.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        }

        // SAFETY: slot `len` is above the published length, so the drainer
        // never reads it, and the owner is the only writer.
        unsafe {
            segment.slots[len].get().write(MaybeUninit::new(event));
        }
        segment.len.store(len + 1, Ordering::Release);
    }

    /// Allocates a segment and links it in as the new tail.
    ///
    /// `sealed` is the previous tail (null for the first segment). Its `next`
    /// pointer is published after the new segment is fully initialized, so an
    /// acquire-load of `next` always observes a valid segment.
    fn install_segment(&self, sealed: *mut Segment, capacity: usize) -> Option<*mut Segment> {
        let segment = Box::into_raw(Segment::allocate(capacity)?);

        if sealed.is_null() {
            self.head.store(segment, Ordering::Release);
        } else {
            // SAFETY: `sealed` is the current tail, which is live and will
            // not be freed before its successor is visible.
            unsafe { &*sealed }.next.store(segment, Ordering::Release);
        }
        self.tail.store(segment, Ordering::Release);

        Some(segment)
    }

    /// Takes every published event, leaving the log empty.
    ///
    /// This is the per-buffer consistent cut: events published after their
    /// segment was read belong to the next drain. Fully consumed segments
    /// with a published successor are freed here; the newest segment is left
    /// in place for the owner, with a cursor marking what was consumed.
    ///
    /// Callers must serialize drains (see the module docs); the owner may
    /// keep appending concurrently.
    pub(crate) fn drain(&self) -> Vec<RawEvent> {
        let mut out = Vec::new();
        let mut current = self.head.load(Ordering::Acquire);

        while !current.is_null() {
            // SAFETY: segments reachable from `head` stay allocated until
            // this (externally serialized) drainer unlinks them below.
            let segment = unsafe { &*current };

            // `next` is read before `len`: a published successor guarantees
            // the final length of this segment is visible.
            let next = segment.next.load(Ordering::Acquire);
            let len = segment.len.load(Ordering::Acquire);
            let drained = segment.drained.load(Ordering::Relaxed);

            for slot in &segment.slots[drained..len] {
                // SAFETY: slots below the acquire-loaded `len` were fully
                // written before the owner's release-store published them.
                out.push(unsafe { slot.get().read().assume_init() });
            }

            if next.is_null() {
                segment.drained.store(len, Ordering::Relaxed);
                break;
            }

            self.head.store(next, Ordering::Release);
            // SAFETY: the owner published a successor, so it will never
            // touch this segment again, and no other drainer is running.
            drop(unsafe { Box::from_raw(current) });
            current = next;
        }

        out
    }

    /// Number of published events not yet drained.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        let mut total = 0;
        let mut current = self.head.load(Ordering::Acquire);

        while !current.is_null() {
            // SAFETY: same reachability argument as in `drain`.
            let segment = unsafe { &*current };
            total += segment.len.load(Ordering::Acquire) - segment.drained.load(Ordering::Relaxed);
            current = segment.next.load(Ordering::Acquire);
        }

        total
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        let mut current = *self.head.get_mut();

        while !current.is_null() {
            // SAFETY: we have exclusive access at drop, and every linked
            // segment was created by `Box::into_raw` in `install_segment`.
            let segment = unsafe { Box::from_raw(current) };
            current = segment.next.load(Ordering::Relaxed);
        }
    }
}
