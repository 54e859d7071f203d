use crate::RANGE_TAGS;
use core::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};
use log::{debug, warn};

/// The range a bind's sequence numbers live in, stored in their top nibble.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RangeTag(u8);

impl RangeTag {
    /// Tag for the `index`-th instance, instances beyond the 16th reuse tags.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self((index % RANGE_TAGS) as u8)
    }

    /// Tag of the bind that produced `sequence_number`.
    #[inline]
    pub const fn of(sequence_number: u32) -> Self {
        Self((sequence_number >> 28) as u8)
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for RangeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Hands out range tags to new sequence number generators.
///
/// Whoever creates binds owns one of these, so that each generator it creates gets the next tag.
/// [`TagAllocator::global`] is shared by the whole process.
#[derive(Debug)]
pub struct TagAllocator {
    next: AtomicU32,
}

static GLOBAL: TagAllocator = TagAllocator::new();

impl TagAllocator {
    /// Create an allocator whose first tag is 0.
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create an allocator which behaves as if `index` tags were already handed out.
    pub const fn starting_at(index: u32) -> Self {
        Self {
            next: AtomicU32::new(index),
        }
    }

    /// The process-wide allocator.
    pub fn global() -> &'static TagAllocator {
        &GLOBAL
    }

    /// Take the next tag.
    pub fn allocate(&self) -> RangeTag {
        // `fetch_add` wraps at 2^32, which is a multiple of 16, so the tag cycle is unbroken.
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        let tag = RangeTag::new(index);

        if index >= RANGE_TAGS && tag.as_u8() == 0 {
            warn!(
                "All {RANGE_TAGS} range tags handed out, reusing them ({} instances so far)",
                index
            );
        }

        debug!("Allocated range tag {tag} (instance {index})");

        tag
    }

    /// How many tags were handed out since creation or the last [`TagAllocator::reset`].
    pub fn allocated(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }

    /// Start over from tag 0.
    pub fn reset(&self) {
        self.next.store(0, Ordering::Relaxed);
    }
}

impl Default for TagAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{sync::Arc, thread, vec::Vec};

    #[test]
    fn consecutive_tags() {
        let tags = TagAllocator::new();

        assert_eq!(tags.allocate(), RangeTag::new(0));
        assert_eq!(tags.allocate(), RangeTag::new(1));
        assert_eq!(tags.allocate(), RangeTag::new(2));
        assert_eq!(tags.allocated(), 3);
    }

    #[test]
    fn tags_cycle_after_sixteen() {
        let tags = TagAllocator::starting_at(15);

        assert_eq!(tags.allocate().as_u8(), 15);
        assert_eq!(tags.allocate().as_u8(), 0);
        assert_eq!(tags.allocate().as_u8(), 1);
    }

    #[test]
    fn counter_wraps_without_breaking_cycle() {
        let tags = TagAllocator::starting_at(u32::MAX);

        assert_eq!(tags.allocate().as_u8(), 15);
        assert_eq!(tags.allocate().as_u8(), 0);
        assert_eq!(tags.allocated(), 1);
    }

    #[test]
    fn reset_starts_over() {
        let tags = TagAllocator::new();
        tags.allocate();
        tags.allocate();

        tags.reset();

        assert_eq!(tags.allocated(), 0);
        assert_eq!(tags.allocate(), RangeTag::new(0));
    }

    #[test]
    fn tag_of_sequence_number() {
        assert_eq!(RangeTag::of(0x0000_0001).as_u8(), 0);
        assert_eq!(RangeTag::of(0x1FFF_FFFF).as_u8(), 1);
        assert_eq!(RangeTag::of(0xF000_0000).as_u8(), 15);
    }

    #[test]
    fn concurrent_allocation_hands_out_every_index_once() {
        let tags = Arc::new(TagAllocator::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tags = tags.clone();
                thread::spawn(move || (0..4).map(|_| tags.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut counts = [0u32; 16];
        for handle in handles {
            for tag in handle.join().unwrap() {
                counts[tag.as_u8() as usize] += 1;
            }
        }

        // 32 allocations cover every tag exactly twice.
        assert_eq!(tags.allocated(), 32);
        assert!(counts.iter().all(|&c| c == 2));
    }
}
