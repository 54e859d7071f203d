use crate::{
    combine, InvalidSequenceNumber, RangeTag, TagAllocator, ValidationPolicy, DEFAULT_VALUE,
    MAX_VALUE,
};
use core::sync::atomic::{AtomicU32, Ordering};
use log::trace;

/// Generator of sequence numbers for the requests of one bind.
///
/// The counter wraps from `MAX_VALUE` back to `DEFAULT_VALUE`, skipping 0. All methods take
/// `&self` and are safe to call from many threads or tasks at once: concurrent callers of
/// [`SequenceNumber::next`] each get a distinct number, with no gaps.
#[derive(Debug)]
pub struct SequenceNumber {
    range_tag: RangeTag,
    value: AtomicU32,
}

impl SequenceNumber {
    /// Create a generator starting at `DEFAULT_VALUE`, taking the next tag from `tags`.
    pub fn new(tags: &TagAllocator) -> Self {
        Self {
            range_tag: tags.allocate(),
            value: AtomicU32::new(DEFAULT_VALUE),
        }
    }

    /// Create a generator starting at `initial_value`, taking the next tag from `tags`.
    ///
    /// No tag is used up if `policy` rejects the value.
    pub fn with_initial_value(
        tags: &TagAllocator,
        initial_value: u32,
        policy: ValidationPolicy,
    ) -> Result<Self, InvalidSequenceNumber> {
        policy.validate(initial_value)?;

        Ok(Self {
            range_tag: tags.allocate(),
            value: AtomicU32::new(initial_value),
        })
    }

    /// The tag in the top nibble of every number this generator produces.
    pub fn range_tag(&self) -> RangeTag {
        self.range_tag
    }

    /// Get the next number in the sequence.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> u32 {
        let current = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |value| {
                Some(if value == MAX_VALUE {
                    DEFAULT_VALUE
                } else {
                    // Values above `MAX_VALUE` only come from a permissive initial value.
                    value.wrapping_add(1)
                })
            })
            // The closure always returns `Some`.
            .unwrap_or_else(|value| value);

        if current == MAX_VALUE {
            trace!("Range {} wrapped around", self.range_tag);
        }

        combine(self.range_tag.as_u32(), current)
    }

    /// Get the number the next call to [`SequenceNumber::next`] will return, without moving the
    /// sequence forward.
    pub fn peek(&self) -> u32 {
        combine(self.range_tag.as_u32(), self.value.load(Ordering::Acquire))
    }

    /// Go back to the start of the sequence, `DEFAULT_VALUE`.
    pub fn reset(&self) {
        self.value.store(DEFAULT_VALUE, Ordering::Release);
    }
}

impl Default for SequenceNumber {
    /// Generator using the process-wide [`TagAllocator::global`].
    fn default() -> Self {
        Self::new(TagAllocator::global())
    }
}
