//! PDU sequence numbers for SMPP-style binds.
//!
//! Every bind owns a [`SequenceNumber`] which hands out 32-bit identifiers for outbound
//! requests. The top nibble of each identifier is the bind's [`RangeTag`], the lower 28 bits a
//! counter cycling through `[DEFAULT_VALUE, MAX_VALUE]`. Up to 16 live binds therefore produce
//! disjoint identifier sets, and a shared dispatcher can route a response back to the bind that
//! issued the request by looking at the top nibble alone (see [`split`]).

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

mod policy;
mod sequence;
mod tag;

pub use policy::{InvalidSequenceNumber, ValidationPolicy};
pub use sequence::SequenceNumber;
pub use tag::{RangeTag, TagAllocator};

// Some operators start at 0, which SMPP 3.4 does not allow, so 0 stays in the valid range.
// The top nibble is left out as it carries the range tag.
pub const MIN_VALUE: u32 = 0x0000000;
pub const DEFAULT_VALUE: u32 = 0x0000001;
pub const MAX_VALUE: u32 = 0xFFFFFFF;

/// Number of distinct range tags, i.e. binds with disjoint identifier sets.
pub const RANGE_TAGS: u32 = 16;

const COUNTER_BITS: u32 = 28;

/// Pack a range tag and a counter into one sequence number.
///
/// The tag is taken modulo 16 and the counter modulo 2^28.
#[inline]
pub const fn combine(tag: u32, counter: u32) -> u32 {
    ((tag % RANGE_TAGS) << COUNTER_BITS) | (counter & MAX_VALUE)
}

/// Split a sequence number into the tag of the bind that produced it and its counter.
#[inline]
pub const fn split(sequence_number: u32) -> (RangeTag, u32) {
    (
        RangeTag::of(sequence_number),
        counter_of(sequence_number),
    )
}

/// The counter part (lower 28 bits) of a sequence number.
#[inline]
pub const fn counter_of(sequence_number: u32) -> u32 {
    sequence_number & MAX_VALUE
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn combine_packs_tag_into_top_nibble() {
        assert_eq!(combine(0, 1), 0x0000_0001);
        assert_eq!(combine(1, MAX_VALUE), 0x1FFF_FFFF);
        assert_eq!(combine(15, 0), 0xF000_0000);
    }

    #[test]
    fn combine_truncates_out_of_range_parts() {
        // Tag 17 aliases tag 1, counter bits above 28 are dropped.
        assert_eq!(combine(17, 2), combine(1, 2));
        assert_eq!(combine(3, 0xFFFF_FFFF), 0x3FFF_FFFF);
        assert_eq!(combine(0, MAX_VALUE + 1), 0);
    }

    #[test]
    fn split_recovers_tag_and_counter() {
        let (tag, counter) = split(0x1000_0004);
        assert_eq!(tag.as_u8(), 1);
        assert_eq!(counter, 4);

        let (tag, counter) = split(combine(15, 0x0ABC_DEF0));
        assert_eq!(tag, RangeTag::new(15));
        assert_eq!(counter, 0x0ABC_DEF0);
    }
}
