use crate::{MAX_VALUE, MIN_VALUE};
use core::fmt;
use serde::{Deserialize, Serialize};

/// How strictly initial sequence numbers are checked.
///
/// Some operators use all 32 bits of the sequence number, so the default accepts anything.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Accept every 32-bit value.
    #[default]
    Permissive,
    /// Only accept `MIN_VALUE..=MAX_VALUE`.
    Strict,
}

impl ValidationPolicy {
    /// Check a sequence number against this policy.
    pub fn validate(self, sequence_number: u32) -> Result<(), InvalidSequenceNumber> {
        match self {
            ValidationPolicy::Permissive => Ok(()),
            ValidationPolicy::Strict => {
                if (MIN_VALUE..=MAX_VALUE).contains(&sequence_number) {
                    Ok(())
                } else {
                    Err(InvalidSequenceNumber {
                        value: sequence_number,
                    })
                }
            }
        }
    }
}

/// A sequence number outside of the range allowed by the [`ValidationPolicy`].
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InvalidSequenceNumber {
    pub value: u32,
}

impl fmt::Display for InvalidSequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sequence number [{}] is not in range from {} to {}",
            self.value, MIN_VALUE, MAX_VALUE
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidSequenceNumber {}
