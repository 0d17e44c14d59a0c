use std::mem::size_of;

use serde::{Deserialize, Serialize};
use speedy::{Context, Readable, Reader, Writable, Writer};

/// 64-bit sequence number, split into a signed high and unsigned low word on
/// the wire. RTPS spec v2.3 Section 9.3.2.
#[derive(
  Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SequenceNumber {
  value: i64,
}

impl SequenceNumber {
  pub const UNKNOWN: SequenceNumber = SequenceNumber {
    value: (u32::MAX as i64) << 32,
  };

  pub fn new(value: i64) -> SequenceNumber {
    SequenceNumber { value }
  }

  pub fn next(self) -> SequenceNumber {
    SequenceNumber {
      value: self.value + 1,
    }
  }
}

impl From<i64> for SequenceNumber {
  fn from(value: i64) -> Self {
    SequenceNumber { value }
  }
}

impl From<SequenceNumber> for i64 {
  fn from(sequence_number: SequenceNumber) -> Self {
    sequence_number.value
  }
}

impl Default for SequenceNumber {
  fn default() -> SequenceNumber {
    SequenceNumber { value: 1 }
  }
}

impl<'a, C: Context> Readable<'a, C> for SequenceNumber {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let high: i32 = reader.read_value()?;
    let low: u32 = reader.read_value()?;

    Ok(SequenceNumber {
      value: (i64::from(high) << 32) + i64::from(low),
    })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    size_of::<Self>()
  }
}

impl<C: Context> Writable<C> for SequenceNumber {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_i32((self.value >> 32) as i32)?;
    writer.write_u32(self.value as u32)?;
    Ok(())
  }
}
