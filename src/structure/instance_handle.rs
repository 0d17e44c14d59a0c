use serde::{Deserialize, Serialize};
use speedy::{Context, Readable, Reader, Writable, Writer};

use crate::structure::guid::{EntityId, GuidPrefix, GUID};

/// 16-byte identity of one sample instance, used to match updates and
/// disposes in a history cache. For discovery data the handle is the
/// announcing entity's GUID, prefix first, in big-endian byte order.
#[derive(
  Copy, Clone, Debug, Default, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize,
)]
pub struct InstanceHandle {
  pub bytes: [u8; 16],
}

impl InstanceHandle {
  pub const UNKNOWN: InstanceHandle = InstanceHandle { bytes: [0x00; 16] };
}

impl From<GUID> for InstanceHandle {
  fn from(guid: GUID) -> Self {
    let mut bytes = [0x00; 16];
    bytes[..12].copy_from_slice(&guid.prefix.bytes);
    bytes[12..15].copy_from_slice(&guid.entity_id.entity_key);
    bytes[15] = guid.entity_id.entity_kind;
    InstanceHandle { bytes }
  }
}

impl From<InstanceHandle> for GUID {
  fn from(handle: InstanceHandle) -> Self {
    let mut prefix = GuidPrefix::default();
    prefix.bytes.copy_from_slice(&handle.bytes[..12]);
    let entity_id = EntityId {
      entity_key: [handle.bytes[12], handle.bytes[13], handle.bytes[14]],
      entity_kind: handle.bytes[15],
    };
    GUID { prefix, entity_id }
  }
}

impl<'a, C: Context> Readable<'a, C> for InstanceHandle {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let mut handle = InstanceHandle::default();
    for i in 0..handle.bytes.len() {
      handle.bytes[i] = reader.read_u8()?;
    }
    Ok(handle)
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    std::mem::size_of::<Self>()
  }
}

impl<C: Context> Writable<C> for InstanceHandle {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    for elem in &self.bytes {
      writer.write_u8(*elem)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn handle_round_trips_through_guid() {
    let guid = GUID::new(
      GuidPrefix::new([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]),
      EntityId::PARTICIPANT,
    );
    let handle = InstanceHandle::from(guid);
    assert_eq!(
      handle.bytes,
      [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 0, 0, 1, 0xC1]
    );
    assert_eq!(GUID::from(handle), guid);
  }

  serialization_test!( type = InstanceHandle,
  {
      instance_handle_unknown,
      InstanceHandle::UNKNOWN,
      le = [0x00; 16],
      be = [0x00; 16]
  });
}
