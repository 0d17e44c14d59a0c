use serde::{Deserialize, Serialize};
use speedy::{Context, Readable, Reader, Writable, Writer};

/// The common prefix shared by a participant and all entities within it.
/// RTPS spec v2.3 Section 8.2.4.1.
#[derive(
  Copy, Clone, Debug, Default, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize,
)]
pub struct GuidPrefix {
  pub bytes: [u8; 12],
}

impl GuidPrefix {
  pub const UNKNOWN: GuidPrefix = GuidPrefix { bytes: [0x00; 12] };

  pub fn new(bytes: [u8; 12]) -> GuidPrefix {
    GuidPrefix { bytes }
  }
}

impl<'a, C: Context> Readable<'a, C> for GuidPrefix {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let mut guid_prefix = GuidPrefix::default();
    for i in 0..guid_prefix.bytes.len() {
      guid_prefix.bytes[i] = reader.read_u8()?;
    }
    Ok(guid_prefix)
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    std::mem::size_of::<Self>()
  }
}

impl<C: Context> Writable<C> for GuidPrefix {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    for elem in &self.bytes {
      writer.write_u8(*elem)?;
    }
    Ok(())
  }
}

/// Identifies an entity within a participant. The last octet is the entity
/// kind; the well-known builtin ids below are from RTPS spec v2.3
/// Section 8.5.4.2.
#[derive(
  Copy, Clone, Debug, Default, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize,
)]
pub struct EntityId {
  pub entity_key: [u8; 3],
  pub entity_kind: u8,
}

impl EntityId {
  pub const UNKNOWN: EntityId = EntityId {
    entity_key: [0x00; 3],
    entity_kind: 0x00,
  };
  pub const PARTICIPANT: EntityId = EntityId {
    entity_key: [0x00, 0x00, 0x01],
    entity_kind: 0xC1,
  };
  pub const SEDP_BUILTIN_PUBLICATIONS_WRITER: EntityId = EntityId {
    entity_key: [0x00, 0x00, 0x03],
    entity_kind: 0xC2,
  };
  pub const SEDP_BUILTIN_PUBLICATIONS_READER: EntityId = EntityId {
    entity_key: [0x00, 0x00, 0x03],
    entity_kind: 0xC7,
  };
  pub const SEDP_BUILTIN_SUBSCRIPTIONS_WRITER: EntityId = EntityId {
    entity_key: [0x00, 0x00, 0x04],
    entity_kind: 0xC2,
  };
  pub const SEDP_BUILTIN_SUBSCRIPTIONS_READER: EntityId = EntityId {
    entity_key: [0x00, 0x00, 0x04],
    entity_kind: 0xC7,
  };
  pub const SPDP_BUILTIN_PARTICIPANT_WRITER: EntityId = EntityId {
    entity_key: [0x00, 0x01, 0x00],
    entity_kind: 0xC2,
  };
  pub const SPDP_BUILTIN_PARTICIPANT_READER: EntityId = EntityId {
    entity_key: [0x00, 0x01, 0x00],
    entity_kind: 0xC7,
  };
  pub const P2P_BUILTIN_PARTICIPANT_MESSAGE_WRITER: EntityId = EntityId {
    entity_key: [0x00, 0x02, 0x00],
    entity_kind: 0xC2,
  };
  pub const P2P_BUILTIN_PARTICIPANT_MESSAGE_READER: EntityId = EntityId {
    entity_key: [0x00, 0x02, 0x00],
    entity_kind: 0xC7,
  };

  /// Builtin entities have the most significant bit of the kind octet set.
  pub fn is_builtin(&self) -> bool {
    self.entity_kind & 0xC0 == 0xC0
  }
}

impl<'a, C: Context> Readable<'a, C> for EntityId {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let entity_key = [reader.read_u8()?, reader.read_u8()?, reader.read_u8()?];
    let entity_kind = reader.read_u8()?;
    Ok(EntityId {
      entity_key,
      entity_kind,
    })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    std::mem::size_of::<Self>()
  }
}

impl<C: Context> Writable<C> for EntityId {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    for elem in &self.entity_key {
      writer.write_u8(*elem)?;
    }
    writer.write_u8(self.entity_kind)
  }
}

/// Globally unique identifier of an RTPS entity: 12-byte participant prefix
/// plus 4-byte entity id.
#[derive(
  Copy,
  Clone,
  Debug,
  Default,
  PartialOrd,
  PartialEq,
  Ord,
  Eq,
  Hash,
  Readable,
  Writable,
  Serialize,
  Deserialize,
)]
pub struct GUID {
  pub prefix: GuidPrefix,
  pub entity_id: EntityId,
}

impl GUID {
  pub const UNKNOWN: GUID = GUID {
    prefix: GuidPrefix::UNKNOWN,
    entity_id: EntityId::UNKNOWN,
  };

  pub fn new(prefix: GuidPrefix, entity_id: EntityId) -> GUID {
    GUID { prefix, entity_id }
  }

  /// The GUID naming the participant itself.
  pub fn from_prefix(prefix: GuidPrefix) -> GUID {
    GUID {
      prefix,
      entity_id: EntityId::PARTICIPANT,
    }
  }
}
