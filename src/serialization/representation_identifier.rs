use std::io;

use byteorder::ReadBytesExt;
use speedy::{Endianness, Readable, Writable};

/// Used to identify the serialization format of payload data over RTPS.
/// Numeric values are from RTPS spec v2.3 Section 10.5, Table 10.3.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Readable, Writable)]
pub struct RepresentationIdentifier {
  pub bytes: [u8; 2],
}

impl RepresentationIdentifier {
  pub const CDR_BE: RepresentationIdentifier = RepresentationIdentifier {
    bytes: [0x00, 0x00],
  };
  pub const CDR_LE: RepresentationIdentifier = RepresentationIdentifier {
    bytes: [0x00, 0x01],
  };

  pub const PL_CDR_BE: RepresentationIdentifier = RepresentationIdentifier {
    bytes: [0x00, 0x02],
  };
  pub const PL_CDR_LE: RepresentationIdentifier = RepresentationIdentifier {
    bytes: [0x00, 0x03],
  };

  pub fn from_bytes(bytes: &[u8]) -> io::Result<RepresentationIdentifier> {
    let mut reader = io::Cursor::new(bytes);
    Ok(RepresentationIdentifier {
      bytes: [reader.read_u8()?, reader.read_u8()?],
    })
  }

  pub fn to_bytes(self) -> [u8; 2] {
    self.bytes
  }

  /// Byte order of a parameter-list payload tagged with this identifier.
  pub fn endianness(self) -> Option<Endianness> {
    match self {
      RepresentationIdentifier::PL_CDR_LE => Some(Endianness::LittleEndian),
      RepresentationIdentifier::PL_CDR_BE => Some(Endianness::BigEndian),
      _ => None,
    }
  }

  pub fn pl_cdr_for(endianness: Endianness) -> RepresentationIdentifier {
    match endianness {
      Endianness::LittleEndian => RepresentationIdentifier::PL_CDR_LE,
      Endianness::BigEndian => RepresentationIdentifier::PL_CDR_BE,
    }
  }
}
