//! Encapsulation of builtin discovery data as CDR parameter lists
//! (`PL_CDR_LE` / `PL_CDR_BE`), RTPS spec v2.3 Section 10.

#[cfg(test)]
macro_rules! serialization_test {
  ( type = $type:ty,
    $({ $name:ident, $value:expr, le = $le:expr, be = $be:expr }),+ ) => {
    $(mod $name {
      use super::*;
      #[allow(unused_imports)]
      use speedy::{Readable, Writable, Endianness};

      #[test]
      fn serialize_little_endian() {
        let value: $type = $value;
        let bytes = value
          .write_to_vec_with_ctx(Endianness::LittleEndian)
          .unwrap();
        assert_eq!(bytes[..], $le[..]);
      }

      #[test]
      fn serialize_big_endian() {
        let value: $type = $value;
        let bytes = value.write_to_vec_with_ctx(Endianness::BigEndian).unwrap();
        assert_eq!(bytes[..], $be[..]);
      }

      #[test]
      fn deserialize_little_endian() {
        let expected: $type = $value;
        let decoded =
          <$type>::read_from_buffer_with_ctx(Endianness::LittleEndian, &$le).unwrap();
        assert_eq!(decoded, expected);
      }

      #[test]
      fn deserialize_big_endian() {
        let expected: $type = $value;
        let decoded = <$type>::read_from_buffer_with_ctx(Endianness::BigEndian, &$be).unwrap();
        assert_eq!(decoded, expected);
      }
    })+
  };
}

pub mod builtin_data_deserializer;
pub mod builtin_data_serializer;
pub mod representation_identifier;

pub use builtin_data_deserializer::BuiltinDataDeserializer;
pub use builtin_data_serializer::BuiltinDataSerializer;
pub use representation_identifier::RepresentationIdentifier;
