use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use serde::{Deserialize, Serialize};
use speedy::{Context, Readable, Reader, Writable, Writer};

/// Transport class discriminator of a [`Locator`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Readable, Writable, Serialize, Deserialize)]
pub struct LocatorKind {
  value: i32,
}

impl LocatorKind {
  pub const INVALID: LocatorKind = LocatorKind { value: -1 };
  pub const RESERVED: LocatorKind = LocatorKind { value: 0 };
  pub const UDPV4: LocatorKind = LocatorKind { value: 1 };
  pub const UDPV6: LocatorKind = LocatorKind { value: 2 };
}

/// Transport, address, port combination that can be used to reach an
/// endpoint. IPv4 addresses are mapped into the low bytes of the 16-byte
/// address field. RTPS spec v2.3 Section 9.3.2.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Locator {
  pub kind: LocatorKind,
  pub port: u32,
  pub address: [u8; 16],
}

impl Locator {
  pub const INVALID: Locator = Locator {
    kind: LocatorKind::INVALID,
    port: Locator::PORT_INVALID,
    address: Locator::ADDRESS_INVALID,
  };

  pub const ADDRESS_INVALID: [u8; 16] = [0x00; 16];
  pub const PORT_INVALID: u32 = 0;
}

impl Default for Locator {
  fn default() -> Self {
    Locator::INVALID
  }
}

impl From<SocketAddr> for Locator {
  fn from(socket_address: SocketAddr) -> Self {
    Locator {
      kind: if socket_address.ip().is_unspecified() {
        LocatorKind::INVALID
      } else if socket_address.ip().is_ipv4() {
        LocatorKind::UDPV4
      } else {
        LocatorKind::UDPV6
      },
      port: u32::from(socket_address.port()),
      address: match socket_address.ip() {
        IpAddr::V4(ip4) => ip4.to_ipv6_compatible().octets(),
        IpAddr::V6(ip6) => ip6.octets(),
      },
    }
  }
}

impl From<Locator> for SocketAddr {
  fn from(locator: Locator) -> Self {
    match locator.kind {
      LocatorKind::UDPV4 => SocketAddr::new(
        IpAddr::V4(Ipv4Addr::new(
          locator.address[12],
          locator.address[13],
          locator.address[14],
          locator.address[15],
        )),
        locator.port as u16,
      ),
      LocatorKind::UDPV6 => SocketAddr::new(
        IpAddr::V6(Ipv6Addr::from(locator.address)),
        locator.port as u16,
      ),
      _ => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    }
  }
}

impl<'a, C: Context> Readable<'a, C> for Locator {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let mut locator = Locator::default();
    locator.kind = reader.read_value()?;
    locator.port = reader.read_value()?;
    for i in 0..locator.address.len() {
      locator.address[i] = reader.read_u8()?;
    }
    Ok(locator)
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    std::mem::size_of::<Self>()
  }
}

impl<C: Context> Writable<C> for Locator {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_value(&self.kind)?;
    writer.write_value(&self.port)?;
    for elem in &self.address {
      writer.write_u8(*elem)?;
    }
    Ok(())
  }
}

/// Unicast and multicast locators advertised for one remote entity.
///
/// The capacities are fixed when the holding proxy object is allocated and
/// survive [`RemoteLocatorList::clear`], so a recycled proxy keeps the
/// storage bounds it was configured with.
#[derive(Clone, Debug)]
pub struct RemoteLocatorList {
  pub unicast: Vec<Locator>,
  pub multicast: Vec<Locator>,
  max_unicast_locators: usize,
  max_multicast_locators: usize,
}

impl RemoteLocatorList {
  pub fn with_capacities(max_unicast_locators: usize, max_multicast_locators: usize) -> Self {
    RemoteLocatorList {
      unicast: Vec::new(),
      multicast: Vec::new(),
      max_unicast_locators,
      max_multicast_locators,
    }
  }

  /// Returns false when the locator had to be refused: capacity reached.
  /// Duplicates are ignored and reported as success.
  pub fn add_unicast_locator(&mut self, locator: Locator) -> bool {
    if self.unicast.contains(&locator) {
      return true;
    }
    if self.unicast.len() >= self.max_unicast_locators {
      return false;
    }
    self.unicast.push(locator);
    true
  }

  pub fn add_multicast_locator(&mut self, locator: Locator) -> bool {
    if self.multicast.contains(&locator) {
      return true;
    }
    if self.multicast.len() >= self.max_multicast_locators {
      return false;
    }
    self.multicast.push(locator);
    true
  }

  /// Replaces the contents with `other`'s locators, keeping own capacities.
  /// Returns false if any locator did not fit.
  pub fn assign(&mut self, other: &RemoteLocatorList) -> bool {
    self.clear();
    let mut all_fit = true;
    for loc in &other.unicast {
      all_fit &= self.add_unicast_locator(*loc);
    }
    for loc in &other.multicast {
      all_fit &= self.add_multicast_locator(*loc);
    }
    all_fit
  }

  pub fn clear(&mut self) {
    self.unicast.clear();
    self.multicast.clear();
  }

  pub fn max_unicast_locators(&self) -> usize {
    self.max_unicast_locators
  }

  pub fn max_multicast_locators(&self) -> usize {
    self.max_multicast_locators
  }
}

impl Default for RemoteLocatorList {
  fn default() -> Self {
    RemoteLocatorList::with_capacities(usize::MAX, usize::MAX)
  }
}

// Capacities are configuration, not state: two lists with the same locators
// compare equal.
impl PartialEq for RemoteLocatorList {
  fn eq(&self, other: &Self) -> bool {
    self.unicast == other.unicast && self.multicast == other.multicast
  }
}

impl Eq for RemoteLocatorList {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn capacity_is_enforced_and_survives_clear() {
    let mut list = RemoteLocatorList::with_capacities(1, 1);
    let loc_a = Locator::from(SocketAddr::new("127.0.0.1".parse().unwrap(), 7400));
    let loc_b = Locator::from(SocketAddr::new("127.0.0.1".parse().unwrap(), 7401));

    assert!(list.add_unicast_locator(loc_a));
    // duplicate is accepted but not stored twice
    assert!(list.add_unicast_locator(loc_a));
    assert_eq!(list.unicast.len(), 1);
    // capacity reached
    assert!(!list.add_unicast_locator(loc_b));

    list.clear();
    assert!(list.add_unicast_locator(loc_b));
    assert!(!list.add_unicast_locator(loc_a));
  }

  #[test]
  fn assign_respects_own_capacity() {
    let mut small = RemoteLocatorList::with_capacities(1, 0);
    let mut large = RemoteLocatorList::with_capacities(8, 8);
    large.add_unicast_locator(Locator::from(SocketAddr::new(
      "127.0.0.1".parse().unwrap(),
      7400,
    )));
    large.add_unicast_locator(Locator::from(SocketAddr::new(
      "127.0.0.1".parse().unwrap(),
      7401,
    )));

    assert!(!small.assign(&large));
    assert_eq!(small.unicast.len(), 1);
  }

  serialization_test!( type = Locator,
      {
          locator_invalid,
          Locator::INVALID,
          le = [
              0xFF, 0xFF, 0xFF, 0xFF,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00
          ],
          be = [
              0xFF, 0xFF, 0xFF, 0xFF,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00
          ]
      },
      {
          locator_localhost_ipv4,
          Locator::from(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080)),
          le = [
              0x01, 0x00, 0x00, 0x00,
              0x90, 0x1F, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x7F, 0x00, 0x00, 0x01
          ],
          be = [
              0x00, 0x00, 0x00, 0x01,
              0x00, 0x00, 0x1F, 0x90,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x7F, 0x00, 0x00, 0x01
          ]
      },
      {
          locator_ipv6,
          Locator::from(SocketAddr::new(
            IpAddr::V6(Ipv6Addr::new(0xFF00, 0x4501, 0, 0, 0, 0, 0, 0x0032)), 7171)),
          le = [
              0x02, 0x00, 0x00, 0x00,
              0x03, 0x1C, 0x00, 0x00,
              0xFF, 0x00, 0x45, 0x01,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x32
          ],
          be = [
              0x00, 0x00, 0x00, 0x02,
              0x00, 0x00, 0x1C, 0x03,
              0xFF, 0x00, 0x45, 0x01,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x00,
              0x00, 0x00, 0x00, 0x32
          ]
      }
  );
}
