use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};
use speedy::{Readable, Writable};

/// RTPS Duration_t: seconds plus a 32-bit binary fraction of a second.
/// RTPS spec v2.3 Section 9.3.2.
#[derive(
  Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Readable, Writable, Serialize, Deserialize,
)]
pub struct Duration {
  pub seconds: i32,
  pub fraction: u32,
}

const NANOS_PER_SEC: u64 = 1_000_000_000;

impl Duration {
  pub const ZERO: Duration = Duration {
    seconds: 0,
    fraction: 0,
  };
  pub const INVALID: Duration = Duration {
    seconds: -1,
    fraction: 0xFFFF_FFFF,
  };
  pub const INFINITE: Duration = Duration {
    seconds: 0x7FFF_FFFF,
    fraction: 0xFFFF_FFFF,
  };

  pub fn from_std(duration: StdDuration) -> Duration {
    let seconds = duration.as_secs().min(i32::MAX as u64) as i32;
    // fraction counts 2^-32 second units
    let fraction = ((u64::from(duration.subsec_nanos()) << 32) / NANOS_PER_SEC) as u32;
    Duration { seconds, fraction }
  }

  pub fn from_millis(millis: u64) -> Duration {
    Duration::from_std(StdDuration::from_millis(millis))
  }

  /// Clamps negative durations to zero.
  pub fn to_std(self) -> StdDuration {
    if self.seconds < 0 {
      return StdDuration::ZERO;
    }
    let nanos = (u64::from(self.fraction) * NANOS_PER_SEC) >> 32;
    StdDuration::new(self.seconds as u64, nanos as u32)
  }

  pub fn is_positive(self) -> bool {
    self.seconds > 0 || (self.seconds == 0 && self.fraction > 0)
  }
}

impl From<StdDuration> for Duration {
  fn from(duration: StdDuration) -> Self {
    Duration::from_std(duration)
  }
}

impl From<Duration> for StdDuration {
  fn from(duration: Duration) -> Self {
    duration.to_std()
  }
}
