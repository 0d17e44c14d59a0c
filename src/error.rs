use std::result;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// This is a specialized Result, similar to `std::io::Result`.
pub type Result<T> = result::Result<T, Error>;

/// Failures surfaced by the discovery core.
///
/// Runtime discovery problems (a malformed announcement, a full proxy pool)
/// are mostly handled locally: logged, and reported to the application only
/// through `Ignored*` listener events or a `None` return. The variants below
/// are for the cases where an operation has a caller that can act on the
/// failure.
#[derive(Debug)]
pub enum Error {
  /// Illegal parameter value, e.g. a non-positive lease duration.
  BadParameter { reason: String },
  /// A configured resource limit was reached.
  OutOfResources { reason: String },
  /// Encoding or decoding of a builtin data payload failed.
  Serialization { reason: String },
  /// Something that should not go wrong went wrong anyway.
  /// This is usually a bug in this crate.
  Internal { reason: String },
  Io { inner: std::io::Error },
}

impl Error {
  pub fn bad_parameter<T>(reason: &str) -> Result<T> {
    Err(Error::BadParameter {
      reason: reason.to_string(),
    })
  }

  pub fn out_of_resources<T>(reason: &str) -> Result<T> {
    Err(Error::OutOfResources {
      reason: reason.to_string(),
    })
  }

  pub fn serialization<T>(reason: &str) -> Result<T> {
    Err(Error::Serialization {
      reason: reason.to_string(),
    })
  }
}

impl From<std::io::Error> for Error {
  fn from(e: std::io::Error) -> Error {
    Error::Io { inner: e }
  }
}

impl From<speedy::Error> for Error {
  fn from(e: speedy::Error) -> Error {
    Error::Serialization {
      reason: format!("{e}"),
    }
  }
}

#[doc(hidden)]
#[macro_export]
macro_rules! log_and_err_internal {
  ($($arg:tt)*) => (
      { error!($($arg)*);
        Err( Error::Internal{ reason: format!($($arg)*) } )
      }
    )
}
