//! Shared fixtures for the crate's unit tests: canned proxy data and
//! recording stand-ins for the external collaborators.

pub(crate) mod stubs;

/// `RUST_LOG=debug cargo test -- --nocapture` shows the discovery trace.
pub(crate) fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}
