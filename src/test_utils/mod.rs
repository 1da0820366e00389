//! Helpers shared by unit and integration tests.
//!
//! Compiled for the crate's own tests and, through the `test-util` feature,
//! for the integration suites under `tests/`.

pub mod fake_connection;
pub mod shared_buffer;

pub use fake_connection::{FakeConnection, FakeHandle};
pub use shared_buffer::SharedBuf;
