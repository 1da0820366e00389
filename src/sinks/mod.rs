//! Concrete sink implementations.

mod console;
mod memory;
mod rotating_file;
mod worker;

pub use console::ConsoleSink;
pub use memory::MemorySink;
pub use rotating_file::{
    DEFAULT_BACKUP_COUNT, DEFAULT_MAX_AGE_DAYS, DEFAULT_MAX_BYTES, DateClock, FileRetention,
    FileSinkConfig, RotatingFileSink, stream_path,
};
pub use worker::DEFAULT_CHANNEL_CAPACITY;
