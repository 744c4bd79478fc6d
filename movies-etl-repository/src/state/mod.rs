//! Watermark storage backends.

mod json_file;
mod redis;

pub use json_file::JsonFileStateStorage;
pub use redis::RedisStateStorage;
