//! In-process engine and fixtures for tests and benchmarks.

mod mock_engine;
pub mod test_helpers;

pub use mock_engine::{
    DEFAULT_SEGMENT_LEN, MockColumn, MockEngine, MockFailure, Reply, ReplyHandler, record,
};
pub use test_helpers::{connect, connect_with, mock_environment, text_rows};
