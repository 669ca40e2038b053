pub mod registry;

pub use registry::{FakeRegistry, FakeServers, create_test_cache};
