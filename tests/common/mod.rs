#![allow(dead_code)]

pub use buildpipe_test_utils::{init_tracing, with_timeout};
