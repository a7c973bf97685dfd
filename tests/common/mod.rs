#![allow(dead_code)]

pub use eyerender_test_utils::{
    builders, init_tracing, missing_binary_locator, png_job, unspawnable_locator, with_timeout,
};

#[cfg(unix)]
pub use eyerender_test_utils::fake_renderer;
