#![deny(clippy::pedantic, clippy::clone_on_ref_ptr)]
// The following warnings are too noisy for us and having them enabled leads to polluting the
// code with allow annotations. Disabling them once per project here
#![allow(clippy::similar_names)]
#![allow(clippy::module_name_repetitions)]
// In unit tests, it is ok to use methods discouraged to use in prod code.
#![cfg_attr(test, allow(clippy::disallowed_methods))]

pub mod config;
pub mod error;
pub mod helpers;
pub mod protocol;
pub mod secret_sharing;
pub mod telemetry;

#[cfg(any(test, feature = "test-fixture"))]
pub mod test_fixture;

pub use config::AttributionConfig;
pub use error::Error;

#[cfg(all(test, unit_test))]
pub(crate) mod test_executor {
    use std::future::Future;

    pub fn run<F, Fut, T>(f: F) -> T
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T>,
    {
        tokio::runtime::Builder::new_multi_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(f())
    }
}

#[macro_export]
macro_rules! const_assert {
    ($x:expr $(,)?) => {
        const _: () = assert!($x, stringify!($x));
    };
    ($x:expr, $msg:expr $(,)?) => {
        const _: () = assert!($x, $msg);
    };
}
