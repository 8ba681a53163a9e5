#![deny(clippy::pedantic, clippy::clone_on_ref_ptr)]

use cfg_aliases::cfg_aliases;

fn main() {
    // test is not supported because cfg_aliases is based on
    // https://docs.rs/tectonic_cfg_support macro and that only supports features, target_os, family
    // env, etc.
    cfg_aliases! {
        unit_test: { feature = "in-memory-infra" },
    }
}
