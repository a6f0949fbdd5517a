use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    // Only the `cortex-m4` demo firmware links against `memory.x`; host
    // builds (the library itself, its test suite) never touch this.
    if env::var_os("CARGO_FEATURE_CORTEX_M4").is_none() {
        return;
    }
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::copy("memory.x", out_dir.join("memory.x")).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}
