//! Puts `memory.x` on the linker search path for the firmware target.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
  let out = PathBuf::from(env::var_os("OUT_DIR").unwrap());
  fs::copy("memory.x", out.join("memory.x")).unwrap();

  println!("cargo:rustc-link-search={}", out.display());
  println!("cargo:rerun-if-changed=memory.x");
}
