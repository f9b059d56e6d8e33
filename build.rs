// build.rs - stamps the build time into the binary banner

use chrono::Utc;
use std::{env, fs, path::PathBuf};

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
    let stamp = Utc::now().format("%Y-%m-%d %H:%M UTC");

    fs::write(
        out.join("build_info.rs"),
        format!("pub const BUILD_DATE: &str = \"{stamp}\";\n"),
    )
    .expect("write build_info.rs");

    println!("cargo:rerun-if-changed=build.rs");
}
