use std::env;

fn main() {
    // ESP-IDF link arguments are only meaningful when building the firmware image.
    // Host builds (tests, dry-run console) skip the ESP-IDF environment entirely.
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    if target_os == "espidf" {
        embuild::espidf::sysenv::output();
    }

    println!("cargo:rerun-if-changed=build.rs");
}
