fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default();
    let arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    let os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    // Only the freestanding image gets the custom layout; host builds are
    // ordinary executables
    if os == "none" && arch == "x86_64" {
        println!("cargo:rustc-link-arg-bins=-T{}/linker.ld", manifest_dir);
        // Fixed-address image: the header's stack pointer must be on disk,
        // not in a relocation. Pairs with the static relocation model set in
        // .cargo/config.toml.
        println!("cargo:rustc-link-arg-bins=-no-pie");
    }

    println!("cargo:rerun-if-changed=linker.ld");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../.cargo/config.toml");
}
