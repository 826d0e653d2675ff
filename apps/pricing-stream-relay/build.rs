//! Build Script for Pricing Stream Relay
//!
//! Generates Rust protobuf stubs from the crate-local proto definitions.
//! Requires `protoc` in PATH (standard prost-build toolchain).
//!
//! # Panics Policy
//!
//! Build scripts intentionally use `.expect()` and panic on failure because:
//! - Build scripts MUST halt the build process when prerequisites are missing
//! - There is no caller to propagate errors to - the build system handles panics
#![allow(clippy::expect_used)]

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=proto/pricing/v1/pricing.proto");

    // Point prost at the vendored `protoc` binary so the build does not depend
    // on a system-installed protobuf compiler being present in PATH.
    let mut config = tonic_prost_build::Config::new();
    if std::env::var_os("PROTOC").is_none() {
        let protoc =
            protoc_bin_vendored::protoc_bin_path().expect("vendored protoc binary unavailable");
        config.protoc_executable(protoc);
    }

    tonic_prost_build::configure()
        .build_client(true) // The hub adapter and integration tests dial the service
        .build_server(true)
        .compile_with_config(config, &["proto/pricing/v1/pricing.proto"], &["proto"])
        .expect("failed to compile pricing proto definitions");
}
