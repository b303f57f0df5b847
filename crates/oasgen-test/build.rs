//! Generates `tests/fixtures/petstore.yaml` into `OUT_DIR/petstore`.

use std::env;
use std::path::PathBuf;

use oasgen_codegen::{Generator, GeneratorConfig};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    let fixture = manifest_dir.join("../../tests/fixtures/petstore.yaml");
    println!("cargo:rerun-if-changed={}", fixture.display());

    let config = GeneratorConfig::new()
        .with_package("petstore")
        .with_output(out_dir.join("petstore"));
    Generator::new(config)
        .run(&fixture)
        .expect("petstore fixture should generate");
}
