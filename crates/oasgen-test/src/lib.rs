//! Integration harness for oasgen-generated code.
//!
//! `build.rs` generates the petstore fixture at build time. [`petstore`]
//! pulls the artifacts in, [`store`] implements the generated traits in
//! memory, and [`TestServer`] serves the result over real HTTP.

#[cfg(test)]
mod cli;
pub mod server;
pub mod store;

/// Code generated from `tests/fixtures/petstore.yaml`.
#[allow(dead_code, unused_imports, non_upper_case_globals, clippy::all)]
pub mod petstore {
    pub mod types {
        include!(concat!(env!("OUT_DIR"), "/petstore/types.rs"));
    }
    pub mod server {
        include!(concat!(env!("OUT_DIR"), "/petstore/server.rs"));
    }
    pub mod security {
        include!(concat!(env!("OUT_DIR"), "/petstore/security.rs"));
    }
    pub mod webhooks {
        include!(concat!(env!("OUT_DIR"), "/petstore/webhooks.rs"));
    }
}

pub use server::{TestError, TestServer};
pub use store::{MemoryStore, StaticCredentials};
