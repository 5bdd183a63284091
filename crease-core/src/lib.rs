// crease-core: retrieval and advice pipeline shared by the crease binaries.

pub mod config;
pub mod provider;
pub mod embedding;
pub mod memory;
pub mod fetcher;
pub mod generator;
pub mod advisor;
pub mod state;

// Test utilities - always available for use by crease-cli and tests
pub mod testutil;
