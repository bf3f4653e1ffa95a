#![allow(dead_code)]

pub mod cog;
pub mod fake_engine;

pub use cog::{BuiltCog, CogBuilder};
pub use fake_engine::{compliant_artifact, landcover_artifact, FakeEngine};

/// Names of the `.pog-*` scratch directories left in `dir`.
pub fn scratch_dirs(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".pog-"))
        .collect()
}
