//! Named JSON fixtures shared by tests and benches.
//!
//! `fixtures/manifest.json` maps fixture names to files under `fixtures/`.
//! This crate only locates and deserializes them; it does not depend on the engine.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<std::result::Result<Manifest, String>> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).map_err(|err| err.to_string())
});

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "engine-configs")]
    engine_configs: HashMap<String, String>,
    springs: HashMap<String, String>,
    physics: HashMap<String, String>,
    keyframes: HashMap<String, String>,
}

fn manifest() -> Result<&'static Manifest> {
    MANIFEST
        .as_ref()
        .map_err(|err| anyhow!("fixtures manifest failed to parse: {err}"))
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a>(map: &'a HashMap<String, String>, kind: &str, name: &str) -> Result<&'a str> {
    map.get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

fn sorted_keys(map: &HashMap<String, String>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

macro_rules! fixture_group {
    ($module:ident, $field:ident, $kind:literal) => {
        pub mod $module {
            use super::*;

            pub fn keys() -> Result<Vec<String>> {
                Ok(sorted_keys(&manifest()?.$field))
            }

            pub fn json(name: &str) -> Result<String> {
                read_to_string(lookup(&manifest()?.$field, $kind, name)?)
            }

            pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
                load_json(lookup(&manifest()?.$field, $kind, name)?)
            }

            pub fn path(name: &str) -> Result<PathBuf> {
                Ok(resolve_path(lookup(&manifest()?.$field, $kind, name)?))
            }
        }
    };
}

fixture_group!(engine_configs, engine_configs, "engine config");
fixture_group!(springs, springs, "spring");
fixture_group!(physics, physics, "physics");
fixture_group!(keyframes, keyframes, "keyframe");
