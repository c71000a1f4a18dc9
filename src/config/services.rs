//! Service descriptor files.
//!
//! A descriptor file lists the services a client wants registered. YAML and
//! JSON files hold a single service object or a list of them; TOML files hold
//! either a single top-level service table or a `[[services]]` array.
//!
//! Only `id` is required. Addresses are checked when the routing policy
//! compiles.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::registry::Service;

#[derive(Debug, Error)]
pub enum ServiceFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON service descriptor: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML service descriptor: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid YAML service descriptor: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One service or a list of them, shared by JSON and YAML.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Service>),
    One(Service),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TomlDescriptor {
    Many { services: Vec<Service> },
    One(Service),
}

/// Load service descriptors, picking the format from the file extension.
pub fn load_services(path: &Path) -> Result<Vec<Service>, ServiceFileError> {
    let content = fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("toml") => parse_toml(&content),
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => parse_yaml(&content),
        _ => parse_json(&content),
    }
}

impl OneOrMany {
    fn into_vec(self) -> Vec<Service> {
        match self {
            OneOrMany::Many(services) => services,
            OneOrMany::One(service) => vec![service],
        }
    }
}

pub fn parse_json(content: &str) -> Result<Vec<Service>, ServiceFileError> {
    Ok(serde_json::from_str::<OneOrMany>(content)?.into_vec())
}

pub fn parse_yaml(content: &str) -> Result<Vec<Service>, ServiceFileError> {
    Ok(serde_yaml::from_str::<OneOrMany>(content)?.into_vec())
}

pub fn parse_toml(content: &str) -> Result<Vec<Service>, ServiceFileError> {
    Ok(match toml::from_str(content)? {
        TomlDescriptor::Many { services } => services,
        TomlDescriptor::One(service) => vec![service],
    })
}
