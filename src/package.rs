//! Package identity discovery.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Manifest format a package was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestKind {
    PackageJson,
    CargoToml,
}

impl ManifestKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ManifestKind::PackageJson => "package.json",
            ManifestKind::CargoToml => "Cargo.toml",
        }
    }
}

/// Name and declared version of the package being released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub manifest: ManifestKind,
}

#[derive(Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
}

impl PackageInfo {
    /// Reads the package manifest at the root of `checkout`.
    ///
    /// `package.json` takes precedence over `Cargo.toml`.
    pub fn discover(checkout: &Path) -> Result<Self> {
        let package_json = checkout.join(ManifestKind::PackageJson.file_name());
        if package_json.exists() {
            return Self::from_package_json(&std::fs::read_to_string(&package_json)?);
        }

        let cargo_toml = checkout.join(ManifestKind::CargoToml.file_name());
        if cargo_toml.exists() {
            return Self::from_cargo_toml(&std::fs::read_to_string(&cargo_toml)?);
        }

        Err(Error::Manifest(format!(
            "no package.json or Cargo.toml in {}",
            checkout.display()
        )))
    }

    /// Parses a `package.json` document.
    pub fn from_package_json(text: &str) -> Result<Self> {
        let manifest: PackageJson = serde_json::from_str(text)
            .map_err(|e| Error::Manifest(format!("invalid package.json: {}", e)))?;
        let name = manifest
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::Manifest("package.json has no name".to_string()))?;

        Ok(Self {
            name,
            version: manifest.version.unwrap_or_else(|| "0.0.0".to_string()),
            manifest: ManifestKind::PackageJson,
        })
    }

    /// Parses a `Cargo.toml` document.
    ///
    /// A version inherited from the workspace is reported as `workspace`.
    pub fn from_cargo_toml(text: &str) -> Result<Self> {
        let manifest: toml::Value = toml::from_str(text)
            .map_err(|e| Error::Manifest(format!("invalid Cargo.toml: {}", e)))?;
        let package = manifest
            .get("package")
            .ok_or_else(|| Error::Manifest("Cargo.toml has no [package] table".to_string()))?;
        let name = package
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| Error::Manifest("Cargo.toml has no package name".to_string()))?;
        let version = match package.get("version") {
            Some(toml::Value::String(v)) => v.clone(),
            Some(toml::Value::Table(_)) => "workspace".to_string(),
            _ => "0.0.0".to_string(),
        };

        Ok(Self {
            name: name.to_string(),
            version,
            manifest: ManifestKind::CargoToml,
        })
    }
}
