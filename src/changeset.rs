//! Changeset records.
//!
//! A changeset is a markdown file with a YAML frontmatter block mapping each
//! affected package to its release type, followed by the release message:
//!
//! ```text
//! ---
//! "@acme/auth": minor
//! ---
//!
//! Add OAuth support
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::{ReleaseDecision, ReleaseType};

const FRONTMATTER_DELIMITER: &str = "---";

/// A release decision bound to the packages it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    /// Package names paired with their release type, in declaration order.
    pub releases: Vec<(String, ReleaseType)>,
    pub message: String,
}

impl Changeset {
    /// Applies one decision to every package.
    pub fn new(packages: &[String], decision: &ReleaseDecision) -> Self {
        Self {
            releases: packages
                .iter()
                .map(|p| (p.clone(), decision.release_type))
                .collect(),
            message: decision.message.trim().to_string(),
        }
    }

    /// Highest release type across all packages.
    pub fn release_type(&self) -> Option<ReleaseType> {
        ReleaseType::combine(self.releases.iter().map(|(_, t)| *t))
    }

    pub fn package_names(&self) -> Vec<&str> {
        self.releases.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Renders the changeset file contents.
    pub fn render(&self) -> Result<String> {
        let mut mapping = serde_yaml::Mapping::new();
        for (name, release_type) in &self.releases {
            mapping.insert(
                serde_yaml::Value::String(name.clone()),
                serde_yaml::Value::String(release_type.as_str().to_string()),
            );
        }
        let frontmatter = serde_yaml::to_string(&mapping)?;

        let mut out = String::new();
        out.push_str(FRONTMATTER_DELIMITER);
        out.push('\n');
        out.push_str(&frontmatter);
        if !frontmatter.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(FRONTMATTER_DELIMITER);
        out.push_str("\n\n");
        out.push_str(&self.message);
        out.push('\n');
        Ok(out)
    }

    /// Parses changeset file contents.
    pub fn parse(text: &str) -> Result<Self> {
        let rest = text
            .strip_prefix(FRONTMATTER_DELIMITER)
            .and_then(|r| r.strip_prefix('\n'))
            .ok_or_else(|| Error::Manifest("changeset has no frontmatter".to_string()))?;
        let end = rest
            .find("\n---")
            .ok_or_else(|| Error::Manifest("changeset frontmatter is not closed".to_string()))?;

        let mapping: serde_yaml::Mapping = serde_yaml::from_str(&rest[..end])?;
        let mut releases = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let name = key
                .as_str()
                .ok_or_else(|| Error::Manifest("package name must be a string".to_string()))?;
            let release_type = value
                .as_str()
                .ok_or_else(|| Error::Manifest(format!("release type missing for {}", name)))?
                .parse::<ReleaseType>()?;
            releases.push((name.to_string(), release_type));
        }

        let message = rest[end + 1 + FRONTMATTER_DELIMITER.len()..]
            .trim()
            .to_string();

        Ok(Self { releases, message })
    }

    /// Unique file name for this changeset.
    pub fn file_name(&self) -> String {
        let release_type = self.release_type().unwrap_or_default();
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("release-{}-{}.md", release_type, &id[..8])
    }

    /// Writes the changeset under `directory` inside `checkout`.
    ///
    /// Returns the path of the new file relative to `checkout`.
    pub fn write(&self, checkout: &Path, directory: &Path) -> Result<PathBuf> {
        if self.releases.is_empty() {
            return Err(Error::Manifest("changeset names no packages".to_string()));
        }

        let dir = checkout.join(directory);
        std::fs::create_dir_all(&dir)?;

        let relative = directory.join(self.file_name());
        let contents = self.render()?;
        std::fs::write(checkout.join(&relative), contents)?;

        tracing::info!(path = ?relative, packages = ?self.package_names(), "wrote changeset");
        Ok(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn decision(release_type: ReleaseType, message: &str) -> ReleaseDecision {
        ReleaseDecision {
            release_type,
            message: message.to_string(),
        }
    }

    #[test]
    fn renders_frontmatter_then_message() {
        let changeset = Changeset::new(
            &["@acme/auth".to_string()],
            &decision(ReleaseType::Minor, "Add OAuth support\n"),
        );
        let text = changeset.render().unwrap();

        assert!(text.starts_with("---\n"));
        assert!(text.contains("'@acme/auth': minor") || text.contains("\"@acme/auth\": minor"));
        assert!(text.ends_with("---\n\nAdd OAuth support\n"));
    }

    #[test]
    fn parse_reads_rendered_changeset() {
        let changeset = Changeset::new(
            &["core".to_string(), "cli".to_string()],
            &decision(ReleaseType::Patch, "Fix token refresh"),
        );
        let parsed = Changeset::parse(&changeset.render().unwrap()).unwrap();

        assert_eq!(parsed, changeset);
        assert_eq!(parsed.package_names(), vec!["core", "cli"]);
    }

    #[test]
    fn parse_handles_mixed_release_types() {
        let parsed =
            Changeset::parse("---\nalpha: patch\nbeta: major\n---\n\nBreaking API change\n")
                .unwrap();
        assert_eq!(parsed.release_type(), Some(ReleaseType::Major));
        assert_eq!(parsed.message, "Breaking API change");
    }

    #[test]
    fn parse_rejects_missing_frontmatter() {
        assert!(Changeset::parse("just a note").is_err());
        assert!(Changeset::parse("---\nalpha: patch\n").is_err());
        assert!(Changeset::parse("---\nalpha: huge\n---\n\nx\n").is_err());
    }

    #[test]
    fn file_names_are_unique() {
        let changeset = Changeset::new(&["a".to_string()], &decision(ReleaseType::Minor, "m"));
        let first = changeset.file_name();
        assert!(first.starts_with("release-minor-"));
        assert!(first.ends_with(".md"));
        assert_ne!(first, changeset.file_name());
    }

    #[test]
    fn write_places_file_under_directory() {
        let checkout = TempDir::new().unwrap();
        let changeset = Changeset::new(&["a".to_string()], &decision(ReleaseType::Minor, "m"));

        let relative = changeset
            .write(checkout.path(), Path::new(".changeset"))
            .unwrap();

        assert!(relative.starts_with(".changeset"));
        assert!(relative.is_relative());
        let written = std::fs::read_to_string(checkout.path().join(&relative)).unwrap();
        assert_eq!(Changeset::parse(&written).unwrap(), changeset);
    }

    #[test]
    fn write_requires_a_package() {
        let checkout = TempDir::new().unwrap();
        let changeset = Changeset::new(&[], &decision(ReleaseType::Patch, "m"));
        assert!(changeset.write(checkout.path(), Path::new(".changeset")).is_err());
    }
}
