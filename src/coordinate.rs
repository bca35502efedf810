//! Artifact coordinates and the names derived from them.
//!
//! Coordinates use the repository syntax
//! `group:name[:extension[:classifier]]:version`. The extension defaults
//! to `jar`.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{AssemblyError, Result};

pub const DEFAULT_EXTENSION: &str = "jar";

/// Classifier carried by runtime and profile distributions.
pub const DISTRIBUTION_CLASSIFIER: &str = "bin";

/// Extension carried by runtime and profile distributions.
pub const DISTRIBUTION_EXTENSION: &str = "zip";

/// Identifies one resolvable file in a package repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactCoordinate {
    group: String,
    name: String,
    extension: String,
    classifier: Option<String>,
    version: String,
}

impl ArtifactCoordinate {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        extension: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            extension: extension.into(),
            classifier: None,
            version: version.into(),
        }
    }

    /// A `bin`-classified zip, the shape of runtime and profile packages.
    pub fn distribution(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::new(group, name, DISTRIBUTION_EXTENSION, version)
            .with_classifier(DISTRIBUTION_CLASSIFIER)
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        let classifier = classifier.into();
        self.classifier = if classifier.is_empty() {
            None
        } else {
            Some(classifier)
        };
        self
    }

    /// Parse `group:name[:extension[:classifier]]:version`.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.trim().split(':').collect();
        let coordinate = match parts.as_slice() {
            [group, name, version] => Self::new(*group, *name, DEFAULT_EXTENSION, *version),
            [group, name, extension, version] => Self::new(*group, *name, *extension, *version),
            [group, name, extension, classifier, version] => {
                Self::new(*group, *name, *extension, *version).with_classifier(*classifier)
            }
            _ => {
                return Err(AssemblyError::config(format!(
                    "invalid artifact coordinate '{}': expected group:name[:extension[:classifier]]:version",
                    raw
                )))
            }
        };
        coordinate.validate_as(raw)?;
        Ok(coordinate)
    }

    /// Reject empty fields and fields that would escape a directory once
    /// turned into a file name or repository path.
    pub(crate) fn validate(&self) -> Result<()> {
        self.validate_as(&self.to_string())
    }

    fn validate_as(&self, raw: &str) -> Result<()> {
        let mut fields = vec![
            ("group", self.group.as_str()),
            ("name", self.name.as_str()),
            ("extension", self.extension.as_str()),
            ("version", self.version.as_str()),
        ];
        if let Some(classifier) = &self.classifier {
            fields.push(("classifier", classifier.as_str()));
        }
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(AssemblyError::config(format!(
                    "invalid artifact coordinate '{}': empty {}",
                    raw, field
                )));
            }
            if value.contains('/')
                || value.contains('\\')
                || value.split('.').all(str::is_empty)
            {
                return Err(AssemblyError::config(format!(
                    "invalid artifact coordinate '{}': {} must not contain path separators",
                    raw, field
                )));
            }
        }
        Ok(())
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `<name>-<version>[-<classifier>].<extension>`
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.name, self.version, classifier, self.extension
            ),
            None => format!("{}-{}.{}", self.name, self.version, self.extension),
        }
    }

    /// File name an installed extension carries, computable without resolving.
    pub fn exclusion_file_name(&self) -> String {
        format!("{}-{}.jar", self.name, self.version)
    }

    /// Path of the artifact relative to a repository root.
    pub fn repository_path(&self) -> PathBuf {
        let mut path: PathBuf = self.group.split('.').collect();
        path.push(&self.name);
        path.push(&self.version);
        path.push(self.file_name());
        path
    }

    /// Same path as [`Self::repository_path`] with `/` separators, for URLs.
    pub fn repository_url_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.name,
            self.version,
            self.file_name()
        )
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.extension)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        write!(f, ":{}", self.version)
    }
}

/// Shape a table-form declaration takes when it names no extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredKind {
    /// Plain `jar` library.
    Library,
    /// `bin`-classified zip distribution.
    Distribution,
}

/// An artifact as written in a plan file: coordinate string or table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ArtifactDecl {
    Coordinate(String),
    Table(ArtifactTable),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactTable {
    pub group: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub extension: Option<String>,
}

impl ArtifactDecl {
    pub fn to_coordinate(&self, kind: DeclaredKind) -> Result<ArtifactCoordinate> {
        match self {
            ArtifactDecl::Coordinate(raw) => ArtifactCoordinate::parse(raw),
            ArtifactDecl::Table(table) => table.to_coordinate(kind),
        }
    }
}

impl ArtifactTable {
    pub fn to_coordinate(&self, kind: DeclaredKind) -> Result<ArtifactCoordinate> {
        let group = required_field(&self.group, "group")?;
        let name = required_field(&self.name, "name")?;
        let version = required_field(&self.version, "version")?;

        let coordinate = match (kind, &self.extension) {
            (DeclaredKind::Distribution, _) => {
                ArtifactCoordinate::distribution(group, name, version)
            }
            (DeclaredKind::Library, Some(extension)) => {
                ArtifactCoordinate::new(group, name, extension.as_str(), version)
            }
            (DeclaredKind::Library, None) => {
                ArtifactCoordinate::new(group, name, DEFAULT_EXTENSION, version)
            }
        };
        coordinate.validate()?;
        Ok(coordinate)
    }
}

fn required_field<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AssemblyError::config(format!(
            "a {} must be specified on an artifact definition",
            field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn parse_defaults_extension_to_jar() {
        let c = ArtifactCoordinate::parse("org.example:ext:1.2").unwrap();
        assert_eq!(c.extension(), "jar");
        assert_eq!(c.classifier(), None);
        assert_eq!(c.file_name(), "ext-1.2.jar");
    }

    #[test]
    fn parse_full_form_with_classifier() {
        let c = ArtifactCoordinate::parse("org.example:runtime:zip:bin:3.0").unwrap();
        assert_eq!(c.classifier(), Some("bin"));
        assert_eq!(c.file_name(), "runtime-3.0-bin.zip");
        assert_eq!(c.to_string(), "org.example:runtime:zip:bin:3.0");
    }

    #[test]
    fn validate_rejects_constructed_escapes() {
        assert!(ArtifactCoordinate::new("g", "../x", "jar", "1").validate().is_err());
        assert!(ArtifactCoordinate::new("g", "a", "jar", "..").validate().is_err());
        assert!(ArtifactCoordinate::new("", "", "", "").validate().is_err());
        assert!(ArtifactCoordinate::new("g", "a", "jar", "1")
            .with_classifier("x/y")
            .validate()
            .is_err());
        assert!(ArtifactCoordinate::distribution("org.example", "a", "1.0")
            .validate()
            .is_ok());
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(ArtifactCoordinate::parse("just-a-name").unwrap_err().is_configuration());
        assert!(ArtifactCoordinate::parse("g::1.0").is_err());
        assert!(ArtifactCoordinate::parse("a:b:c:d:e:f").is_err());
        assert!(ArtifactCoordinate::parse("g:../x:1.0").is_err());
    }

    #[test]
    fn repository_path_follows_maven_layout() {
        let c = ArtifactCoordinate::parse("org.codehaus.fabric3:node:2.0").unwrap();
        assert_eq!(
            c.repository_path(),
            PathBuf::from("org/codehaus/fabric3/node/2.0/node-2.0.jar")
        );
        assert_eq!(
            c.repository_url_path(),
            "org/codehaus/fabric3/node/2.0/node-2.0.jar"
        );
    }

    #[test]
    fn exclusion_name_ignores_extension_and_classifier() {
        let c = ArtifactCoordinate::parse("g:thing:zip:bin:1.0").unwrap();
        assert_eq!(c.exclusion_file_name(), "thing-1.0.jar");
    }

    #[test]
    fn equal_coordinates_collapse_in_sets() {
        let mut set = BTreeSet::new();
        set.insert(ArtifactCoordinate::parse("g:a:1.0").unwrap());
        set.insert(ArtifactCoordinate::parse("g:a:jar:1.0").unwrap());
        set.insert(ArtifactCoordinate::parse("g:a:1.1").unwrap());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn table_form_uses_kind_defaults() {
        let table = ArtifactTable {
            group: Some("g".into()),
            name: Some("p".into()),
            version: Some("1.0".into()),
            extension: None,
        };
        let profile = table.to_coordinate(DeclaredKind::Distribution).unwrap();
        assert_eq!(profile.file_name(), "p-1.0-bin.zip");

        let library = table.to_coordinate(DeclaredKind::Library).unwrap();
        assert_eq!(library.file_name(), "p-1.0.jar");
    }

    #[test]
    fn table_form_honours_explicit_extension() {
        let table = ArtifactTable {
            group: Some("g".into()),
            name: Some("web".into()),
            version: Some("1.0".into()),
            extension: Some("war".into()),
        };
        let c = table.to_coordinate(DeclaredKind::Library).unwrap();
        assert_eq!(c.file_name(), "web-1.0.war");
    }

    #[test]
    fn table_form_requires_fields() {
        let table = ArtifactTable {
            group: Some("g".into()),
            name: None,
            version: Some("1.0".into()),
            extension: None,
        };
        let err = table.to_coordinate(DeclaredKind::Library).unwrap_err();
        assert!(err.to_string().contains("a name must be specified"));
    }
}
