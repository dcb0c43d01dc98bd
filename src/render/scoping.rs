//! Validated Java package names
//!
//! Generated configuration classes are placed in a package chosen by the
//! user. The package is validated once, when configuration is loaded, so the
//! materializer can rely on a well-formed `lowercase.separated` name.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Package validation errors with actionable messages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NamespaceError {
    #[error("Package segment cannot be empty")]
    EmptySegment,

    #[error("Package segment must start with a letter or underscore, got '{0}'")]
    InvalidStart(char),

    #[error("Package segment contains invalid character: '{0}'")]
    InvalidChar(char),

    #[error("Java package must be lowercase: '{0}' (suggestion: '{1}')")]
    JavaNotLowercase(String, String),

    #[error("'{0}' is a reserved word in Java")]
    ReservedWord(String),
}

/// Java package (lowercase.separated)
///
/// Example: "com.acme.config"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "String", into = "String")]
#[schemars(with = "String")]
pub struct JavaPackage {
    segments: Vec<String>,
}

impl JavaPackage {
    /// Create a new Java package from segments
    pub fn new(segments: Vec<String>) -> Result<Self, NamespaceError> {
        if segments.is_empty() {
            return Err(NamespaceError::EmptySegment);
        }
        for seg in &segments {
            validate_segment(seg)?;
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Dotted form, as written in a `package` declaration
    pub fn render(&self) -> String {
        self.segments.join(".")
    }

    /// Relative source path of a top-level type in this package
    pub fn source_path(&self, class_name: &str) -> String {
        format!("{}/{}.java", self.segments.join("/"), class_name)
    }

    /// Fully qualified name of a type in this package
    pub fn qualify(&self, class_name: &str) -> String {
        format!("{}.{}", self.render(), class_name)
    }
}

impl TryFrom<String> for JavaPackage {
    type Error = NamespaceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            return Err(NamespaceError::EmptySegment);
        }
        Self::new(s.split('.').map(String::from).collect())
    }
}

impl TryFrom<&str> for JavaPackage {
    type Error = NamespaceError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::try_from(s.to_string())
    }
}

impl From<JavaPackage> for String {
    fn from(pkg: JavaPackage) -> Self {
        pkg.render()
    }
}

impl fmt::Display for JavaPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

fn validate_segment(seg: &str) -> Result<(), NamespaceError> {
    let Some(first_char) = seg.chars().next() else {
        return Err(NamespaceError::EmptySegment);
    };
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(NamespaceError::InvalidStart(first_char));
    }

    if let Some(c) = seg.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(NamespaceError::InvalidChar(c));
    }

    if seg != seg.to_lowercase() {
        return Err(NamespaceError::JavaNotLowercase(
            seg.to_string(),
            seg.to_lowercase(),
        ));
    }

    if !crate::scope::is_identifier(seg) {
        return Err(NamespaceError::ReservedWord(seg.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_java_package_valid() {
        let pkg = JavaPackage::try_from("com.acme.config").unwrap();
        assert_eq!(pkg.segments(), &["com", "acme", "config"]);
        assert_eq!(pkg.render(), "com.acme.config");
        assert_eq!(pkg.source_path("AppConfig"), "com/acme/config/AppConfig.java");
        assert_eq!(pkg.qualify("AppConfig"), "com.acme.config.AppConfig");
    }

    #[test]
    fn test_java_package_uppercase_rejected() {
        let result = JavaPackage::try_from("com.Acme.config");
        assert!(matches!(result, Err(NamespaceError::JavaNotLowercase(_, _))));
    }

    #[test]
    fn test_java_package_reserved_word_rejected() {
        let result = JavaPackage::try_from("com.new.config");
        assert!(matches!(result, Err(NamespaceError::ReservedWord(_))));
    }

    #[test]
    fn test_java_package_empty_segment_rejected() {
        assert_eq!(
            JavaPackage::try_from("com..acme"),
            Err(NamespaceError::EmptySegment)
        );
    }
}
