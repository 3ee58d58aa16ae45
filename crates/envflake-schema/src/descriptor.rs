use crate::locator::{LocatorError, SourceLocator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse descriptor: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported descriptor_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("invalid input name '{0}': must start with a letter and contain only letters, digits, '-' or '_'")]
    InvalidInputName(String),
    #[error("invalid locator for input '{input}': {source}")]
    InvalidLocator {
        input: String,
        #[source]
        source: LocatorError,
    },
    #[error("invalid revision for input '{input}': '{rev}' (expected 40 hex characters)")]
    InvalidRevision { input: String, rev: String },
    #[error("input '{input}' pins '{locator_rev}' in its locator but '{field_rev}' in rev")]
    ConflictingRevision {
        input: String,
        locator_rev: String,
        field_rev: String,
    },
    #[error("input '{input}' uses a {kind} locator, which does not take a revision")]
    RevisionUnsupported { input: String, kind: &'static str },
    #[error("invalid sub-input name '{sub_input}' in follows of input '{input}'")]
    InvalidSubInput { input: String, sub_input: String },
    #[error("input '{input}' cannot make '{sub_input}' follow itself")]
    SelfFollow { input: String, sub_input: String },
    #[error("overlay '{input}.{name}' is declared more than once")]
    DuplicateOverlay { input: String, name: String },
    #[error("overlay name must not be empty (input '{0}')")]
    EmptyOverlayName(String),
    #[error("empty package reference in {list} of shell '{platform}'")]
    EmptyPackage { platform: String, list: &'static str },
    #[error("invalid package reference '{reference}' in shell '{platform}'")]
    InvalidPackage { platform: String, reference: String },
    #[error("package '{package}' appears in both build_inputs and packages of shell '{platform}'")]
    OverlappingPackage { platform: String, package: String },
    #[error("input '{input}' referenced by {referrer} is not declared")]
    UnresolvedInput { input: String, referrer: String },
    #[error("'{0}' is not a known platform (expected one of: {list})", list = crate::platform::supported_list())]
    UnknownPlatform(String),
    #[error("no shell declared for '{platform}' (declared: {declared})")]
    PlatformNotDeclared { platform: String, declared: String },
}

/// Coarse classification of a [`DescriptorError`].
///
/// Every loader failure falls into exactly one of these; callers that only
/// care about the category (exit codes, retries upstream) match on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedDescriptor,
    UnresolvedInput,
    UnsupportedPlatform,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MalformedDescriptor => "malformed descriptor",
            Self::UnresolvedInput => "unresolved input",
            Self::UnsupportedPlatform => "unsupported platform",
        })
    }
}

impl DescriptorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnresolvedInput { .. } => ErrorKind::UnresolvedInput,
            Self::UnknownPlatform(_) | Self::PlatformNotDeclared { .. } => {
                ErrorKind::UnsupportedPlatform
            }
            _ => ErrorKind::MalformedDescriptor,
        }
    }
}

/// Raw descriptor document, exactly as written on disk.
///
/// Nothing here is validated beyond TOML structure; call
/// [`DescriptorV1::resolve`] to obtain a checked [`crate::ResolvedDescriptor`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DescriptorV1 {
    pub descriptor_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_set: Option<String>,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overlays: Vec<OverlayDecl>,
    #[serde(default)]
    pub shells: BTreeMap<String, ShellDecl>,
}

/// An input is either a bare locator string or a table with extra options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum InputDecl {
    Locator(String),
    Detailed(InputTable),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InputTable {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub follows: BTreeMap<String, String>,
}

impl InputDecl {
    pub fn url(&self) -> &str {
        match self {
            Self::Locator(url) => url,
            Self::Detailed(table) => &table.url,
        }
    }

    pub fn rev(&self) -> Option<&str> {
        match self {
            Self::Locator(_) => None,
            Self::Detailed(table) => table.rev.as_deref(),
        }
    }

    pub fn follows(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Locator(_) => None,
            Self::Detailed(table) => Some(&table.follows),
        }
    }

    /// Set the pinned revision, promoting a bare locator to table form.
    ///
    /// A revision already embedded in the locator is stripped from it, so the
    /// new `rev` field is the only one left.
    pub fn set_rev(&mut self, rev: impl Into<String>) {
        let url = strip_locator_rev(self.url());
        let follows = match self {
            Self::Locator(_) => BTreeMap::new(),
            Self::Detailed(table) => std::mem::take(&mut table.follows),
        };
        *self = Self::Detailed(InputTable {
            url,
            rev: Some(rev.into()),
            follows,
        });
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OverlayDecl {
    pub input: String,
    #[serde(default = "default_overlay_name")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShellDecl {
    #[serde(default, alias = "buildInputs")]
    pub build_inputs: Vec<String>,
    #[serde(default)]
    pub packages: Vec<String>,
}

/// Unparseable locators are kept as written; resolving reports them later.
fn strip_locator_rev(url: &str) -> String {
    match SourceLocator::parse(url) {
        Ok(locator) if locator.rev().is_some() => locator.without_rev().to_string(),
        _ => url.to_owned(),
    }
}

fn default_overlay_name() -> String {
    "default".to_owned()
}

pub fn parse_descriptor_str(input: &str) -> Result<DescriptorV1, DescriptorError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_descriptor_file(path: impl AsRef<Path>) -> Result<DescriptorV1, DescriptorError> {
    let content = fs::read_to_string(path)?;
    parse_descriptor_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_descriptor() {
        let input = r#"
descriptor_version = 1
description = "Rust development shell"
package_set = "nixpkgs"

[inputs]
nixpkgs = "github:NixOS/nixpkgs/nixos-unstable"

[inputs.fenix]
url = "github:nix-community/fenix"
rev = "0123456789abcdef0123456789abcdef01234567"
follows = { nixpkgs = "nixpkgs" }

[[overlays]]
input = "fenix"

[shells.x86_64-linux]
build_inputs = ["openssl"]
packages = ["toolchain", "cargo-release"]
"#;
        let descriptor = parse_descriptor_str(input).expect("should parse");
        assert_eq!(descriptor.descriptor_version, 1);
        assert_eq!(descriptor.inputs.len(), 2);
        assert_eq!(
            descriptor.inputs["nixpkgs"].url(),
            "github:NixOS/nixpkgs/nixos-unstable"
        );
        assert_eq!(
            descriptor.inputs["fenix"].rev(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
        assert_eq!(descriptor.overlays[0].name, "default");
        assert_eq!(descriptor.shells["x86_64-linux"].packages.len(), 2);
    }

    #[test]
    fn parses_minimal_descriptor() {
        let descriptor = parse_descriptor_str("descriptor_version = 1\n").expect("should parse");
        assert!(descriptor.inputs.is_empty());
        assert!(descriptor.overlays.is_empty());
        assert!(descriptor.shells.is_empty());
    }

    #[test]
    fn accepts_camel_case_build_inputs() {
        let input = r#"
descriptor_version = 1
[shells.x86_64-linux]
buildInputs = ["openssl"]
"#;
        let descriptor = parse_descriptor_str(input).unwrap();
        assert_eq!(descriptor.shells["x86_64-linux"].build_inputs, vec!["openssl"]);
    }

    #[test]
    fn rejects_unknown_fields() {
        let input = r#"
descriptor_version = 1
[shells.x86_64-linux]
packages = []
unknown_field = true
"#;
        assert!(parse_descriptor_str(input).is_err());
    }

    #[test]
    fn rejects_unknown_input_table_fields() {
        let input = r#"
descriptor_version = 1
[inputs.nixpkgs]
url = "github:NixOS/nixpkgs"
branch = "main"
"#;
        assert!(parse_descriptor_str(input).is_err());
    }

    #[test]
    fn rejects_duplicate_input_names() {
        let input = r#"
descriptor_version = 1
[inputs]
nixpkgs = "github:NixOS/nixpkgs"
nixpkgs = "github:NixOS/nixpkgs/nixos-24.05"
"#;
        let err = parse_descriptor_str(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDescriptor);
    }

    #[test]
    fn rejects_missing_version() {
        let input = r#"
[inputs]
nixpkgs = "github:NixOS/nixpkgs"
"#;
        assert!(parse_descriptor_str(input).is_err());
    }

    #[test]
    fn set_rev_promotes_bare_locator() {
        let mut decl = InputDecl::Locator("github:NixOS/nixpkgs".to_owned());
        decl.set_rev("a".repeat(40));
        assert_eq!(decl.url(), "github:NixOS/nixpkgs");
        assert_eq!(decl.rev(), Some("a".repeat(40).as_str()));
    }

    #[test]
    fn set_rev_replaces_revision_embedded_in_locator() {
        let mut decl = InputDecl::Locator(format!("github:NixOS/nixpkgs/{}", "a".repeat(40)));
        decl.set_rev("b".repeat(40));
        assert_eq!(decl.url(), "github:NixOS/nixpkgs");
        assert_eq!(decl.rev(), Some("b".repeat(40).as_str()));

        let mut decl = InputDecl::Detailed(InputTable {
            url: format!("git+https://example.org/repo.git?ref=main&rev={}", "a".repeat(40)),
            rev: None,
            follows: BTreeMap::from([("nixpkgs".to_owned(), "nixpkgs".to_owned())]),
        });
        decl.set_rev("c".repeat(40));
        assert_eq!(decl.url(), "git+https://example.org/repo.git?ref=main");
        assert_eq!(decl.follows().map(BTreeMap::len), Some(1));
    }

    #[test]
    fn set_rev_keeps_unparseable_locator() {
        let mut decl = InputDecl::Locator("svn://example.org/repo".to_owned());
        decl.set_rev("a".repeat(40));
        assert_eq!(decl.url(), "svn://example.org/repo");
    }

    #[test]
    fn error_kinds_are_classified() {
        let unresolved = DescriptorError::UnresolvedInput {
            input: "fenix".to_owned(),
            referrer: "overlay".to_owned(),
        };
        assert_eq!(unresolved.kind(), ErrorKind::UnresolvedInput);
        assert_eq!(
            DescriptorError::UnknownPlatform("mips-linux".to_owned()).kind(),
            ErrorKind::UnsupportedPlatform
        );
        assert_eq!(
            DescriptorError::UnsupportedVersion(2).kind(),
            ErrorKind::MalformedDescriptor
        );
        assert_eq!(ErrorKind::UnresolvedInput.to_string(), "unresolved input");
    }
}
