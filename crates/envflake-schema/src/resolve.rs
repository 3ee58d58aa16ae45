use crate::descriptor::{
    parse_descriptor_file, parse_descriptor_str, DescriptorError, DescriptorV1, InputDecl,
    ShellDecl,
};
use crate::locator::SourceLocator;
use crate::platform::Platform;
use crate::types::{InputName, Revision};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, trace};

/// Input that unqualified package references resolve against.
pub const DEFAULT_PACKAGE_SET: &str = "nixpkgs";

/// Validated, immutable view of a descriptor.
///
/// Built once by [`DescriptorV1::resolve`] and handed out by reference.
/// Every cross reference (follows, overlays, packages) is known to point at
/// a declared input, and every shell is keyed by a supported platform.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolvedDescriptor {
    descriptor_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    package_set: InputName,
    inputs: BTreeMap<InputName, Input>,
    overlays: Vec<Overlay>,
    shells: BTreeMap<Platform, ShellSpec>,
}

/// A declared external source.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Input {
    pub name: InputName,
    pub locator: SourceLocator,
    /// Sub-input name of this input -> top-level input it should reuse.
    pub follows: BTreeMap<String, InputName>,
}

impl Input {
    pub fn rev(&self) -> Option<&Revision> {
        self.locator.rev()
    }

    pub fn is_pinned(&self) -> bool {
        self.locator.is_pinned()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Overlay {
    pub input: InputName,
    pub name: String,
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.input, self.name)
    }
}

/// A package attribute taken from a specific input.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageRef {
    pub input: InputName,
    pub attr: String,
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.input, self.attr)
    }
}

/// Packages exposed by the dev shell of one platform.
///
/// `library` holds build inputs, `tooling` holds the tools put on `PATH`.
/// The two lists are disjoint and keep declaration order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShellSpec {
    pub platform: Platform,
    pub library: Vec<PackageRef>,
    pub tooling: Vec<PackageRef>,
}

impl ShellSpec {
    pub fn is_empty(&self) -> bool {
        self.library.is_empty() && self.tooling.is_empty()
    }

    /// Inputs this shell pulls packages from.
    pub fn inputs_used(&self) -> BTreeSet<&InputName> {
        self.library
            .iter()
            .chain(&self.tooling)
            .map(|p| &p.input)
            .collect()
    }
}

impl ResolvedDescriptor {
    pub fn descriptor_version(&self) -> u32 {
        self.descriptor_version
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn package_set(&self) -> &InputName {
        &self.package_set
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Input> {
        self.inputs.values()
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.get(name)
    }

    pub fn locator(&self, name: &str) -> Option<&SourceLocator> {
        self.input(name).map(|i| &i.locator)
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.shells.keys().copied()
    }

    pub fn shells(&self) -> impl Iterator<Item = &ShellSpec> {
        self.shells.values()
    }

    /// Shell declared for `platform`, or `PlatformNotDeclared`.
    pub fn shell(&self, platform: Platform) -> Result<&ShellSpec, DescriptorError> {
        self.shells
            .get(&platform)
            .ok_or_else(|| DescriptorError::PlatformNotDeclared {
                platform: platform.to_string(),
                declared: self.declared_platforms(),
            })
    }

    /// Like [`Self::shell`] but takes the platform as text, so unknown
    /// identifiers are reported as unsupported too.
    pub fn shell_for(&self, platform: &str) -> Result<&ShellSpec, DescriptorError> {
        self.shell(platform.parse()?)
    }

    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn declared_platforms(&self) -> String {
        if self.shells.is_empty() {
            return "none".to_owned();
        }
        self.platforms()
            .map(Platform::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl DescriptorV1 {
    /// Validate every field and cross reference, producing the resolved form.
    ///
    /// Validation stops at the first violation.
    pub fn resolve(&self) -> Result<ResolvedDescriptor, DescriptorError> {
        if self.descriptor_version != 1 {
            return Err(DescriptorError::UnsupportedVersion(self.descriptor_version));
        }

        let mut inputs = BTreeMap::new();
        for (name, decl) in &self.inputs {
            let input = resolve_input(name, decl)?;
            trace!("input {name} -> {}", input.locator);
            inputs.insert(input.name.clone(), input);
        }

        for input in inputs.values() {
            for (sub_input, target) in &input.follows {
                if !inputs.contains_key(target) {
                    return Err(DescriptorError::UnresolvedInput {
                        input: target.to_string(),
                        referrer: format!("follows of input '{}.{sub_input}'", input.name),
                    });
                }
            }
        }

        let package_set = match self.package_set.as_deref().map(str::trim) {
            Some(name) => {
                if !inputs.contains_key(name) {
                    return Err(DescriptorError::UnresolvedInput {
                        input: name.to_owned(),
                        referrer: "package_set".to_owned(),
                    });
                }
                InputName::new(name)
            }
            None => InputName::new(DEFAULT_PACKAGE_SET),
        };

        let mut overlays: Vec<Overlay> = Vec::with_capacity(self.overlays.len());
        for decl in &self.overlays {
            let input = decl.input.trim();
            if !inputs.contains_key(input) {
                return Err(DescriptorError::UnresolvedInput {
                    input: input.to_owned(),
                    referrer: "overlays".to_owned(),
                });
            }
            let name = decl.name.trim();
            if name.is_empty() {
                return Err(DescriptorError::EmptyOverlayName(input.to_owned()));
            }
            let overlay = Overlay {
                input: InputName::new(input),
                name: name.to_owned(),
            };
            if overlays.contains(&overlay) {
                return Err(DescriptorError::DuplicateOverlay {
                    input: input.to_owned(),
                    name: name.to_owned(),
                });
            }
            overlays.push(overlay);
        }

        let mut shells = BTreeMap::new();
        for (key, decl) in &self.shells {
            let platform: Platform = key.parse()?;
            let shell = resolve_shell(platform, decl, &package_set, &inputs)?;
            debug!(
                "shell {platform}: {} library, {} tooling",
                shell.library.len(),
                shell.tooling.len()
            );
            shells.insert(platform, shell);
        }

        Ok(ResolvedDescriptor {
            descriptor_version: self.descriptor_version,
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_owned),
            package_set,
            inputs,
            overlays,
            shells,
        })
    }
}

fn resolve_input(name: &str, decl: &InputDecl) -> Result<Input, DescriptorError> {
    if !InputName::is_valid(name) {
        return Err(DescriptorError::InvalidInputName(name.to_owned()));
    }

    let mut locator =
        SourceLocator::parse(decl.url()).map_err(|source| DescriptorError::InvalidLocator {
            input: name.to_owned(),
            source,
        })?;

    if let Some(raw) = decl.rev().map(str::trim) {
        if !locator.supports_rev() {
            return Err(DescriptorError::RevisionUnsupported {
                input: name.to_owned(),
                kind: locator.kind(),
            });
        }
        if !Revision::looks_like_rev(raw) {
            return Err(DescriptorError::InvalidRevision {
                input: name.to_owned(),
                rev: raw.to_owned(),
            });
        }
        let field_rev = Revision::new(raw.to_ascii_lowercase());
        if let Some(locator_rev) = locator.rev() {
            if *locator_rev != field_rev {
                return Err(DescriptorError::ConflictingRevision {
                    input: name.to_owned(),
                    locator_rev: locator_rev.to_string(),
                    field_rev: field_rev.into_inner(),
                });
            }
        }
        locator = pin_keeping_ref(&locator, field_rev);
    }

    let mut follows = BTreeMap::new();
    for (sub_input, target) in decl.follows().into_iter().flatten() {
        let sub_input = sub_input.trim();
        if !InputName::is_valid(sub_input) {
            return Err(DescriptorError::InvalidSubInput {
                input: name.to_owned(),
                sub_input: sub_input.to_owned(),
            });
        }
        let target = target.trim();
        if target == name {
            return Err(DescriptorError::SelfFollow {
                input: name.to_owned(),
                sub_input: sub_input.to_owned(),
            });
        }
        follows.insert(sub_input.to_owned(), InputName::new(target));
    }

    Ok(Input {
        name: InputName::new(name),
        locator,
        follows,
    })
}

/// A `rev` field on a hosted locator keeps the declared branch visible in
/// the resolved form; only an inline rev segment replaces it.
fn pin_keeping_ref(locator: &SourceLocator, rev: Revision) -> SourceLocator {
    match locator {
        SourceLocator::Hosted {
            forge,
            owner,
            repo,
            reference,
            ..
        } => SourceLocator::Hosted {
            forge: *forge,
            owner: owner.clone(),
            repo: repo.clone(),
            reference: reference.clone(),
            rev: Some(rev),
        },
        other => other.with_rev(rev),
    }
}

fn resolve_shell(
    platform: Platform,
    decl: &ShellDecl,
    package_set: &InputName,
    inputs: &BTreeMap<InputName, Input>,
) -> Result<ShellSpec, DescriptorError> {
    let library = resolve_package_list(
        platform,
        "build_inputs",
        &decl.build_inputs,
        package_set,
        inputs,
    )?;
    let tooling =
        resolve_package_list(platform, "packages", &decl.packages, package_set, inputs)?;

    if let Some(overlap) = library.iter().find(|p| tooling.contains(p)) {
        return Err(DescriptorError::OverlappingPackage {
            platform: platform.to_string(),
            package: overlap.to_string(),
        });
    }

    Ok(ShellSpec {
        platform,
        library,
        tooling,
    })
}

fn resolve_package_list(
    platform: Platform,
    list: &'static str,
    raw: &[String],
    package_set: &InputName,
    inputs: &BTreeMap<InputName, Input>,
) -> Result<Vec<PackageRef>, DescriptorError> {
    let mut out: Vec<PackageRef> = Vec::with_capacity(raw.len());
    for reference in raw {
        let package = parse_package_ref(platform, list, reference, package_set)?;
        if !inputs.contains_key(&package.input) {
            return Err(DescriptorError::UnresolvedInput {
                input: package.input.to_string(),
                referrer: format!("package '{}' in shell '{platform}'", reference.trim()),
            });
        }
        if out.contains(&package) {
            debug!("shell {platform}: dropping duplicate {list} entry {package}");
            continue;
        }
        out.push(package);
    }
    Ok(out)
}

fn parse_package_ref(
    platform: Platform,
    list: &'static str,
    raw: &str,
    package_set: &InputName,
) -> Result<PackageRef, DescriptorError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DescriptorError::EmptyPackage {
            platform: platform.to_string(),
            list,
        });
    }

    let invalid = || DescriptorError::InvalidPackage {
        platform: platform.to_string(),
        reference: trimmed.to_owned(),
    };

    let (input, attr) = match trimmed.split_once('#') {
        Some((input, attr)) => {
            if !InputName::is_valid(input) {
                return Err(invalid());
            }
            (InputName::new(input), attr)
        }
        None => (package_set.clone(), trimmed),
    };

    if attr.is_empty()
        || attr.contains('#')
        || attr.chars().any(char::is_whitespace)
        || attr.starts_with('.')
        || attr.ends_with('.')
    {
        return Err(invalid());
    }

    Ok(PackageRef {
        input,
        attr: attr.to_owned(),
    })
}

/// Parse and resolve descriptor text in one step.
pub fn load_descriptor_str(input: &str) -> Result<ResolvedDescriptor, DescriptorError> {
    parse_descriptor_str(input)?.resolve()
}

/// Read, parse and resolve a descriptor file.
pub fn load_descriptor_file(path: impl AsRef<Path>) -> Result<ResolvedDescriptor, DescriptorError> {
    let path = path.as_ref();
    debug!("loading descriptor {}", path.display());
    parse_descriptor_file(path)?.resolve()
}
