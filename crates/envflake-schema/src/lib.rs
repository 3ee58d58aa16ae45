//! Descriptor loading, validation, identity, and lock files for envflake.
//!
//! This crate is the descriptor loader: TOML parsing into the raw document
//! (`DescriptorV1`), validation and cross-reference resolution into an
//! immutable `ResolvedDescriptor`, deterministic identity computation
//! (`compute_descriptor_id`), lock file generation/verification (`LockFile`),
//! and built-in preset descriptors.

pub mod descriptor;
pub mod identity;
pub mod locator;
pub mod lock;
pub mod platform;
pub mod preset;
pub mod resolve;
pub mod types;

pub use descriptor::{
    parse_descriptor_file, parse_descriptor_str, DescriptorError, DescriptorV1, ErrorKind,
    InputDecl, InputTable, OverlayDecl, ShellDecl,
};
pub use identity::{compute_descriptor_id, DescriptorIdentity};
pub use locator::{Forge, LocatorError, SourceLocator};
pub use lock::{LockError, LockFile, LockedInput, LOCK_VERSION};
pub use platform::{Platform, SUPPORTED_PLATFORMS};
pub use preset::{get_preset, list_presets, Preset, BUILTIN_PRESETS};
pub use resolve::{
    load_descriptor_file, load_descriptor_str, Input, Overlay, PackageRef, ResolvedDescriptor,
    ShellSpec, DEFAULT_PACKAGE_SET,
};
pub use types::{DescriptorId, InputName, Revision, ShortId};
