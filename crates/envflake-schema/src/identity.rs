use crate::resolve::ResolvedDescriptor;
use crate::types::{DescriptorId, ShortId};
use serde::Serialize;

/// Deterministic identity of a resolved descriptor.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DescriptorIdentity {
    pub descriptor_id: DescriptorId,
    pub short_id: ShortId,
}

/// Compute the identity of a resolved descriptor.
///
/// Only resolved content is hashed: locators in canonical form, revisions
/// lowercased, package references qualified with their input. Two texts that
/// differ only in formatting, table order or reference spelling
/// (`git` vs `nixpkgs#git`) get the same identity. The description is not
/// part of the identity.
pub fn compute_descriptor_id(descriptor: &ResolvedDescriptor) -> DescriptorIdentity {
    let mut hasher = blake3::Hasher::new();

    hasher.update(format!("version:{}", descriptor.descriptor_version()).as_bytes());
    hasher.update(format!("package_set:{}", descriptor.package_set()).as_bytes());

    // Inputs iterate in name order.
    for input in descriptor.inputs() {
        // The shorthand display of a pinned hosted locator omits its ref, so
        // the revision is hashed on its own.
        let unpinned = input.locator.without_rev();
        hasher.update(format!("input:{}:{unpinned}", input.name).as_bytes());
        if let Some(rev) = input.rev() {
            hasher.update(format!("rev:{}:{rev}", input.name).as_bytes());
        }
        for (sub_input, target) in &input.follows {
            hasher.update(format!("follows:{}:{sub_input}:{target}", input.name).as_bytes());
        }
    }

    // Overlay order is significant.
    for (idx, overlay) in descriptor.overlays().iter().enumerate() {
        hasher.update(format!("overlay:{idx}:{overlay}").as_bytes());
    }

    for shell in descriptor.shells() {
        hasher.update(format!("shell:{}", shell.platform).as_bytes());
        for pkg in &shell.library {
            hasher.update(format!("lib:{pkg}").as_bytes());
        }
        for pkg in &shell.tooling {
            hasher.update(format!("tool:{pkg}").as_bytes());
        }
    }

    let hex = hasher.finalize().to_hex().to_string();
    let short = hex[..12].to_owned();

    DescriptorIdentity {
        descriptor_id: DescriptorId::new(hex),
        short_id: ShortId::new(short),
    }
}
