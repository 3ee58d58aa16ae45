use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    pub descriptor: &'static str,
}

pub const BUILTIN_PRESETS: &[Preset] = &[
    Preset {
        name: "minimal",
        description: "Package set only, with a git shell on Linux and macOS",
        descriptor: r#"descriptor_version = 1
description = "Minimal development shell"

[inputs]
nixpkgs = "github:NixOS/nixpkgs/nixos-unstable"

[shells.x86_64-linux]
packages = ["git"]

[shells.aarch64-darwin]
packages = ["git"]
"#,
    },
    Preset {
        name: "rust",
        description: "Stable Rust toolchain from fenix with cargo-release",
        descriptor: r#"descriptor_version = 1
description = "Rust development shell"

[inputs]
nixpkgs = "github:NixOS/nixpkgs/nixos-unstable"

[inputs.fenix]
url = "github:nix-community/fenix"
follows = { nixpkgs = "nixpkgs" }

[[overlays]]
input = "fenix"

[shells.x86_64-linux]
packages = ["toolchain", "cargo-release"]

[shells.aarch64-linux]
packages = ["toolchain", "cargo-release"]

[shells.aarch64-darwin]
packages = ["toolchain", "cargo-release"]
"#,
    },
    Preset {
        name: "rust-nightly",
        description: "Nightly Rust toolchain with OpenSSL for crates that link it",
        descriptor: r#"descriptor_version = 1
description = "Nightly Rust development shell"

[inputs]
nixpkgs = "github:NixOS/nixpkgs/nixos-unstable"

[inputs.fenix]
url = "github:nix-community/fenix"
follows = { nixpkgs = "nixpkgs" }

[[overlays]]
input = "fenix"

[shells.x86_64-linux]
build_inputs = ["openssl", "pkg-config"]
packages = ["fenix#latest.toolchain", "rust-analyzer", "cargo-release"]

[shells.aarch64-darwin]
build_inputs = ["openssl", "pkg-config", "darwin.apple_sdk.frameworks.Security"]
packages = ["fenix#latest.toolchain", "rust-analyzer", "cargo-release"]
"#,
    },
];

pub fn get_preset(name: &str) -> Option<&'static Preset> {
    BUILTIN_PRESETS.iter().find(|p| p.name == name)
}

pub fn list_presets() -> &'static [Preset] {
    BUILTIN_PRESETS
}
