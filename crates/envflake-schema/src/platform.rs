//! Target platform identifiers a shell may be declared for.

use crate::descriptor::DescriptorError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    X86_64Linux,
    Aarch64Linux,
    I686Linux,
    Riscv64Linux,
    X86_64Darwin,
    Aarch64Darwin,
}

pub const SUPPORTED_PLATFORMS: &[Platform] = &[
    Platform::X86_64Linux,
    Platform::Aarch64Linux,
    Platform::I686Linux,
    Platform::Riscv64Linux,
    Platform::X86_64Darwin,
    Platform::Aarch64Darwin,
];

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_64Linux => "x86_64-linux",
            Self::Aarch64Linux => "aarch64-linux",
            Self::I686Linux => "i686-linux",
            Self::Riscv64Linux => "riscv64-linux",
            Self::X86_64Darwin => "x86_64-darwin",
            Self::Aarch64Darwin => "aarch64-darwin",
        }
    }

    /// The platform of the running host, if it is one we support.
    pub fn host() -> Option<Self> {
        Self::from_parts(std::env::consts::ARCH, std::env::consts::OS)
    }

    fn from_parts(arch: &str, os: &str) -> Option<Self> {
        match (arch, os) {
            ("x86_64", "linux") => Some(Self::X86_64Linux),
            ("aarch64", "linux") => Some(Self::Aarch64Linux),
            ("x86", "linux") => Some(Self::I686Linux),
            ("riscv64", "linux") => Some(Self::Riscv64Linux),
            ("x86_64", "macos") => Some(Self::X86_64Darwin),
            ("aarch64", "macos") => Some(Self::Aarch64Darwin),
            _ => None,
        }
    }
}

pub(crate) fn supported_list() -> String {
    SUPPORTED_PLATFORMS
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for Platform {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SUPPORTED_PLATFORMS
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DescriptorError::UnknownPlatform(s.to_owned()))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Platform {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
