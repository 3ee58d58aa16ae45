//! Source locators for descriptor inputs.
//!
//! Accepted forms:
//! - `github:<owner>/<repo>[/<ref-or-rev>]` and `gitlab:…` likewise
//! - `git+https://…`, `git+ssh://…`, `git+http://…`, `git+file://…` with an
//!   optional `?ref=<ref>&rev=<rev>` query
//! - `https://…`, `http://…`, `tarball+https://…` archive URLs
//! - `path:<dir>`, or a bare path starting with `/`, `./` or `../`

use crate::types::Revision;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    #[error("locator must not be empty")]
    Empty,
    #[error("unrecognized locator '{0}' (expected github:, gitlab:, git+<url>, http(s):// or path:)")]
    UnknownScheme(String),
    #[error("'{0}' must name an owner and a repository")]
    MissingRepository(String),
    #[error("unsupported git transport in '{0}'")]
    UnsupportedTransport(String),
    #[error("unknown query parameter '{0}'")]
    UnknownParameter(String),
    #[error("query parameters are not supported in '{0}'")]
    UnexpectedQuery(String),
    #[error("'{0}' is not a 40-character hex revision")]
    InvalidRevision(String),
    #[error("path locator must not be empty")]
    EmptyPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Forge {
    Github,
    Gitlab,
}

impl Forge {
    fn scheme(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceLocator {
    /// Repository hosted on a known forge, addressed by owner/repo.
    Hosted {
        forge: Forge,
        owner: String,
        repo: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rev: Option<Revision>,
    },
    /// Arbitrary git remote.
    Git {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rev: Option<Revision>,
    },
    Tarball {
        url: String,
    },
    Path {
        path: String,
    },
}

impl SourceLocator {
    pub fn parse(input: &str) -> Result<Self, LocatorError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(LocatorError::Empty);
        }

        if let Some(rest) = input.strip_prefix("github:") {
            return parse_hosted(Forge::Github, input, rest);
        }
        if let Some(rest) = input.strip_prefix("gitlab:") {
            return parse_hosted(Forge::Gitlab, input, rest);
        }
        if let Some(rest) = input.strip_prefix("git+") {
            return parse_git(input, rest);
        }
        if let Some(rest) = input.strip_prefix("tarball+") {
            if rest.starts_with("https://") || rest.starts_with("http://") {
                return Ok(Self::Tarball {
                    url: rest.to_owned(),
                });
            }
            return Err(LocatorError::UnknownScheme(input.to_owned()));
        }
        if input.starts_with("https://") || input.starts_with("http://") {
            return Ok(Self::Tarball {
                url: input.to_owned(),
            });
        }
        if let Some(rest) = input.strip_prefix("path:") {
            let path = rest.trim();
            if path.is_empty() {
                return Err(LocatorError::EmptyPath);
            }
            return Ok(Self::Path {
                path: path.to_owned(),
            });
        }
        if input.starts_with('/') || input.starts_with("./") || input.starts_with("../") {
            return Ok(Self::Path {
                path: input.to_owned(),
            });
        }

        Err(LocatorError::UnknownScheme(input.to_owned()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hosted { forge, .. } => forge.scheme(),
            Self::Git { .. } => "git",
            Self::Tarball { .. } => "tarball",
            Self::Path { .. } => "path",
        }
    }

    /// Whether this locator can be pinned to a commit revision.
    pub fn supports_rev(&self) -> bool {
        matches!(self, Self::Hosted { .. } | Self::Git { .. })
    }

    pub fn rev(&self) -> Option<&Revision> {
        match self {
            Self::Hosted { rev, .. } | Self::Git { rev, .. } => rev.as_ref(),
            Self::Tarball { .. } | Self::Path { .. } => None,
        }
    }

    /// A locator is pinned when it names an exact revision, or when it has
    /// no notion of revision at all (tarballs and local paths).
    pub fn is_pinned(&self) -> bool {
        !self.supports_rev() || self.rev().is_some()
    }

    /// Return a copy pinned to `pinned`. Hosted locators drop their ref,
    /// since the shorthand carries only one of ref or rev.
    ///
    /// Locators that cannot carry a revision are returned unchanged.
    #[must_use]
    pub fn with_rev(&self, pinned: Revision) -> Self {
        match self {
            Self::Hosted {
                forge, owner, repo, ..
            } => Self::Hosted {
                forge: *forge,
                owner: owner.clone(),
                repo: repo.clone(),
                reference: None,
                rev: Some(pinned),
            },
            Self::Git { url, reference, .. } => Self::Git {
                url: url.clone(),
                reference: reference.clone(),
                rev: Some(pinned),
            },
            other => other.clone(),
        }
    }

    /// Return a copy with any revision removed.
    #[must_use]
    pub fn without_rev(&self) -> Self {
        match self {
            Self::Hosted { rev: Some(_), .. } | Self::Git { rev: Some(_), .. } => {
                let mut out = self.clone();
                if let Self::Hosted { rev, .. } | Self::Git { rev, .. } = &mut out {
                    *rev = None;
                }
                out
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hosted {
                forge,
                owner,
                repo,
                reference,
                rev,
            } => {
                write!(f, "{}:{owner}/{repo}", forge.scheme())?;
                if let Some(rev) = rev {
                    write!(f, "/{rev}")
                } else if let Some(reference) = reference {
                    write!(f, "/{reference}")
                } else {
                    Ok(())
                }
            }
            Self::Git {
                url,
                reference,
                rev,
            } => {
                write!(f, "git+{url}")?;
                let mut sep = '?';
                if let Some(reference) = reference {
                    write!(f, "{sep}ref={reference}")?;
                    sep = '&';
                }
                if let Some(rev) = rev {
                    write!(f, "{sep}rev={rev}")?;
                }
                Ok(())
            }
            Self::Tarball { url } => f.write_str(url),
            Self::Path { path } => write!(f, "path:{path}"),
        }
    }
}

fn parse_revision(raw: &str) -> Result<Revision, LocatorError> {
    if Revision::looks_like_rev(raw) {
        Ok(Revision::new(raw.to_ascii_lowercase()))
    } else {
        Err(LocatorError::InvalidRevision(raw.to_owned()))
    }
}

fn parse_hosted(forge: Forge, input: &str, rest: &str) -> Result<SourceLocator, LocatorError> {
    if rest.contains('?') {
        return Err(LocatorError::UnexpectedQuery(input.to_owned()));
    }
    let mut segments = rest.splitn(3, '/');
    let owner = segments.next().unwrap_or_default().trim();
    let repo = segments.next().unwrap_or_default().trim();
    if owner.is_empty() || repo.is_empty() {
        return Err(LocatorError::MissingRepository(input.to_owned()));
    }

    let tail = segments.next().map(str::trim).filter(|s| !s.is_empty());
    let (reference, rev) = match tail {
        Some(t) if Revision::looks_like_rev(t) => (None, Some(parse_revision(t)?)),
        Some(t) => (Some(t.to_owned()), None),
        None => (None, None),
    };

    Ok(SourceLocator::Hosted {
        forge,
        owner: owner.to_owned(),
        repo: repo.to_owned(),
        reference,
        rev,
    })
}

fn parse_git(input: &str, rest: &str) -> Result<SourceLocator, LocatorError> {
    const TRANSPORTS: &[&str] = &["https://", "http://", "ssh://", "file://"];
    if !TRANSPORTS.iter().any(|t| rest.starts_with(t)) {
        return Err(LocatorError::UnsupportedTransport(input.to_owned()));
    }

    let (url, query) = match rest.split_once('?') {
        Some((url, query)) => (url, Some(query)),
        None => (rest, None),
    };

    let mut reference = None;
    let mut rev = None;
    for pair in query.into_iter().flat_map(|q| q.split('&')) {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "ref" if !value.is_empty() => reference = Some(value.to_owned()),
            "rev" => rev = Some(parse_revision(value)?),
            _ => return Err(LocatorError::UnknownParameter(key.to_owned())),
        }
    }

    Ok(SourceLocator::Git {
        url: url.to_owned(),
        reference,
        rev,
    })
}
