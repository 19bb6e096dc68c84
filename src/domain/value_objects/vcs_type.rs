use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version control backend handled by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsType {
    /// Git
    Git,
    /// Mercurial
    Hg,
    /// Subversion
    Svn,
    /// Bazaar
    Bzr,
    /// Tarball download
    Tar,
    /// Zip archive download
    Zip,
    /// Placeholder for repository types no client supports
    None,
}

impl fmt::Display for VcsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VcsType {
    type Err = VcsTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "git" => Ok(VcsType::Git),
            "hg" | "mercurial" => Ok(VcsType::Hg),
            "svn" | "subversion" => Ok(VcsType::Svn),
            "bzr" | "bazaar" => Ok(VcsType::Bzr),
            "tar" => Ok(VcsType::Tar),
            "zip" => Ok(VcsType::Zip),
            _ => Err(VcsTypeError::Unsupported(s.to_string())),
        }
    }
}

impl VcsType {
    /// Every type a real client exists for
    pub const SUPPORTED: [VcsType; 6] = [
        VcsType::Bzr,
        VcsType::Git,
        VcsType::Hg,
        VcsType::Svn,
        VcsType::Tar,
        VcsType::Zip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VcsType::Git => "git",
            VcsType::Hg => "hg",
            VcsType::Svn => "svn",
            VcsType::Bzr => "bzr",
            VcsType::Tar => "tar",
            VcsType::Zip => "zip",
            VcsType::None => "none",
        }
    }

    /// Metadata directory marking a working copy, if the backend has one
    pub fn metadata_dir(&self) -> Option<&'static str> {
        match self {
            VcsType::Git => Some(".git"),
            VcsType::Hg => Some(".hg"),
            VcsType::Svn => Some(".svn"),
            VcsType::Bzr => Some(".bzr"),
            VcsType::Tar | VcsType::Zip | VcsType::None => None,
        }
    }

    /// Whether the backend keeps a working copy that later commands can operate on
    pub fn tracks_working_copy(&self) -> bool {
        self.metadata_dir().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VcsTypeError {
    #[error("Repository type '{0}' is not supported")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vcs_type_display() {
        assert_eq!(VcsType::Git.to_string(), "git");
        assert_eq!(VcsType::Hg.to_string(), "hg");
        assert_eq!(VcsType::None.to_string(), "none");
    }

    #[test]
    fn test_vcs_type_from_str() {
        assert_eq!("git".parse::<VcsType>().unwrap(), VcsType::Git);
        assert_eq!("Mercurial".parse::<VcsType>().unwrap(), VcsType::Hg);
        assert_eq!("subversion".parse::<VcsType>().unwrap(), VcsType::Svn);
        assert_eq!("BZR".parse::<VcsType>().unwrap(), VcsType::Bzr);
        assert_eq!("zip".parse::<VcsType>().unwrap(), VcsType::Zip);

        let error = "cvs".parse::<VcsType>().unwrap_err();
        assert_eq!(error.to_string(), "Repository type 'cvs' is not supported");
    }

    #[test]
    fn test_none_is_not_parseable() {
        assert!("none".parse::<VcsType>().is_err());
    }

    #[test]
    fn test_metadata_dirs() {
        assert_eq!(VcsType::Git.metadata_dir(), Some(".git"));
        assert_eq!(VcsType::Bzr.metadata_dir(), Some(".bzr"));
        assert_eq!(VcsType::Tar.metadata_dir(), None);
        assert!(!VcsType::Zip.tracks_working_copy());
        assert!(VcsType::Svn.tracks_working_copy());
    }

    #[test]
    fn test_serde_lowercase() {
        let yaml = serde_yaml::to_string(&VcsType::Svn).unwrap();
        assert_eq!(yaml.trim(), "svn");
        let parsed: VcsType = serde_yaml::from_str("hg").unwrap();
        assert_eq!(parsed, VcsType::Hg);
    }
}
