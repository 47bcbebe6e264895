//! Validated repository references.

use serde::{Deserialize, Serialize};

/// Normalized pointer to a remote repository and branch.
///
/// Built once by the validator and never mutated afterward; owner and name
/// carry the provider's canonical casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryReference {
    /// Canonical web URL, e.g. `https://github.com/acme/widgets`.
    pub url: String,
    pub owner: String,
    pub name: String,
    /// Requested branch, or the provider's default branch.
    pub branch: String,
    pub is_private: bool,
}

impl RepositoryReference {
    /// `owner/name` form used in logs and document headers.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.name, self.branch)
    }
}
