use serde::{Deserialize, Serialize};

/// Unit of permission checked against a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    View,
    Edit,
    Delete,
    ManageContributors,
}

/// Relation between actor and story that a capability requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Author,
    AuthorOrContributor,
}

impl Capability {
    pub fn required_relation(self) -> Relation {
        match self {
            Self::View | Self::Edit => Relation::AuthorOrContributor,
            Self::Delete | Self::ManageContributors => Relation::Author,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::Edit => "EDIT",
            Self::Delete => "DELETE",
            Self::ManageContributors => "MANAGE_CONTRIBUTORS",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
