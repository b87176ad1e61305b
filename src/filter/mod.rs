//! Filter algebra for case queries.
//!
//! A [`Filter`] is an immutable value: leaves carry one parameter, composites
//! carry their children. Equality and hashing are structural, so filters can
//! be used as cache keys and shared freely across threads. Deriving a new
//! filter always builds a new value; nothing is mutated in place.
//!
//! Filters render to a parameterized SQL condition through
//! [`Filter::compile`]; the statement around it belongs to the caller.

mod compile;

pub use compile::{BoundValue, CompileContext, FilterColumn, Predicate};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Composable query filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Items flagged by the named hash set.
    HashSet {
        /// Hash set name, matched exactly.
        hash_set_name: String,
    },

    /// Items carrying a tag.
    TagName {
        /// Id of the tag name.
        tag_name_id: i64,
        /// Tag name shown to users.
        display_name: String,
    },

    /// Items from one data source.
    DataSource {
        /// Id of the data source.
        data_source_id: i64,
        /// Data source name shown to users.
        name: String,
    },

    /// Items whose description contains a substring.
    Text {
        /// Substring to look for; empty matches everything.
        substring: String,
    },

    /// Excludes items whose file is in a known-good hash set.
    HideKnown,

    /// All children must match. Empty matches everything.
    And(Vec<Filter>),

    /// At least one child must match. Empty matches nothing.
    Or(Vec<Filter>),

    /// The child must not match.
    Not(Box<Filter>),
}

impl Filter {
    /// Filter on a hash set name.
    #[must_use]
    pub fn hash_set(hash_set_name: impl Into<String>) -> Self {
        Self::HashSet {
            hash_set_name: hash_set_name.into(),
        }
    }

    /// Filter on a tag name.
    #[must_use]
    pub fn tag_name(tag_name_id: i64, display_name: impl Into<String>) -> Self {
        Self::TagName {
            tag_name_id,
            display_name: display_name.into(),
        }
    }

    /// Filter on a data source.
    #[must_use]
    pub fn data_source(data_source_id: i64, name: impl Into<String>) -> Self {
        Self::DataSource {
            data_source_id,
            name: name.into(),
        }
    }

    /// Substring filter on the description.
    #[must_use]
    pub fn text(substring: impl Into<String>) -> Self {
        Self::Text {
            substring: substring.into(),
        }
    }

    /// Filter hiding known files.
    #[must_use]
    pub const fn hide_known() -> Self {
        Self::HideKnown
    }

    /// Conjunction of `filters`.
    #[must_use]
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Disjunction of `filters`.
    #[must_use]
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    /// Negation of `filter`.
    #[must_use]
    pub fn not(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    /// `self AND other`, flattening into an existing conjunction.
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut children) => {
                children.push(other);
                Self::And(children)
            }
            filter => Self::And(vec![filter, other]),
        }
    }

    /// `self OR other`, flattening into an existing disjunction.
    #[must_use]
    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut children) => {
                children.push(other);
                Self::Or(children)
            }
            filter => Self::Or(vec![filter, other]),
        }
    }

    /// `NOT self`.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::not(self)
    }

    /// An independently owned, structurally equal copy.
    #[must_use]
    pub fn copy_of(&self) -> Self {
        self.clone()
    }

    /// Child filters of a composite; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Filter] {
        match self {
            Self::And(children) | Self::Or(children) => children,
            Self::Not(child) => std::slice::from_ref(child.as_ref()),
            _ => &[],
        }
    }

    /// Label for showing the filter to a user.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::HashSet { hash_set_name } => hash_set_name.clone(),
            Self::TagName { display_name, .. } => display_name.clone(),
            Self::DataSource { name, .. } => name.clone(),
            Self::Text { substring } => format!("text contains \"{substring}\""),
            Self::HideKnown => "hide known files".to_string(),
            Self::And(children) => join_names(children, " and ", "all"),
            Self::Or(children) => join_names(children, " or ", "none"),
            Self::Not(child) => format!("not {}", child.display_name()),
        }
    }

    /// Stable digest of the filter's structure.
    ///
    /// Equal filters have equal fingerprints in every process and build, so
    /// the fingerprint can key persisted caches where [`Hash`] cannot.
    #[must_use]
    pub fn fingerprint(&self) -> FilterFingerprint {
        let mut hasher = blake3::Hasher::new();
        self.feed(&mut hasher);
        FilterFingerprint::from(hasher.finalize())
    }

    fn feed(&self, hasher: &mut blake3::Hasher) {
        fn feed_str(hasher: &mut blake3::Hasher, s: &str) {
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }

        match self {
            Self::HashSet { hash_set_name } => {
                hasher.update(&[1]);
                feed_str(hasher, hash_set_name);
            }
            Self::TagName {
                tag_name_id,
                display_name,
            } => {
                hasher.update(&[2]);
                hasher.update(&tag_name_id.to_le_bytes());
                feed_str(hasher, display_name);
            }
            Self::DataSource {
                data_source_id,
                name,
            } => {
                hasher.update(&[3]);
                hasher.update(&data_source_id.to_le_bytes());
                feed_str(hasher, name);
            }
            Self::Text { substring } => {
                hasher.update(&[4]);
                feed_str(hasher, substring);
            }
            Self::HideKnown => {
                hasher.update(&[5]);
            }
            Self::And(children) | Self::Or(children) => {
                hasher.update(&[if matches!(self, Self::And(_)) { 6 } else { 7 }]);
                hasher.update(&(children.len() as u64).to_le_bytes());
                for child in children {
                    child.feed(hasher);
                }
            }
            Self::Not(child) => {
                hasher.update(&[8]);
                child.feed(hasher);
            }
        }
    }
}

fn join_names(children: &[Filter], separator: &str, empty: &str) -> String {
    if children.is_empty() {
        return empty.to_string();
    }
    let names: Vec<String> = children.iter().map(Filter::display_name).collect();
    format!("({})", names.join(separator))
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// BLAKE3 digest of a filter, see [`Filter::fingerprint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterFingerprint([u8; 32]);

impl FilterFingerprint {
    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<blake3::Hash> for FilterFingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for FilterFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", blake3::Hash::from(self.0).to_hex())
    }
}
