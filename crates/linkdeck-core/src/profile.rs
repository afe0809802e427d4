//! Profile records as stored on the ledger
//!
//! A [`Profile`] is the authoritative source for which links exist. Its
//! [`LinkMap`] keeps ledger iteration order, which is the fallback display
//! order whenever no local overlay says otherwise.

use derive_more::Display;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum number of links a profile may hold (enforced by the contract)
pub const MAX_LINKS: usize = 10;

/// Type tag of profile objects on the ledger
pub const PROFILE_TYPE: &str = "linktree::profile::Profile";

/// Type tag of statistics objects on the ledger
pub const STATISTICS_TYPE: &str = "linktree::statistics::Statistics";

/// Opaque ledger object identifier
#[derive(
    Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Profiles are addressed by their object id
pub type ProfileId = ObjectId;

/// Account that controls a profile
#[derive(
    Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Label → URL mapping in ledger iteration order
///
/// Labels are unique (exact, case-sensitive). Removal keeps the relative
/// order of the remaining entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkMap(IndexMap<String, String>);

impl LinkMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether another link can be added without exceeding [`MAX_LINKS`]
    pub fn is_full(&self) -> bool {
        self.0.len() >= MAX_LINKS
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    /// Labels in ledger order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Insert or replace a link, returning the previous URL
    pub fn insert(&mut self, label: impl Into<String>, url: impl Into<String>) -> Option<String> {
        self.0.insert(label.into(), url.into())
    }

    pub fn remove(&mut self, label: &str) -> Option<String> {
        self.0.shift_remove(label)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LinkMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A profile as read from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub owner: Address,
    pub slug: String,
    pub base_username: String,
    pub links: LinkMap,
    pub theme: String,
    pub bio: String,
    pub avatar_cid: String,
    pub is_category: bool,
    pub parent_slug: Option<String>,
    pub created_at: u64,
}

impl Profile {
    /// Create an empty profile with default metadata
    pub fn new(
        id: impl Into<ProfileId>,
        owner: impl Into<Address>,
        base_username: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            slug: slug.into(),
            base_username: base_username.into(),
            links: LinkMap::new(),
            theme: String::new(),
            bio: String::new(),
            avatar_cid: String::new(),
            is_category: false,
            parent_slug: None,
            created_at: 0,
        }
    }

    /// Builder-style link insertion
    pub fn with_link(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.links.insert(label, url);
        self
    }

    /// Decode the ledger's object representation
    ///
    /// Links arrive as `{ "contents": [{ "key", "value" }] }` and are
    /// flattened in order. Any shape mismatch is an error.
    pub fn from_object(id: ProfileId, object: serde_json::Value) -> Result<Self, serde_json::Error> {
        let remote: RemoteProfile = serde_json::from_value(object)?;
        Ok(Self {
            id,
            owner: remote.owner,
            slug: remote.slug,
            base_username: remote.base_username,
            links: remote
                .links
                .contents
                .into_iter()
                .map(|entry| (entry.key, entry.value))
                .collect(),
            theme: remote.theme,
            bio: remote.bio,
            avatar_cid: remote.avatar_cid,
            is_category: remote.is_category,
            parent_slug: remote.parent_slug,
            created_at: remote.created_at,
        })
    }

    /// Encode into the ledger's object representation
    pub fn to_object(&self) -> serde_json::Value {
        serde_json::json!({
            "owner": self.owner,
            "slug": self.slug,
            "base_username": self.base_username,
            "bio": self.bio,
            "avatar_cid": self.avatar_cid,
            "theme": self.theme,
            "is_category": self.is_category,
            "parent_slug": self.parent_slug,
            "created_at": self.created_at.to_string(),
            "links": {
                "contents": self
                    .links
                    .iter()
                    .map(|(key, value)| serde_json::json!({ "key": key, "value": value }))
                    .collect::<Vec<_>>(),
            },
        })
    }
}

#[derive(Deserialize)]
struct RemoteProfile {
    owner: Address,
    slug: String,
    base_username: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    avatar_cid: String,
    #[serde(default)]
    theme: String,
    #[serde(default)]
    is_category: bool,
    #[serde(default)]
    parent_slug: Option<String>,
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    created_at: u64,
    links: RemoteVecMap,
}

#[derive(Deserialize)]
struct RemoteVecMap {
    contents: Vec<RemoteEntry>,
}

#[derive(Deserialize)]
struct RemoteEntry {
    key: String,
    value: String,
}

/// Ledgers commonly render u64 values as strings
fn u64_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_map_keeps_order_on_remove() {
        let mut links: LinkMap = [("A", "https://a"), ("B", "https://b"), ("C", "https://c")]
            .into_iter()
            .collect();
        links.remove("A");
        let labels: Vec<_> = links.labels().collect();
        assert_eq!(labels, vec!["B", "C"]);
    }

    #[test]
    fn test_link_map_is_full() {
        let links: LinkMap = (0..MAX_LINKS)
            .map(|i| (format!("l{i}"), format!("https://{i}.com")))
            .collect();
        assert!(links.is_full());
    }

    #[test]
    fn test_from_object_flattens_links() {
        let object = serde_json::json!({
            "owner": "0xabc",
            "slug": "main",
            "base_username": "alice",
            "created_at": "1700000000",
            "links": { "contents": [
                { "key": "Blog", "value": "https://blog.example" },
                { "key": "Git", "value": "https://git.example" }
            ]}
        });
        let profile = Profile::from_object(ObjectId::new("0x1"), object).unwrap();
        assert_eq!(profile.created_at, 1_700_000_000);
        assert_eq!(profile.links.labels().collect::<Vec<_>>(), vec!["Blog", "Git"]);
        assert_eq!(profile.links.get("Git"), Some("https://git.example"));
        assert!(profile.parent_slug.is_none());
    }

    #[test]
    fn test_from_object_rejects_mismatch() {
        let object = serde_json::json!({ "owner": "0xabc", "links": [] });
        assert!(Profile::from_object(ObjectId::new("0x1"), object).is_err());
    }

    #[test]
    fn test_object_encoding_is_readable_back() {
        let profile = Profile::new("0x9", "0xowner", "bob", "work")
            .with_link("X", "https://x.com")
            .with_link("Y", "/internal");
        let decoded = Profile::from_object(profile.id.clone(), profile.to_object()).unwrap();
        assert_eq!(decoded, profile);
    }
}
