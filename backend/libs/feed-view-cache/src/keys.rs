//! View key schema
//!
//! A view is identified only by its normalized filter parameters. Raw
//! parameters are normalized once at the edge:
//! - names are canonicalized to snake_case (`onlyFollowing` == `only_following`)
//! - `false` flags are dropped when the registry treats absent as false
//! - insertion order never matters (keys are kept sorted)

use crate::error::{Result, ViewCacheError};
use crate::model::UserId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const ONLY_FOLLOWING: &str = "only_following";
pub const USER_ID: &str = "user_id";

/// Filter parameter value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Int(n) => write!(f, "{}", n),
            FilterValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<&UserId> for FilterValue {
    fn from(value: &UserId) -> Self {
        FilterValue::Text(value.as_str().to_string())
    }
}

/// How an omitted boolean flag relates to an explicit `false`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FalseFlagPolicy {
    /// `{onlyFollowing: false}` and `{}` name the same view
    #[default]
    AbsentIsFalse,
    /// Every explicit flag is part of the key
    Distinct,
}

/// Normalized, order-independent view identity.
///
/// Deserialization goes through [`ViewKey::from_json`] with the default policy,
/// so a key read off the wire is normalized like any other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct ViewKey(BTreeMap<String, FilterValue>);

impl ViewKey {
    /// The unfiltered feed: `{}`
    pub fn global() -> Self {
        Self::default()
    }

    /// Normalize raw `(name, value)` pairs into a key
    pub fn normalize<I, K, V>(raw: I, policy: FalseFlagPolicy) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        let mut params = BTreeMap::new();

        for (name, value) in raw {
            let name = canonical_name(name.as_ref())?;
            let value: FilterValue = value.into();

            match params.get(&name) {
                Some(existing) if existing != &value => {
                    return Err(collision(name, existing, &value));
                }
                _ => {
                    params.insert(name, value);
                }
            }
        }

        if policy == FalseFlagPolicy::AbsentIsFalse {
            params.retain(|_, value| value != &FilterValue::Bool(false));
        }

        Ok(Self(params))
    }

    /// Normalize a JSON object of raw params, e.g. `{"onlyFollowing": true}`
    pub fn from_json(raw: &serde_json::Value, policy: FalseFlagPolicy) -> Result<Self> {
        let object = match raw {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => return Ok(Self::global()),
            other => {
                return Err(ViewCacheError::InvalidViewParam {
                    name: String::new(),
                    reason: format!("expected an object, got {}", other),
                })
            }
        };

        let mut pairs = Vec::with_capacity(object.len());
        for (name, value) in object {
            let value = match value {
                serde_json::Value::Bool(b) => FilterValue::Bool(*b),
                serde_json::Value::String(s) => FilterValue::Text(s.clone()),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(n) => FilterValue::Int(n),
                    None => {
                        return Err(ViewCacheError::InvalidViewParam {
                            name: name.clone(),
                            reason: format!("non-integer number {}", n),
                        })
                    }
                },
                // Omitted and null are the same filter
                serde_json::Value::Null => continue,
                other => {
                    return Err(ViewCacheError::InvalidViewParam {
                        name: name.clone(),
                        reason: format!("unsupported value {}", other),
                    })
                }
            };
            pairs.push((name.as_str(), value));
        }

        Self::normalize(pairs, policy)
    }

    pub fn get(&self, name: &str) -> Option<&FilterValue> {
        self.0.get(name)
    }

    pub fn is_global(&self) -> bool {
        self.0.is_empty()
    }

    pub fn only_following(&self) -> bool {
        matches!(self.get(ONLY_FOLLOWING), Some(FilterValue::Bool(true)))
    }

    /// Profile owner of a `{userId: X}` view
    pub fn profile(&self) -> Option<UserId> {
        match self.get(USER_ID) {
            Some(FilterValue::Text(id)) => Some(UserId::new(id.clone())),
            _ => None,
        }
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl TryFrom<serde_json::Value> for ViewKey {
    type Error = ViewCacheError;

    fn try_from(raw: serde_json::Value) -> Result<Self> {
        Self::from_json(&raw, FalseFlagPolicy::default())
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        f.write_str("}")
    }
}

fn collision(name: String, first: &FilterValue, second: &FilterValue) -> ViewCacheError {
    ViewCacheError::ViewKeyCollision {
        name,
        first: first.clone(),
        second: second.clone(),
    }
}

/// `onlyFollowing`, `only-following`, `userID` and `USER_ID` all become snake_case.
///
/// A separator is only inserted where a lowercase letter or digit meets an
/// uppercase one, so runs of capitals stay one word.
fn canonical_name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ViewCacheError::InvalidViewParam {
            name: raw.to_string(),
            reason: "empty name".to_string(),
        });
    }

    let mut name = String::with_capacity(trimmed.len() + 4);
    let mut prev: Option<char> = None;
    for ch in trimmed.chars() {
        if ch == '-' || ch == '_' || ch.is_whitespace() {
            if !name.is_empty() && !name.ends_with('_') {
                name.push('_');
            }
        } else if ch.is_uppercase() {
            let boundary = prev.map_or(false, |p| p.is_lowercase() || p.is_ascii_digit());
            if boundary && !name.ends_with('_') {
                name.push('_');
            }
            name.extend(ch.to_lowercase());
        } else {
            name.push(ch);
        }
        prev = Some(ch);
    }

    Ok(name.trim_end_matches('_').to_string())
}

/// Typed filters used by the feed screens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFilter {
    /// Recent posts from everyone
    Global,
    /// Posts from accounts the viewer follows
    Following,
    /// Posts by one author
    Profile(UserId),
}

impl FeedFilter {
    pub fn global() -> Self {
        FeedFilter::Global
    }

    pub fn following() -> Self {
        FeedFilter::Following
    }

    pub fn profile(user_id: impl Into<UserId>) -> Self {
        FeedFilter::Profile(user_id.into())
    }

    /// Raw params as the feed endpoint receives them
    pub fn raw_params(&self) -> Vec<(&'static str, FilterValue)> {
        match self {
            FeedFilter::Global => Vec::new(),
            FeedFilter::Following => vec![("onlyFollowing", FilterValue::Bool(true))],
            FeedFilter::Profile(user_id) => vec![("userId", FilterValue::from(user_id))],
        }
    }

    pub fn key(&self, policy: FalseFlagPolicy) -> Result<ViewKey> {
        ViewKey::normalize(self.raw_params(), policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("onlyFollowing").unwrap(), "only_following");
        assert_eq!(canonical_name("only-following").unwrap(), "only_following");
        assert_eq!(canonical_name(" only_following ").unwrap(), "only_following");
        assert_eq!(canonical_name("userId").unwrap(), "user_id");
        assert_eq!(canonical_name("userID").unwrap(), "user_id");
        assert_eq!(canonical_name("USER_ID").unwrap(), "user_id");
        assert_eq!(canonical_name("UserId").unwrap(), "user_id");
        assert_eq!(canonical_name("ONLY-FOLLOWING").unwrap(), "only_following");
        assert_eq!(canonical_name("page2Size").unwrap(), "page2_size");
        assert!(canonical_name("  ").is_err());
    }

    #[test]
    fn test_spellings_name_one_profile_view() {
        let policy = FalseFlagPolicy::AbsentIsFalse;
        let camel = ViewKey::normalize([("userId", "u1")], policy).unwrap();
        let acronym = ViewKey::normalize([("userID", "u1")], policy).unwrap();
        let screaming = ViewKey::normalize([("USER_ID", "u1")], policy).unwrap();

        assert_eq!(camel, acronym);
        assert_eq!(camel, screaming);
        assert_eq!(acronym.profile(), Some(UserId::from("u1")));
        assert_eq!(screaming.profile(), Some(UserId::from("u1")));
    }

    #[test]
    fn test_deserialize_normalizes() {
        let key: ViewKey =
            serde_json::from_value(serde_json::json!({ "onlyFollowing": true })).unwrap();
        assert!(key.only_following());
        assert_eq!(key, FeedFilter::following().key(FalseFlagPolicy::default()).unwrap());

        let key: ViewKey =
            serde_json::from_value(serde_json::json!({ "only_following": false })).unwrap();
        assert!(key.is_global());

        let profile = FeedFilter::profile("u1").key(FalseFlagPolicy::default()).unwrap();
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json, serde_json::json!({ "user_id": "u1" }));
        assert_eq!(serde_json::from_value::<ViewKey>(json).unwrap(), profile);

        assert!(serde_json::from_value::<ViewKey>(serde_json::json!([1])).is_err());
    }

    #[test]
    fn test_order_independent() {
        let a = ViewKey::normalize(
            vec![("userId", FilterValue::from("u1")), ("onlyFollowing", true.into())],
            FalseFlagPolicy::AbsentIsFalse,
        )
        .unwrap();
        let b = ViewKey::normalize(
            vec![("only_following", FilterValue::from(true)), ("user_id", "u1".into())],
            FalseFlagPolicy::AbsentIsFalse,
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "{only_following: true, user_id: u1}");
    }

    #[test]
    fn test_absent_is_false_policy() {
        let explicit =
            ViewKey::normalize([("onlyFollowing", false)], FalseFlagPolicy::AbsentIsFalse).unwrap();
        assert_eq!(explicit, ViewKey::global());
        assert!(explicit.is_global());
    }

    #[test]
    fn test_distinct_policy_keeps_false() {
        let explicit =
            ViewKey::normalize([("onlyFollowing", false)], FalseFlagPolicy::Distinct).unwrap();
        assert_ne!(explicit, ViewKey::global());
        assert_eq!(explicit.get(ONLY_FOLLOWING), Some(&FilterValue::Bool(false)));
    }

    #[test]
    fn test_collision_between_spellings() {
        let err = ViewKey::normalize(
            [("onlyFollowing", true), ("only_following", false)],
            FalseFlagPolicy::AbsentIsFalse,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ViewCacheError::ViewKeyCollision { ref name, .. } if name == ONLY_FOLLOWING
        ));

        // Same value under two spellings is not a collision
        let key = ViewKey::normalize(
            [("onlyFollowing", true), ("only_following", true)],
            FalseFlagPolicy::AbsentIsFalse,
        )
        .unwrap();
        assert!(key.only_following());
    }

    #[test]
    fn test_from_json() {
        let key = ViewKey::from_json(
            &serde_json::json!({ "userId": "u1", "cursor": null }),
            FalseFlagPolicy::AbsentIsFalse,
        )
        .unwrap();
        assert_eq!(key.profile(), Some(UserId::from("u1")));

        assert_eq!(
            ViewKey::from_json(&serde_json::Value::Null, FalseFlagPolicy::Distinct).unwrap(),
            ViewKey::global()
        );
        assert!(ViewKey::from_json(
            &serde_json::json!({ "tags": ["a"] }),
            FalseFlagPolicy::AbsentIsFalse
        )
        .is_err());
        assert!(ViewKey::from_json(&serde_json::json!([1]), FalseFlagPolicy::AbsentIsFalse).is_err());
    }

    #[test]
    fn test_feed_filter_keys_are_distinct() {
        let policy = FalseFlagPolicy::AbsentIsFalse;
        let global = FeedFilter::global().key(policy).unwrap();
        let following = FeedFilter::following().key(policy).unwrap();
        let profile = FeedFilter::profile("u1").key(policy).unwrap();

        assert!(global.is_global());
        assert!(following.only_following());
        assert_eq!(profile.profile(), Some(UserId::from("u1")));
        assert_ne!(global, following);
        assert_ne!(following, profile);
    }
}
