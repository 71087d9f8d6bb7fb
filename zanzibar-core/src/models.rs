use crate::error::ZanzibarError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A reference to either a concrete entity (`namespace:id`) or a computed
/// userset (`namespace:id#relation`, all holders of `relation` on the entity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Set {
    pub namespace: String,
    pub id: String,
    /// Empty for a concrete entity.
    #[serde(default)]
    pub relation: String,
}

impl Set {
    pub fn entity(namespace: &str, id: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            id: id.to_string(),
            relation: String::new(),
        }
    }

    pub fn userset(namespace: &str, id: &str, relation: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            id: id.to_string(),
            relation: relation.to_string(),
        }
    }

    /// True when this set denotes the holders of a relation rather than a single entity.
    pub fn is_userset(&self) -> bool {
        !self.relation.is_empty()
    }

    pub fn validate(&self) -> Result<(), ZanzibarError> {
        if self.namespace.is_empty() {
            return Err(ZanzibarError::InvalidSet(format!("empty namespace in '{}'", self)));
        }
        if self.id.is_empty() {
            return Err(ZanzibarError::InvalidSet(format!("empty id in '{}'", self)));
        }
        Ok(())
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_userset() {
            write!(f, "{}:{}#{}", self.namespace, self.id, self.relation)
        } else {
            write!(f, "{}:{}", self.namespace, self.id)
        }
    }
}

impl FromStr for Set {
    type Err = ZanzibarError;

    /// Parses `namespace:id` or `namespace:id#relation`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (entity, relation) = match s.split_once('#') {
            Some((entity, relation)) => (entity, relation),
            None => (s, ""),
        };
        let (namespace, id) = entity
            .split_once(':')
            .ok_or_else(|| ZanzibarError::InvalidSet(format!("expected 'namespace:id', got '{}'", s)))?;

        let set = Self::userset(namespace, id, relation);
        set.validate()?;
        Ok(set)
    }
}

/// A stored edge: every member of `child` is a member of `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tuple {
    pub parent: Set,
    pub child: Set,
}

impl Tuple {
    pub fn new(parent: Set, child: Set) -> Self {
        Self { parent, child }
    }

    pub fn validate(&self) -> Result<(), ZanzibarError> {
        self.parent
            .validate()
            .and_then(|_| self.child.validate())
            .map_err(|e| ZanzibarError::InvalidTuple(format!("{}: {}", self, e)))
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.parent, self.child)
    }
}

impl FromStr for Tuple {
    type Err = ZanzibarError;

    /// Parses `parent@child`, e.g. `doc:1#owner@user:alice`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (parent, child) = s
            .split_once('@')
            .ok_or_else(|| ZanzibarError::InvalidTuple(format!("expected 'parent@child', got '{}'", s)))?;
        Ok(Self::new(parent.parse()?, child.parse()?))
    }
}

/// One schema row: holders of `relation` on objects of `namespace` get `permission`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relation {
    pub namespace: String,
    pub relation: String,
    pub permission: String,
}

impl Relation {
    pub fn new(namespace: &str, relation: &str, permission: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            relation: relation.to_string(),
            permission: permission.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ZanzibarError> {
        if self.namespace.is_empty() || self.relation.is_empty() || self.permission.is_empty() {
            return Err(ZanzibarError::InvalidRelation(format!(
                "namespace, relation and permission must be non-empty: {}",
                self
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}->{}", self.namespace, self.relation, self.permission)
    }
}

/// Permissions conferred by a single relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationPermissions {
    pub permissions: BTreeSet<String>,
}

/// Relations declared on a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRelations {
    pub relations: BTreeMap<String, RelationPermissions>,
}

/// namespace -> relation -> permissions
pub type Namespaces = BTreeMap<String, NamespaceRelations>;

/// relation -> permissions held by a subject on one object
pub type ParentRelations = BTreeMap<String, RelationPermissions>;

/// Authorization check request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub parent: Set,
    pub child: Set,
}

/// Authorization check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

/// Batch write request for tuples, applied atomically
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteRequest {
    #[serde(default)]
    pub adds: Vec<Tuple>,
    #[serde(default)]
    pub removes: Vec<Tuple>,
}

impl WriteRequest {
    pub fn add(tuples: Vec<Tuple>) -> Self {
        Self { adds: tuples, removes: Vec::new() }
    }

    pub fn remove(tuples: Vec<Tuple>) -> Self {
        Self { adds: Vec::new(), removes: tuples }
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }
}

/// Batch write request for schema rows, applied atomically
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteRelationsRequest {
    #[serde(default)]
    pub adds: Vec<Relation>,
    #[serde(default)]
    pub removes: Vec<Relation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentRelationsRequest {
    pub parent_namespace: String,
    pub parent_id: String,
    pub child: Set,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentRelationsResponse {
    pub relations: ParentRelations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespacesResponse {
    pub namespaces: Namespaces,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_display_and_parse() {
        let user = Set::entity("org.User", "alice");
        assert_eq!(user.to_string(), "org.User:alice");
        assert!(!user.is_userset());

        let members = Set::userset("org.Group", "eng", "member");
        assert_eq!(members.to_string(), "org.Group:eng#member");
        assert_eq!("org.Group:eng#member".parse::<Set>().unwrap(), members);
        assert_eq!("org.User:alice".parse::<Set>().unwrap(), user);
    }

    #[test]
    fn test_set_parse_rejects_malformed() {
        assert!("no-colon".parse::<Set>().is_err());
        assert!(":id".parse::<Set>().is_err());
        assert!("ns:".parse::<Set>().is_err());
    }

    #[test]
    fn test_tuple_parse() {
        let tuple: Tuple = "org.Note:1#owner@org.Group:eng#member".parse().unwrap();
        assert_eq!(tuple.parent, Set::userset("org.Note", "1", "owner"));
        assert_eq!(tuple.child, Set::userset("org.Group", "eng", "member"));
        assert_eq!(tuple.to_string(), "org.Note:1#owner@org.Group:eng#member");
    }

    #[test]
    fn test_relation_validate() {
        assert!(Relation::new("org.Note", "owner", "read").validate().is_ok());
        assert!(Relation::new("org.Note", "", "read").validate().is_err());
        assert!(Relation::new("", "owner", "read").validate().is_err());
    }

    #[test]
    fn test_set_deserializes_without_relation() {
        let set: Set = serde_json::from_str(r#"{"namespace":"org.User","id":"bob"}"#).unwrap();
        assert_eq!(set, Set::entity("org.User", "bob"));
    }
}
