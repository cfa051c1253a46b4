//! Domain-of-influence node records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

use super::NodeId;

/// Administrative level of a domain of influence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DomainOfInfluenceType {
    /// Confederation.
    Ch,
    /// Canton.
    Ct,
    /// District.
    Bz,
    /// Municipality.
    Mu,
    /// City district.
    Sk,
    /// School community.
    Sc,
    /// Church community.
    Ki,
    /// Local community.
    Og,
    /// Corporation.
    Ko,
    /// Other.
    An,
    /// Foreign voters.
    Au,
}

impl DomainOfInfluenceType {
    /// Returns the persisted code of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainOfInfluenceType::Ch => "CH",
            DomainOfInfluenceType::Ct => "CT",
            DomainOfInfluenceType::Bz => "BZ",
            DomainOfInfluenceType::Mu => "MU",
            DomainOfInfluenceType::Sk => "SK",
            DomainOfInfluenceType::Sc => "SC",
            DomainOfInfluenceType::Ki => "KI",
            DomainOfInfluenceType::Og => "OG",
            DomainOfInfluenceType::Ko => "KO",
            DomainOfInfluenceType::An => "AN",
            DomainOfInfluenceType::Au => "AU",
        }
    }
}

impl fmt::Display for DomainOfInfluenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainOfInfluenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CH" => Ok(DomainOfInfluenceType::Ch),
            "CT" => Ok(DomainOfInfluenceType::Ct),
            "BZ" => Ok(DomainOfInfluenceType::Bz),
            "MU" => Ok(DomainOfInfluenceType::Mu),
            "SK" => Ok(DomainOfInfluenceType::Sk),
            "SC" => Ok(DomainOfInfluenceType::Sc),
            "KI" => Ok(DomainOfInfluenceType::Ki),
            "OG" => Ok(DomainOfInfluenceType::Og),
            "KO" => Ok(DomainOfInfluenceType::Ko),
            "AN" => Ok(DomainOfInfluenceType::An),
            "AU" => Ok(DomainOfInfluenceType::Au),
            other => Err(format!("unknown domain of influence type: {}", other)),
        }
    }
}

/// A domain of influence as stored by the write side.
///
/// The record is flat: child lists and counting circles are derived by
/// [`TreeBuilder`](crate::tree::TreeBuilder) and live only in the forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier.
    pub id: NodeId,
    /// Display name, used for child ordering.
    pub name: String,
    /// Parent node, `None` for a root.
    pub parent_id: Option<NodeId>,
    /// Tenant owning this node.
    pub owner: TenantId,
    /// Administrative level.
    pub kind: DomainOfInfluenceType,
}

impl Node {
    /// Creates a root node with a fresh id.
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<TenantId>,
        kind: DomainOfInfluenceType,
    ) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            parent_id: None,
            owner: owner.into(),
            kind,
        }
    }

    /// Sets the node id.
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Sets the parent node.
    pub fn with_parent(mut self, parent_id: NodeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the owning tenant.
    pub fn with_owner(mut self, owner: impl Into<TenantId>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Returns `true` if the node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
