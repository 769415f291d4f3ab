//! Read operations and Cypher statement builder for entity lookups.
//!
//! Every node stores its natural-key properties as plain properties (so they
//! can be matched) plus the full entity as a JSON document in `_doc`, which is
//! what lookups decode. The whole key is also stored as one text property,
//! `_key`, which carries the per-label uniqueness constraint.

use neo4rs::{query, Query};
use serde_json::{json, Value};

use regsync_core::{Entity, EntityKind, NaturalKey};

use crate::client::GraphError;

/// Node property holding the serialized entity.
pub const DOCUMENT_PROPERTY: &str = "_doc";

/// Node property holding the canonical text of the natural key.
pub const KEY_PROPERTY: &str = "_key";

/// Canonical text of a natural key: a JSON array of `[property, value]` pairs.
///
/// Absent parts are written as null, so keys that differ only in which parts
/// are absent still get distinct text.
pub fn key_text(key: &NaturalKey) -> String {
    let pairs = key
        .components()
        .into_iter()
        .map(|(property, value)| json!([property, value]))
        .collect();
    Value::Array(pairs).to_string()
}

/// A Cypher statement with string parameters, built before it is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub cypher: String,
    pub params: Vec<(String, String)>,
}

impl Statement {
    pub fn into_query(self) -> Query {
        self.params
            .into_iter()
            .fold(query(&self.cypher), |q, (name, value)| q.param(&name, value))
    }
}

/// `MATCH` clause selecting the node identified by `key` under variable `var`.
///
/// Absent key parts must be absent on the node too (`IS NULL`), so a key with
/// a null part never matches a node that has that part set.
pub fn match_clause(var: &str, key: &NaturalKey) -> (String, Vec<(String, String)>) {
    let label = key.kind().label();
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    for (property, value) in key.components() {
        match value {
            Some(v) => {
                let param = format!("{var}_{property}");
                conditions.push(format!("{var}.{property} = ${param}"));
                params.push((param, v));
            }
            None => conditions.push(format!("{var}.{property} IS NULL")),
        }
    }

    let cypher = format!("MATCH ({var}:{label}) WHERE {}", conditions.join(" AND "));
    (cypher, params)
}

/// Lookup statement returning at most one node as `n`.
pub fn find_statement(key: &NaturalKey) -> Statement {
    let (clause, params) = match_clause("n", key);
    Statement {
        cypher: format!("{clause} RETURN n LIMIT 1"),
        params,
    }
}

/// Decode the entity stored on a returned node.
pub fn entity_from_node(kind: EntityKind, node: &neo4rs::Node) -> Result<Entity, GraphError> {
    let doc: String = node.get(DOCUMENT_PROPERTY).map_err(|e| {
        GraphError::Serialization(format!("{kind} node has no {DOCUMENT_PROPERTY}: {e}"))
    })?;
    entity_from_document(kind, &doc)
}

/// Rebuild an entity of `kind` from its JSON document.
pub fn entity_from_document(kind: EntityKind, doc: &str) -> Result<Entity, GraphError> {
    let decoded = match kind {
        EntityKind::Organization => serde_json::from_str(doc).map(Entity::Organization),
        EntityKind::Person => serde_json::from_str(doc).map(Entity::Person),
        EntityKind::ForeignOrganization => {
            serde_json::from_str(doc).map(Entity::ForeignOrganization)
        }
        EntityKind::Founder => serde_json::from_str(doc).map(Entity::Founder),
        EntityKind::Manager => serde_json::from_str(doc).map(Entity::Manager),
        EntityKind::Authority => serde_json::from_str(doc).map(Entity::Authority),
        EntityKind::Okved => serde_json::from_str(doc).map(Entity::Okved),
        EntityKind::Document => serde_json::from_str(doc).map(Entity::Document),
        EntityKind::License => serde_json::from_str(doc).map(Entity::License),
        EntityKind::RegistrySmb => serde_json::from_str(doc).map(Entity::RegistrySmb),
        EntityKind::Finance => serde_json::from_str(doc).map(Entity::Finance),
        EntityKind::Address => serde_json::from_str(doc).map(Entity::Address),
        EntityKind::Region
        | EntityKind::Area
        | EntityKind::City
        | EntityKind::Settlement
        | EntityKind::Street => serde_json::from_str(doc).map(Entity::Geography),
        EntityKind::OrganizationFounder => {
            serde_json::from_str(doc).map(Entity::OrganizationFounder)
        }
        EntityKind::OrganizationManager => {
            serde_json::from_str(doc).map(Entity::OrganizationManager)
        }
        EntityKind::OrganizationOkved => serde_json::from_str(doc).map(Entity::OrganizationOkved),
        EntityKind::OrganizationAuthority => {
            serde_json::from_str(doc).map(Entity::OrganizationAuthority)
        }
        EntityKind::InnRecord => serde_json::from_str(doc).map(Entity::InnRecord),
    };
    decoded.map_err(|e| GraphError::Serialization(format!("Failed to decode {kind}: {e}")))
}
