//! Write statements for the entity graph.
//!
//! Inserts use CREATE. Each node carries its key text in `_key`, and the
//! constraints from [`crate::schema`] reject a second node with the same key.
//! Relationships to the entities an inserted entity references are MERGEd, so
//! edges are idempotent.

use serde_json::{Map, Value};

use regsync_core::{EdgeType, Entity, NaturalKey};

use crate::client::GraphError;
use crate::queries::{key_text, match_clause, Statement, DOCUMENT_PROPERTY, KEY_PROPERTY};

/// Serialize the entity's own fields.
pub fn entity_document(entity: &Entity) -> Result<Value, GraphError> {
    let value = match entity {
        Entity::Organization(e) => serde_json::to_value(e),
        Entity::Person(e) => serde_json::to_value(e),
        Entity::ForeignOrganization(e) => serde_json::to_value(e),
        Entity::Founder(e) | Entity::Manager(e) => serde_json::to_value(e),
        Entity::Authority(e) => serde_json::to_value(e),
        Entity::Okved(e) => serde_json::to_value(e),
        Entity::Document(e) => serde_json::to_value(e),
        Entity::License(e) => serde_json::to_value(e),
        Entity::RegistrySmb(e) => serde_json::to_value(e),
        Entity::Finance(e) => serde_json::to_value(e),
        Entity::Address(e) => serde_json::to_value(e),
        Entity::Geography(e) => serde_json::to_value(e),
        Entity::OrganizationFounder(e) => serde_json::to_value(e),
        Entity::OrganizationManager(e) => serde_json::to_value(e),
        Entity::OrganizationOkved(e) => serde_json::to_value(e),
        Entity::OrganizationAuthority(e) => serde_json::to_value(e),
        Entity::InnRecord(e) => serde_json::to_value(e),
    };
    value.map_err(|e| GraphError::Serialization(format!("Failed to encode {}: {e}", entity.kind())))
}

/// Flat node properties: the document's fields with key parts overwritten by
/// their canonical text, so lookups match exactly what was written, plus the
/// whole key under `_key`.
pub fn node_properties(entity: &Entity) -> Result<(String, String), GraphError> {
    let document = entity_document(entity)?;
    let doc_json = document.to_string();

    let mut props = match document {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (property, value) in entity.key().components() {
        props.insert(property.to_string(), value.map_or(Value::Null, Value::String));
    }
    props.insert(KEY_PROPERTY.to_string(), Value::String(key_text(&entity.key())));

    Ok((Value::Object(props).to_string(), doc_json))
}

/// CREATE the node, then MERGE one relationship per referenced entity.
pub fn insert_statements(entity: &Entity) -> Result<Vec<Statement>, GraphError> {
    let label = entity.kind().label();
    let (props, doc) = node_properties(entity)?;

    let mut statements = vec![Statement {
        cypher: format!(
            "CREATE (n:{label}) \
             SET n = apoc.convert.fromJsonMap($props), n.{DOCUMENT_PROPERTY} = $doc"
        ),
        params: vec![("props".to_string(), props), ("doc".to_string(), doc)],
    }];

    let source = entity.key();
    for (edge, target) in entity.references() {
        statements.push(edge_statement(&source, edge, &target));
    }
    Ok(statements)
}

/// Overwrite the properties of the node identified by the entity's key.
pub fn update_statement(entity: &Entity) -> Result<Statement, GraphError> {
    let (props, doc) = node_properties(entity)?;
    let (clause, mut params) = match_clause("n", &entity.key());
    params.push(("props".to_string(), props));
    params.push(("doc".to_string(), doc));

    Ok(Statement {
        cypher: format!(
            "{clause} SET n += apoc.convert.fromJsonMap($props), n.{DOCUMENT_PROPERTY} = $doc"
        ),
        params,
    })
}

/// Relationship from `source` to `target`. Missing endpoints produce no edge.
pub fn edge_statement(source: &NaturalKey, edge: EdgeType, target: &NaturalKey) -> Statement {
    let (from, mut params) = match_clause("a", source);
    let (to, target_params) = match_clause("b", target);
    params.extend(target_params);

    Statement {
        cypher: format!("{from} {to} MERGE (a)-[:{}]->(b)", edge.as_cypher()),
        params,
    }
}
