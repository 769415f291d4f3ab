//! Uniqueness constraints for the entity graph.
//!
//! One constraint per label on the `_key` property. Concurrent writers of the
//! same natural key are serialized by the constraint's index: the later
//! `CREATE` fails once the first transaction commits.

use regsync_core::EntityKind;

use crate::queries::{Statement, KEY_PROPERTY};

/// Neo4j status code raised when a write breaks a uniqueness constraint.
pub const CONSTRAINT_VIOLATION_CODE: &str = "Neo.ClientError.Schema.ConstraintValidationFailed";

/// Idempotent `CREATE CONSTRAINT` for one label.
pub fn constraint_statement(kind: EntityKind) -> Statement {
    let label = kind.label();
    Statement {
        cypher: format!(
            "CREATE CONSTRAINT regsync_{}_key IF NOT EXISTS \
             FOR (n:{label}) REQUIRE n.{KEY_PROPERTY} IS UNIQUE",
            label.to_lowercase()
        ),
        params: Vec::new(),
    }
}

/// Constraints for every entity kind.
pub fn schema_statements() -> Vec<Statement> {
    EntityKind::ALL.into_iter().map(constraint_statement).collect()
}
