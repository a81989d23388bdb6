// Entity Models - two dimensions and one fact table
//
// Each entity has:
// - a load-ready row type matching its table's column order
// - a transformer that turns one raw CSV row into that row
//
// Load order is fixed: associado and agencia before transacoes,
// since transaction rows carry foreign keys into both.

pub mod associate;
pub mod branch;
pub mod keys;
pub mod transaction;

pub use associate::{AssociateRow, AssociateTransformer};
pub use branch::{BranchRow, BranchTransformer};
pub use keys::{derive_branch_id, BranchKey, BRANCH_KEY_SEPARATOR};
pub use transaction::{TransactionRow, TransactionTransformer};

use crate::error::Result;
use crate::normalizer::RecordNormalizer;
use crate::parser::RawRecord;
use std::fmt;

// ============================================================================
// ENTITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Associate,
    Branch,
    Transaction,
}

impl Entity {
    /// Dependency order for a load run
    pub const LOAD_ORDER: [Entity; 3] = [Entity::Associate, Entity::Branch, Entity::Transaction];

    /// Name used in the rule table, logs and the audit trail
    pub fn name(&self) -> &'static str {
        match self {
            Entity::Associate => "associado",
            Entity::Branch => "agencia",
            Entity::Transaction => "transacoes",
        }
    }

    pub fn from_name(name: &str) -> Option<Entity> {
        Entity::LOAD_ORDER.iter().copied().find(|e| e.name() == name)
    }

    /// Target table
    pub fn table(&self) -> &'static str {
        self.name()
    }

    pub fn is_dimension(&self) -> bool {
        !matches!(self, Entity::Transaction)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// LOAD ROW
// ============================================================================

/// Transformer output, one variant per target table
#[derive(Debug, Clone, PartialEq)]
pub enum LoadRow {
    Associate(AssociateRow),
    Branch(BranchRow),
    Transaction(TransactionRow),
}

impl LoadRow {
    /// Natural key, where the table has one
    pub fn key(&self) -> Option<&str> {
        match self {
            LoadRow::Associate(row) => Some(row.tax_id.as_str()),
            LoadRow::Branch(row) => Some(row.branch_id.as_str()),
            LoadRow::Transaction(_) => None,
        }
    }
}

// ============================================================================
// TRANSFORMER TRAIT
// ============================================================================

/// Turns one raw CSV row of an entity into a load-ready row.
///
/// Steps, in order: required columns, type coercion, key derivation,
/// field sanitization, assembly.
pub trait EntityTransformer: Send + Sync {
    fn entity(&self) -> Entity;

    /// CSV headers the transformer reads
    fn required_columns(&self) -> &'static [&'static str];

    /// Key to report in error messages, if the raw row has one
    fn row_key(&self, record: &RawRecord) -> Option<String>;

    fn transform(&self, record: &RawRecord, normalizer: &RecordNormalizer<'_>) -> Result<LoadRow>;
}

/// Transformer for an entity
pub fn get_transformer(entity: Entity) -> Box<dyn EntityTransformer> {
    match entity {
        Entity::Associate => Box::new(AssociateTransformer),
        Entity::Branch => Box::new(BranchTransformer),
        Entity::Transaction => Box::new(TransactionTransformer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_names_round_trip() {
        for entity in Entity::LOAD_ORDER {
            assert_eq!(Entity::from_name(entity.name()), Some(entity));
            assert_eq!(get_transformer(entity).entity(), entity);
        }
        assert_eq!(Entity::from_name("cartoes"), None);
    }

    #[test]
    fn test_fact_table_loads_last() {
        assert_eq!(Entity::LOAD_ORDER.last(), Some(&Entity::Transaction));
        assert!(Entity::LOAD_ORDER[..2].iter().all(Entity::is_dimension));
    }
}
