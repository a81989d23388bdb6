// 🧹 Record Normalizer
// Folds each configured column's operators over its current value

use crate::entities::Entity;
use crate::error::Result;
use crate::rules::RuleTable;
use std::collections::HashMap;

/// Column name → raw value, as read from one CSV row
pub type FieldMap = HashMap<String, String>;

#[derive(Debug, Clone, Copy)]
pub struct RecordNormalizer<'a> {
    rules: &'a RuleTable,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(rules: &'a RuleTable) -> Self {
        RecordNormalizer { rules }
    }

    /// Normalize a single value. Columns without a rule come back unchanged.
    pub fn normalize_value(&self, entity: Entity, column: &str, value: &str) -> Result<String> {
        let Some(operators) = self.rules.operators(entity, column) else {
            return Ok(value.to_string());
        };

        operators
            .iter()
            .try_fold(value.to_string(), |current, op| op.apply(&current))
    }

    /// Normalize every configured column present in `fields`, in place
    pub fn normalize(&self, entity: Entity, fields: &mut FieldMap) -> Result<()> {
        for (column, operators) in self.rules.columns(entity) {
            if let Some(value) = fields.get_mut(column) {
                let normalized = operators
                    .iter()
                    .try_fold(value.clone(), |current, op| op.apply(&current))?;
                *value = normalized;
            }
        }
        Ok(())
    }

    /// Copying variant of `normalize`
    pub fn normalized(&self, entity: Entity, fields: &FieldMap) -> Result<FieldMap> {
        let mut out = fields.clone();
        self.normalize(entity, &mut out)?;
        Ok(out)
    }
}

// ============================================================================
// TESTS
// ============================================================================
