// 🏷️ Sanitization Rules - Rules as Data
// Static (entity, column) → ordered operator list, validated once at startup

use crate::entities::Entity;
use crate::error::{EtlError, Result};
use crate::operators::Operator;
use std::collections::HashMap;

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// One sanitization rule as written in the build-time table
#[derive(Debug, Clone, Copy)]
pub struct RuleDef {
    pub entity: &'static str,
    pub column: &'static str,
    /// Applied left to right
    pub operators: &'static [&'static str],
}

/// Build-time rule table.
///
/// Order inside `operators` matters: `reencode` must run before
/// `strip_diacritics_and_symbols` or the mis-decoded bytes are lost.
pub const BUILTIN_RULES: &[RuleDef] = &[
    RuleDef {
        entity: "associado",
        column: "des_nome_associado",
        operators: &["uppercase"],
    },
    RuleDef {
        entity: "agencia",
        column: "cod_cooperativa",
        operators: &["zero_pad"],
    },
    RuleDef {
        entity: "agencia",
        column: "cod_agencia",
        operators: &["zero_pad"],
    },
    RuleDef {
        entity: "agencia",
        column: "des_nome_cooperativa",
        operators: &["uppercase"],
    },
    RuleDef {
        entity: "agencia",
        column: "des_nome_agencia",
        operators: &["uppercase"],
    },
    RuleDef {
        entity: "transacoes",
        column: "nom_modalidade",
        operators: &["reencode", "strip_diacritics_and_symbols"],
    },
];

// ============================================================================
// RULE TABLE
// ============================================================================

/// Immutable, validated rule table. Built once and passed by reference.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<Entity, HashMap<String, Vec<Operator>>>,
}

impl RuleTable {
    /// The compiled-in table
    pub fn builtin() -> Result<Self> {
        RuleTable::from_defs(BUILTIN_RULES)
    }

    /// Resolve entity and operator names.
    /// Unknown names and duplicate columns are configuration errors.
    pub fn from_defs(defs: &[RuleDef]) -> Result<Self> {
        let mut rules: HashMap<Entity, HashMap<String, Vec<Operator>>> = HashMap::new();

        for def in defs {
            let entity = Entity::from_name(def.entity).ok_or_else(|| {
                EtlError::Configuration(format!("unknown entity '{}' in rule table", def.entity))
            })?;

            let operators = def
                .operators
                .iter()
                .map(|name| {
                    Operator::from_name(name).ok_or_else(|| {
                        EtlError::Configuration(format!(
                            "unknown operator '{}' for {}.{}",
                            name, def.entity, def.column
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let columns = rules.entry(entity).or_default();
            if columns.insert(def.column.to_string(), operators).is_some() {
                return Err(EtlError::Configuration(format!(
                    "duplicate rule for {}.{}",
                    def.entity, def.column
                )));
            }
        }

        Ok(RuleTable { rules })
    }

    /// Operators configured for a column, if any
    pub fn operators(&self, entity: Entity, column: &str) -> Option<&[Operator]> {
        self.rules
            .get(&entity)
            .and_then(|columns| columns.get(column))
            .map(Vec::as_slice)
    }

    /// Columns with rules for an entity
    pub fn columns(&self, entity: Entity) -> impl Iterator<Item = (&str, &[Operator])> {
        self.rules
            .get(&entity)
            .into_iter()
            .flat_map(|columns| columns.iter())
            .map(|(column, ops)| (column.as_str(), ops.as_slice()))
    }

    /// Total number of column rules
    pub fn rule_count(&self) -> usize {
        self.rules.values().map(HashMap::len).sum()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builtin_table_is_valid() {
        let table = RuleTable::builtin().unwrap();
        assert_eq!(table.rule_count(), BUILTIN_RULES.len());
        assert_eq!(
            table.operators(Entity::Branch, "cod_cooperativa"),
            Some(&[Operator::ZeroPad][..])
        );
        assert_eq!(table.operators(Entity::Associate, "num_cpf_cnpj"), None);
    }

    #[test]
    fn test_operator_order_preserved() {
        let table = RuleTable::builtin().unwrap();
        assert_eq!(
            table.operators(Entity::Transaction, "nom_modalidade"),
            Some(&[Operator::Reencode, Operator::StripDiacriticsAndSymbols][..])
        );
    }

    #[test]
    fn test_unknown_operator_is_configuration_error() {
        let defs = [RuleDef {
            entity: "agencia",
            column: "cod_agencia",
            operators: &["zero_pad", "zfill"],
        }];

        let err = RuleTable::from_defs(&defs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("zfill"));
    }

    #[test]
    fn test_unknown_entity_is_configuration_error() {
        let defs = [RuleDef {
            entity: "cartao",
            column: "num_plastico",
            operators: &["uppercase"],
        }];

        let err = RuleTable::from_defs(&defs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let defs = [
            RuleDef {
                entity: "associado",
                column: "des_nome_associado",
                operators: &["uppercase"],
            },
            RuleDef {
                entity: "associado",
                column: "des_nome_associado",
                operators: &["zero_pad"],
            },
        ];

        assert!(RuleTable::from_defs(&defs).is_err());
    }

    #[test]
    fn test_columns_for_entity() {
        let table = RuleTable::builtin().unwrap();
        let mut columns: Vec<&str> = table.columns(Entity::Branch).map(|(c, _)| c).collect();
        columns.sort();
        assert_eq!(
            columns,
            vec!["cod_agencia", "cod_cooperativa", "des_nome_agencia", "des_nome_cooperativa"]
        );
        assert_eq!(table.columns(Entity::Transaction).count(), 1);
    }
}
