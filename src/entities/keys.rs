// 🔑 Composite branch key
// agencia_id = normalized cooperative code + "-" + normalized branch code

use super::Entity;
use crate::error::Result;
use crate::normalizer::RecordNormalizer;

pub const BRANCH_KEY_SEPARATOR: &str = "-";

pub const COOPERATIVE_COLUMN: &str = "cod_cooperativa";
pub const BRANCH_COLUMN: &str = "cod_agencia";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchKey {
    pub cooperative_code: String,
    pub branch_code: String,
    pub branch_id: String,
}

/// Normalize both codes with the agencia rules, then join them.
///
/// Branch and transaction rows both go through here so the primary key
/// and the foreign key match byte for byte. Padding happens before the
/// join, never after.
pub fn derive_branch_id(
    normalizer: &RecordNormalizer<'_>,
    cooperative_code: &str,
    branch_code: &str,
) -> Result<BranchKey> {
    let cooperative_code =
        normalizer.normalize_value(Entity::Branch, COOPERATIVE_COLUMN, cooperative_code)?;
    let branch_code = normalizer.normalize_value(Entity::Branch, BRANCH_COLUMN, branch_code)?;
    let branch_id = format!("{}{}{}", cooperative_code, BRANCH_KEY_SEPARATOR, branch_code);

    Ok(BranchKey {
        cooperative_code,
        branch_code,
        branch_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleTable;

    #[test]
    fn test_pads_before_joining() {
        let rules = RuleTable::builtin().unwrap();
        let normalizer = RecordNormalizer::new(&rules);

        let key = derive_branch_id(&normalizer, "1", "23").unwrap();
        assert_eq!(key.branch_id, "0001-0023");
        assert_eq!(key.cooperative_code, "0001");
        assert_eq!(key.branch_code, "0023");
    }

    #[test]
    fn test_already_padded_codes_unchanged() {
        let rules = RuleTable::builtin().unwrap();
        let normalizer = RecordNormalizer::new(&rules);

        assert_eq!(
            derive_branch_id(&normalizer, "0007", "0001").unwrap().branch_id,
            derive_branch_id(&normalizer, "7", "1").unwrap().branch_id
        );
        assert_eq!(
            derive_branch_id(&normalizer, "30123", "4").unwrap().branch_id,
            "30123-0004"
        );
    }
}
