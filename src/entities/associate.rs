// 👤 Associate - dimension table `associado`
// Keyed by CPF/CNPJ tax id

use super::{Entity, EntityTransformer, LoadRow};
use crate::error::Result;
use crate::normalizer::RecordNormalizer;
use crate::parser::{parse_date, RawRecord};
use chrono::NaiveDate;

pub const COLUMNS: &[&str] = &[
    "num_cpf_cnpj",
    "des_nome_associado",
    "dat_associacao",
    "cod_faixa_renda",
    "des_faixa_renda",
];

#[derive(Debug, Clone, PartialEq)]
pub struct AssociateRow {
    pub tax_id: String,
    pub name: String,
    pub association_date: NaiveDate,
    pub income_bracket_code: String,
    pub income_bracket_label: String,
}

pub struct AssociateTransformer;

impl EntityTransformer for AssociateTransformer {
    fn entity(&self) -> Entity {
        Entity::Associate
    }

    fn required_columns(&self) -> &'static [&'static str] {
        COLUMNS
    }

    fn row_key(&self, record: &RawRecord) -> Option<String> {
        record.get("num_cpf_cnpj").map(str::to_string)
    }

    fn transform(&self, record: &RawRecord, normalizer: &RecordNormalizer<'_>) -> Result<LoadRow> {
        record.require_all(Entity::Associate, COLUMNS)?;

        let association_date = parse_date(
            "dat_associacao",
            record.require(Entity::Associate, "dat_associacao")?,
        )?;

        let fields = normalizer.normalized(Entity::Associate, record.fields())?;
        let field = |column: &str| fields.get(column).cloned().unwrap_or_default();

        Ok(LoadRow::Associate(AssociateRow {
            tax_id: field("num_cpf_cnpj"),
            name: field("des_nome_associado"),
            association_date,
            income_bracket_code: field("cod_faixa_renda"),
            income_bracket_label: field("des_faixa_renda"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::rules::RuleTable;

    fn associate_record() -> RawRecord {
        RawRecord::from_pairs(
            2,
            &[
                ("num_cpf_cnpj", "12345678901"),
                ("des_nome_associado", "maria da conceição"),
                ("dat_associacao", "25/12/2023"),
                ("cod_faixa_renda", "3"),
                ("des_faixa_renda", "De 2 a 5 salários"),
            ],
        )
    }

    #[test]
    fn test_transform_associate() {
        let rules = RuleTable::builtin().unwrap();
        let normalizer = RecordNormalizer::new(&rules);

        let row = AssociateTransformer.transform(&associate_record(), &normalizer).unwrap();
        let LoadRow::Associate(row) = row else {
            panic!("expected associate row");
        };

        assert_eq!(row.tax_id, "12345678901");
        assert_eq!(row.name, "MARIA DA CONCEIÇÃO");
        assert_eq!(row.association_date, NaiveDate::from_ymd_opt(2023, 12, 25).unwrap());
        assert_eq!(row.income_bracket_code, "3");
        assert_eq!(row.income_bracket_label, "De 2 a 5 salários");
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let rules = RuleTable::builtin().unwrap();
        let normalizer = RecordNormalizer::new(&rules);

        let record = RawRecord::from_pairs(
            2,
            &[("num_cpf_cnpj", "1"), ("des_nome_associado", "ana"), ("dat_associacao", "01/01/2020")],
        );
        let err = AssociateTransformer.transform(&record, &normalizer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(err.to_string().contains("cod_faixa_renda"));
    }

    #[test]
    fn test_bad_date_is_invalid_date() {
        let rules = RuleTable::builtin().unwrap();
        let normalizer = RecordNormalizer::new(&rules);

        let record = RawRecord::from_pairs(
            2,
            &[
                ("num_cpf_cnpj", "1"),
                ("des_nome_associado", "ana"),
                ("dat_associacao", "2023-12-25"),
                ("cod_faixa_renda", "1"),
                ("des_faixa_renda", "x"),
            ],
        );

        let err = AssociateTransformer.transform(&record, &normalizer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDate);
        assert_eq!(AssociateTransformer.row_key(&record), Some("1".to_string()));
    }
}
