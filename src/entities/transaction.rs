// 💳 Card Transaction - fact table `transacoes`
// References associado by tax id and agencia by composite key

use super::keys::derive_branch_id;
use super::{Entity, EntityTransformer, LoadRow};
use crate::error::Result;
use crate::normalizer::RecordNormalizer;
use crate::parser::{parse_amount, parse_timestamp, RawRecord};
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;

pub const COLUMNS: &[&str] = &[
    "num_plastico",
    "dat_transacao",
    "vlr_transacao",
    "nom_modalidade",
    "nom_cidade_estabelecimento",
    "num_cpf_cnpj",
    "cod_cooperativa",
    "cod_agencia",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub card_number: String,
    pub transacted_at: NaiveDateTime,
    pub amount: BigDecimal,
    pub modality: String,
    pub city: String,
    /// FK → associado.num_cpf_cnpj
    pub associate_id: String,
    /// FK → agencia.agencia_id
    pub branch_id: String,
}

pub struct TransactionTransformer;

impl EntityTransformer for TransactionTransformer {
    fn entity(&self) -> Entity {
        Entity::Transaction
    }

    fn required_columns(&self) -> &'static [&'static str] {
        COLUMNS
    }

    fn row_key(&self, _record: &RawRecord) -> Option<String> {
        // surrogate key, assigned by the database
        None
    }

    fn transform(&self, record: &RawRecord, normalizer: &RecordNormalizer<'_>) -> Result<LoadRow> {
        let entity = Entity::Transaction;
        record.require_all(entity, COLUMNS)?;

        let transacted_at =
            parse_timestamp("dat_transacao", record.require(entity, "dat_transacao")?)?;
        let amount = parse_amount("vlr_transacao", record.require(entity, "vlr_transacao")?)?;

        let key = derive_branch_id(
            normalizer,
            record.require(entity, "cod_cooperativa")?,
            record.require(entity, "cod_agencia")?,
        )?;

        let fields = normalizer.normalized(entity, record.fields())?;
        let field = |column: &str| fields.get(column).cloned().unwrap_or_default();

        Ok(LoadRow::Transaction(TransactionRow {
            card_number: field("num_plastico"),
            transacted_at,
            amount,
            modality: field("nom_modalidade"),
            city: field("nom_cidade_estabelecimento"),
            associate_id: field("num_cpf_cnpj"),
            branch_id: key.branch_id,
        }))
    }
}
