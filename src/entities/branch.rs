// 🏦 Branch - dimension table `agencia`
// Primary key is the composite cooperative/branch code

use super::keys::derive_branch_id;
use super::{Entity, EntityTransformer, LoadRow};
use crate::error::Result;
use crate::normalizer::RecordNormalizer;
use crate::parser::RawRecord;

pub const COLUMNS: &[&str] = &[
    "cod_cooperativa",
    "cod_agencia",
    "des_nome_cooperativa",
    "des_nome_agencia",
];

#[derive(Debug, Clone, PartialEq)]
pub struct BranchRow {
    /// `<cooperative>-<branch>`, both zero padded
    pub branch_id: String,
    pub cooperative_code: String,
    pub branch_code: String,
    pub cooperative_name: String,
    pub branch_name: String,
}

pub struct BranchTransformer;

impl EntityTransformer for BranchTransformer {
    fn entity(&self) -> Entity {
        Entity::Branch
    }

    fn required_columns(&self) -> &'static [&'static str] {
        COLUMNS
    }

    fn row_key(&self, record: &RawRecord) -> Option<String> {
        let cooperative = record.get("cod_cooperativa")?;
        let branch = record.get("cod_agencia")?;
        Some(format!("{}/{}", cooperative, branch))
    }

    fn transform(&self, record: &RawRecord, normalizer: &RecordNormalizer<'_>) -> Result<LoadRow> {
        record.require_all(Entity::Branch, COLUMNS)?;

        let key = derive_branch_id(
            normalizer,
            record.require(Entity::Branch, "cod_cooperativa")?,
            record.require(Entity::Branch, "cod_agencia")?,
        )?;

        let cooperative_name = normalizer.normalize_value(
            Entity::Branch,
            "des_nome_cooperativa",
            record.require(Entity::Branch, "des_nome_cooperativa")?,
        )?;
        let branch_name = normalizer.normalize_value(
            Entity::Branch,
            "des_nome_agencia",
            record.require(Entity::Branch, "des_nome_agencia")?,
        )?;

        Ok(LoadRow::Branch(BranchRow {
            branch_id: key.branch_id,
            cooperative_code: key.cooperative_code,
            branch_code: key.branch_code,
            cooperative_name,
            branch_name,
        }))
    }
}
