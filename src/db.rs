use crate::config::DatabaseConfig;
use crate::entities::{AssociateRow, BranchRow, Entity, LoadRow, TransactionRow};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DATE_STORAGE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// BATCH
// ============================================================================

/// Rows of one entity, in file order, persisted together
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub entity: Entity,
    pub rows: Vec<LoadRow>,
}

impl Batch {
    pub fn new(entity: Entity) -> Self {
        Batch {
            entity,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// LOAD EVENT (audit trail)
// ============================================================================

/// One entry per finished entity load
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoadEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl LoadEvent {
    pub fn new(event_type: &str, entity: Entity, data: serde_json::Value, actor: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity: entity.name().to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// LOADER
// ============================================================================

/// Persistence boundary. The caller decides batch size; a loader must keep
/// row order within a batch.
pub trait Loader {
    /// Persist every row of the batch or none of them
    fn persist(&mut self, batch: &Batch) -> Result<usize>;

    /// Record an audit event; loaders without an audit trail ignore it
    fn record_event(&mut self, _event: &LoadEvent) -> Result<()> {
        Ok(())
    }
}

/// SQLite loader: one SQL transaction per batch
pub struct SqliteLoader {
    conn: Connection,
}

impl SqliteLoader {
    /// Open the database file and make sure the schema exists
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let conn = Connection::open(&config.path)?;
        setup_database(&conn, config.wal)?;
        Ok(SqliteLoader { conn })
    }

    /// Wrap an existing connection (schema must already be set up)
    pub fn from_connection(conn: Connection) -> Self {
        SqliteLoader { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Loader for SqliteLoader {
    fn persist(&mut self, batch: &Batch) -> Result<usize> {
        // rolled back on drop if any insert fails
        let tx = self.conn.transaction()?;

        for row in &batch.rows {
            match row {
                LoadRow::Associate(row) => insert_associate(&tx, row)?,
                LoadRow::Branch(row) => insert_branch(&tx, row)?,
                LoadRow::Transaction(row) => insert_transaction(&tx, row)?,
            }
        }

        tx.commit()?;
        debug!(entity = %batch.entity, rows = batch.len(), "batch committed");
        Ok(batch.len())
    }

    fn record_event(&mut self, event: &LoadEvent) -> Result<()> {
        insert_event(&self.conn, event)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection, wal: bool) -> Result<()> {
    // SQLite leaves FK enforcement off unless asked
    conn.pragma_update(None, "foreign_keys", "ON")?;

    if wal {
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }

    // ==========================================================================
    // Dimension: associado
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS associado (
            num_cpf_cnpj VARCHAR(15) PRIMARY KEY NOT NULL,
            des_nome_associado VARCHAR(255),
            dat_associacao DATE,
            cod_faixa_renda VARCHAR(10),
            des_faixa_renda VARCHAR(100)
        )",
        [],
    )?;

    // ==========================================================================
    // Dimension: agencia (agencia_id = cod_cooperativa-cod_agencia)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS agencia (
            agencia_id VARCHAR(20) PRIMARY KEY NOT NULL,
            cod_cooperativa VARCHAR(10),
            cod_agencia VARCHAR(10),
            des_nome_cooperativa VARCHAR(255),
            des_nome_agencia VARCHAR(255)
        )",
        [],
    )?;

    // ==========================================================================
    // Fact: transacoes
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transacoes (
            transacao_id INTEGER PRIMARY KEY AUTOINCREMENT,
            num_plastico VARCHAR(20),
            dat_transacao TIMESTAMP,
            vlr_transacao NUMERIC,
            nom_modalidade VARCHAR(10),
            nom_cidade_estabelecimento VARCHAR(100),
            associado_id VARCHAR(15) REFERENCES associado(num_cpf_cnpj),
            agencia_id VARCHAR(20) REFERENCES agencia(agencia_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Load audit trail
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS load_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transacoes_associado ON transacoes(associado_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transacoes_agencia ON transacoes(agencia_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// INSERTS
// ============================================================================

fn insert_associate(conn: &Connection, row: &AssociateRow) -> Result<()> {
    conn.execute(
        "INSERT INTO associado (
            num_cpf_cnpj, des_nome_associado, dat_associacao, cod_faixa_renda, des_faixa_renda
        ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            row.tax_id,
            row.name,
            row.association_date.format(DATE_STORAGE_FORMAT).to_string(),
            row.income_bracket_code,
            row.income_bracket_label,
        ],
    )?;
    Ok(())
}

fn insert_branch(conn: &Connection, row: &BranchRow) -> Result<()> {
    conn.execute(
        "INSERT INTO agencia (
            agencia_id, cod_cooperativa, cod_agencia, des_nome_cooperativa, des_nome_agencia
        ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            row.branch_id,
            row.cooperative_code,
            row.branch_code,
            row.cooperative_name,
            row.branch_name,
        ],
    )?;
    Ok(())
}

fn insert_transaction(conn: &Connection, row: &TransactionRow) -> Result<()> {
    conn.execute(
        "INSERT INTO transacoes (
            num_plastico, dat_transacao, vlr_transacao, nom_modalidade,
            nom_cidade_estabelecimento, associado_id, agencia_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            row.card_number,
            row.transacted_at.format(TIMESTAMP_STORAGE_FORMAT).to_string(),
            row.amount.to_string(),
            row.modality,
            row.city,
            row.associate_id,
            row.branch_id,
        ],
    )?;
    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &LoadEvent) -> Result<()> {
    let data_json = event.data.to_string();

    conn.execute(
        "INSERT INTO load_events (
            event_id, timestamp, event_type, entity, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

// ============================================================================
// QUERIES
// ============================================================================

/// Audit events for an entity, oldest first
pub fn get_events_for_entity(conn: &Connection, entity: Entity) -> Result<Vec<LoadEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity, data, actor
         FROM load_events
         WHERE entity = ?1
         ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![entity.name()], |row| {
        let timestamp: String = row.get(1)?;
        let data: String = row.get(4)?;
        Ok(LoadEvent {
            event_id: row.get(0)?,
            timestamp: DateTime::parse_from_rfc3339(&timestamp)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                })?,
            event_type: row.get(2)?,
            entity: row.get(3)?,
            data: serde_json::from_str(&data).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
            })?,
            actor: row.get(5)?,
        })
    })?;

    let mut events = Vec::new();
    for event in rows {
        events.push(event?);
    }
    Ok(events)
}

/// Row count of an entity's table
pub fn count_rows(conn: &Connection, entity: Entity) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", entity.table());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn setup() -> SqliteLoader {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn, false).unwrap();
        SqliteLoader::from_connection(conn)
    }

    fn associate(tax_id: &str) -> LoadRow {
        LoadRow::Associate(AssociateRow {
            tax_id: tax_id.to_string(),
            name: "ANA".to_string(),
            association_date: NaiveDate::from_ymd_opt(2023, 12, 25).unwrap(),
            income_bracket_code: "1".to_string(),
            income_bracket_label: "Até 1 salário".to_string(),
        })
    }

    fn branch(branch_id: &str) -> LoadRow {
        LoadRow::Branch(BranchRow {
            branch_id: branch_id.to_string(),
            cooperative_code: "0007".to_string(),
            branch_code: "0001".to_string(),
            cooperative_name: "SICOOB".to_string(),
            branch_name: "MATRIZ".to_string(),
        })
    }

    fn transaction(associate_id: &str, branch_id: &str) -> LoadRow {
        LoadRow::Transaction(TransactionRow {
            card_number: "5502".to_string(),
            transacted_at: NaiveDate::from_ymd_opt(2023, 12, 25)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
            amount: BigDecimal::from_str("150.75").unwrap(),
            modality: "Credito".to_string(),
            city: "Porto Alegre".to_string(),
            associate_id: associate_id.to_string(),
            branch_id: branch_id.to_string(),
        })
    }

    fn batch(entity: Entity, rows: Vec<LoadRow>) -> Batch {
        Batch { entity, rows }
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn, false).unwrap();
        setup_database(&conn, false).unwrap();

        for entity in Entity::LOAD_ORDER {
            assert_eq!(count_rows(&conn, entity).unwrap(), 0);
        }
    }

    #[test]
    fn test_persist_dimensions_then_fact() {
        let mut loader = setup();

        loader
            .persist(&batch(Entity::Associate, vec![associate("12345678901")]))
            .unwrap();
        loader
            .persist(&batch(Entity::Branch, vec![branch("0007-0001")]))
            .unwrap();
        let inserted = loader
            .persist(&batch(
                Entity::Transaction,
                vec![transaction("12345678901", "0007-0001")],
            ))
            .unwrap();
        assert_eq!(inserted, 1);

        let conn = loader.connection();
        let (date, amount, agencia_id): (String, f64, String) = conn
            .query_row(
                "SELECT dat_transacao, vlr_transacao, agencia_id FROM transacoes",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(date, "2023-12-25 14:30:00");
        assert!((amount - 150.75).abs() < 1e-9);
        assert_eq!(agencia_id, "0007-0001");

        let assoc_date: String = conn
            .query_row("SELECT dat_associacao FROM associado", [], |row| row.get(0))
            .unwrap();
        assert_eq!(assoc_date, "2023-12-25");
    }

    #[test]
    fn test_foreign_key_violation_is_database_error() {
        let mut loader = setup();

        let err = loader
            .persist(&batch(
                Entity::Transaction,
                vec![transaction("missing", "0000-0000")],
            ))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Database);
        assert_eq!(count_rows(loader.connection(), Entity::Transaction).unwrap(), 0);
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let mut loader = setup();

        // third row repeats the first row's primary key
        let err = loader
            .persist(&batch(
                Entity::Associate,
                vec![associate("1"), associate("2"), associate("1")],
            ))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Database);
        assert_eq!(count_rows(loader.connection(), Entity::Associate).unwrap(), 0);
    }

    #[test]
    fn test_autoincrement_follows_insert_order() {
        let mut loader = setup();
        loader.persist(&batch(Entity::Associate, vec![associate("1")])).unwrap();
        loader.persist(&batch(Entity::Branch, vec![branch("0007-0001")])).unwrap();

        let mut rows = Vec::new();
        for i in 0..3 {
            let LoadRow::Transaction(mut t) = transaction("1", "0007-0001") else {
                unreachable!()
            };
            t.card_number = format!("card-{}", i);
            rows.push(LoadRow::Transaction(t));
        }
        loader.persist(&batch(Entity::Transaction, rows)).unwrap();

        let mut stmt = loader
            .connection()
            .prepare("SELECT num_plastico FROM transacoes ORDER BY transacao_id")
            .unwrap();
        let cards: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(cards, vec!["card-0", "card-1", "card-2"]);
    }

    #[test]
    fn test_event_log() {
        let mut loader = setup();

        let event = LoadEvent::new(
            "entity_loaded",
            Entity::Branch,
            serde_json::json!({"loaded": 3, "rejected": 0}),
            "csv_loader",
        );
        loader.record_event(&event).unwrap();

        let events = get_events_for_entity(loader.connection(), Entity::Branch).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, event.event_id);
        assert_eq!(events[0].event_type, "entity_loaded");
        assert_eq!(events[0].data["loaded"], 3);

        assert!(get_events_for_entity(loader.connection(), Entity::Associate)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_corrupt_event_row_is_database_error() {
        let loader = setup();
        let conn = loader.connection();

        conn.execute(
            "INSERT INTO load_events (event_id, timestamp, event_type, entity, data, actor)
             VALUES ('e1', 'not-a-date', 'entity_loaded', 'agencia', '{\"loaded\": 1}', 'csv_loader')",
            [],
        )
        .unwrap();
        let err = get_events_for_entity(conn, Entity::Branch).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Database);

        conn.execute(
            "INSERT INTO load_events (event_id, timestamp, event_type, entity, data, actor)
             VALUES ('e2', '2026-01-01T00:00:00+00:00', 'entity_loaded', 'associado', '{broken', 'csv_loader')",
            [],
        )
        .unwrap();
        let err = get_events_for_entity(conn, Entity::Associate).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Database);
    }
}
