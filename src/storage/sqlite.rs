use crate::model::{Commodity, CommodityDimension, NormalizedRecord, StorageError};
use rusqlite::{params, Connection};

/// Relational sink for the normalizer output.
pub struct SqliteStorage {
    conn: Connection,
}

/// Rows actually written by one [`SqliteStorage::write_normalized`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkSummary {
    pub commodities: usize,
    /// Names absent from the new dimension but still referenced by stored facts.
    pub retained: usize,
    pub inserted: usize,
    pub skipped: usize,
}

impl SqliteStorage {
    /// Opens the database file and creates the tables if they do not exist yet.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS commodities_processados (
                id INTEGER PRIMARY KEY,
                nome TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS registros_processados (
                commodity_id INTEGER NOT NULL,
                commodity TEXT NOT NULL,
                data TEXT NOT NULL,
                preco REAL NOT NULL,
                regiao TEXT NOT NULL,
                quantidade REAL NOT NULL,
                cidade TEXT NOT NULL,
                estado TEXT,
                dia INTEGER NOT NULL,
                mes INTEGER NOT NULL,
                ano INTEGER NOT NULL,
                UNIQUE (commodity, data, preco, regiao, quantidade)
            );
            ",
        )?;
        Ok(Self { conn })
    }

    /// Replaces the dimension table and upserts the fact rows by natural key,
    /// all in one transaction. Rerunning with the same rows inserts nothing,
    /// whatever ids the rerun assigned.
    ///
    /// Names that only older facts still use are appended after the highest
    /// id, and every stored fact is then pointed at the id of its own name.
    pub fn write_normalized(
        &mut self,
        dimension: &CommodityDimension,
        records: &[NormalizedRecord],
    ) -> Result<SinkSummary, StorageError> {
        let tx = self.conn.transaction()?;
        let mut summary = SinkSummary::default();

        tx.execute("DELETE FROM commodities_processados", [])?;
        {
            let mut insert_dim =
                tx.prepare("INSERT INTO commodities_processados (id, nome) VALUES (?1, ?2)")?;
            for commodity in dimension.entries() {
                insert_dim.execute(params![commodity.id, commodity.name])?;
                summary.commodities += 1;
            }

            let retained = {
                let mut stmt = tx.prepare(
                    "SELECT DISTINCT commodity FROM registros_processados
                     WHERE commodity NOT IN (SELECT nome FROM commodities_processados)
                     ORDER BY commodity ASC",
                )?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                names
            };
            let mut append_dim = tx.prepare(
                "INSERT INTO commodities_processados (id, nome)
                 SELECT COALESCE(MAX(id), 0) + 1, ?1 FROM commodities_processados",
            )?;
            for name in &retained {
                append_dim.execute(params![name])?;
            }
            summary.retained = retained.len();

            let mut upsert_fact = tx.prepare(
                "INSERT INTO registros_processados (
                    commodity_id, commodity, data, preco, regiao, quantidade,
                    cidade, estado, dia, mes, ano
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT (commodity, data, preco, regiao, quantidade) DO NOTHING",
            )?;
            for record in records {
                let changed = upsert_fact.execute(params![
                    record.commodity_id,
                    record.commodity,
                    record.date,
                    record.price,
                    record.region,
                    record.quantity,
                    record.city,
                    record.state,
                    record.day,
                    record.month,
                    record.year,
                ])?;
                if changed == 0 {
                    summary.skipped += 1;
                } else {
                    summary.inserted += changed;
                }
            }
        }

        tx.execute(
            "UPDATE registros_processados
             SET commodity_id = (
                 SELECT c.id FROM commodities_processados c
                 WHERE c.nome = registros_processados.commodity
             )",
            [],
        )?;

        tx.commit()?;
        Ok(summary)
    }

    pub fn load_dimension(&self) -> Result<CommodityDimension, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, nome FROM commodities_processados ORDER BY id ASC")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(Commodity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CommodityDimension::from_entries(entries))
    }

    pub fn count_records(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM registros_processados", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// All fact rows, oldest first.
    #[cfg(test)]
    pub fn load_records(&self) -> Result<Vec<NormalizedRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT commodity_id, commodity, data, preco, regiao, quantidade,
                    cidade, estado, dia, mes, ano
             FROM registros_processados
             ORDER BY data ASC, rowid ASC",
        )?;
        let records = stmt
            .query_map([], Self::map_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    #[cfg(test)]
    fn map_record(row: &rusqlite::Row) -> Result<NormalizedRecord, rusqlite::Error> {
        let date: chrono::NaiveDate = row.get(2)?;
        Ok(NormalizedRecord {
            commodity_id: row.get(0)?,
            commodity: row.get(1)?,
            date,
            price: row.get(3)?,
            region: row.get(4)?,
            quantity: row.get(5)?,
            city: row.get(6)?,
            state: row.get(7)?,
            day: row.get(8)?,
            month: row.get(9)?,
            year: row.get(10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawPriceRecord;
    use crate::normalizer::normalize_all;

    fn raw(commodity: &str, date: &str, price: &str, region: &str, quantity: &str) -> RawPriceRecord {
        RawPriceRecord {
            commodity: commodity.into(),
            date: date.into(),
            price: price.into(),
            region: region.into(),
            quantity: quantity.into(),
            ..RawPriceRecord::default()
        }
    }

    fn sample() -> Vec<RawPriceRecord> {
        vec![
            raw("SOJA", "2024-01-05", "150,00", "Campinas/SP", "1000"),
            raw("MILHO", "2024-01-06", "70,00", "Paraná", "500"),
            raw("SOJA", "2024-02-03", "160,00", "Campinas/SP", "1200"),
        ]
    }

    #[test]
    fn writes_dimension_and_facts() {
        let out = normalize_all(&sample());
        let mut storage = SqliteStorage::in_memory().unwrap();
        let summary = storage.write_normalized(&out.commodities, &out.records).unwrap();

        assert_eq!(
            summary,
            SinkSummary { commodities: 2, retained: 0, inserted: 3, skipped: 0 }
        );
        assert_eq!(storage.load_dimension().unwrap(), out.commodities);
        assert_eq!(storage.load_records().unwrap(), out.records);
    }

    #[test]
    fn rerun_does_not_duplicate_facts() {
        let out = normalize_all(&sample());
        let mut storage = SqliteStorage::in_memory().unwrap();
        storage.write_normalized(&out.commodities, &out.records).unwrap();
        let second = storage.write_normalized(&out.commodities, &out.records).unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 3);
        assert_eq!(storage.count_records().unwrap(), 3);
        assert_eq!(storage.load_dimension().unwrap().len(), 2);
    }

    #[test]
    fn reordered_rerun_matches_facts_by_name() {
        let mut storage = SqliteStorage::in_memory().unwrap();
        let first = normalize_all(&[
            raw("SOJA", "2024-01-05", "150", "Santos/SP", "1"),
            raw("MILHO", "2024-01-05", "70", "Santos/SP", "1"),
        ]);
        storage.write_normalized(&first.commodities, &first.records).unwrap();

        let second = normalize_all(&[
            raw("MILHO", "2024-01-05", "70", "Santos/SP", "1"),
            raw("SOJA", "2024-01-05", "150", "Santos/SP", "1"),
        ]);
        assert_eq!(second.commodities.id_of("MILHO"), Some(1));
        let summary = storage.write_normalized(&second.commodities, &second.records).unwrap();

        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(storage.count_records().unwrap(), 2);

        let dim = storage.load_dimension().unwrap();
        for record in storage.load_records().unwrap() {
            assert_eq!(dim.id_of(&record.commodity), Some(record.commodity_id));
            let expected = if record.commodity == "SOJA" { 150.0 } else { 70.0 };
            assert_eq!(record.price, expected);
        }
    }

    #[test]
    fn dimension_is_replaced_but_keeps_names_in_use() {
        let mut storage = SqliteStorage::in_memory().unwrap();
        let first = normalize_all(&sample());
        storage.write_normalized(&first.commodities, &first.records).unwrap();

        let second = normalize_all(&[raw("TRIGO", "2024-03-01", "1000", "Cascavel/PR", "10")]);
        let summary = storage.write_normalized(&second.commodities, &second.records).unwrap();
        assert_eq!(summary.retained, 2);

        let dim = storage.load_dimension().unwrap();
        assert_eq!(dim.len(), 3);
        assert_eq!(dim.id_of("TRIGO"), Some(1));
        assert_eq!(dim.id_of("MILHO"), Some(2));
        assert_eq!(dim.id_of("SOJA"), Some(3));

        let records = storage.load_records().unwrap();
        assert_eq!(records.len(), 4);
        assert!(records
            .iter()
            .all(|r| dim.id_of(&r.commodity) == Some(r.commodity_id)));
    }

    #[test]
    fn dimension_drops_names_no_fact_uses() {
        let mut storage = SqliteStorage::in_memory().unwrap();
        let mut dim = CommodityDimension::new();
        dim.assign("SOJA");
        dim.assign("ALGODAO");
        storage.write_normalized(&dim, &[]).unwrap();

        let out = normalize_all(&[raw("TRIGO", "2024-03-01", "1000", "Cascavel/PR", "10")]);
        storage.write_normalized(&out.commodities, &out.records).unwrap();
        assert_eq!(storage.load_dimension().unwrap(), out.commodities);
    }

    #[test]
    fn file_database_persists_between_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agro.db");
        let path = path.to_str().unwrap();
        let out = normalize_all(&sample());
        {
            let mut storage = SqliteStorage::new(path).unwrap();
            storage.write_normalized(&out.commodities, &out.records).unwrap();
        }
        let reopened = SqliteStorage::new(path).unwrap();
        assert_eq!(reopened.count_records().unwrap(), 3);
    }
}
