use std::path::Path;

use polars::prelude::{Column, DataFrame, DataType};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::frame::{ColumnBuffer, days_to_date, frame_from_buffers};
use crate::schema::{ColumnType, Destination, quote_ident};

/// SQLite-backed destination store, one table per record family.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// `(name, declared type)` for every column of `name`, in order.
    pub fn declared_columns(&self, name: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(name)))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn row_count(&self, name: &str) -> Result<usize> {
        if !self.table_exists(name)? {
            return Err(PipelineError::MissingDestination(name.to_string()));
        }
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(name)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Creates (or recreates) empty destination tables.
    pub fn init_tables(&mut self, destinations: &[Destination]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for dest in destinations {
            tx.execute_batch(&format!(
                "DROP TABLE IF EXISTS {};\n{};",
                quote_ident(&dest.name),
                dest.create_table_sql()
            ))?;
            info!(table = %dest.name, "initialized table");
        }
        tx.commit()?;
        Ok(())
    }

    /// Replaces every destination in `batch` inside one transaction.
    pub fn replace_all(&mut self, batch: &[(&Destination, &DataFrame)]) -> Result<Vec<usize>> {
        let tx = self.conn.transaction()?;
        let mut counts = Vec::with_capacity(batch.len());
        for (dest, df) in batch {
            tx.execute_batch(&format!(
                "DROP TABLE IF EXISTS {};\n{};",
                quote_ident(&dest.name),
                dest.create_table_sql()
            ))?;
            counts.push(insert_rows(&tx, dest, df)?);
        }
        tx.commit()?;
        Ok(counts)
    }

    /// Appends to every destination in `batch`, or to none of them. Each
    /// destination is checked before the first row is written.
    pub fn insert_all(&mut self, batch: &[(&Destination, &DataFrame)]) -> Result<Vec<usize>> {
        for (dest, _) in batch {
            self.check_appendable(dest)?;
        }
        let tx = self.conn.transaction()?;
        let mut counts = Vec::with_capacity(batch.len());
        for (dest, df) in batch {
            counts.push(insert_rows(&tx, dest, df)?);
        }
        tx.commit()?;
        Ok(counts)
    }

    fn check_appendable(&self, dest: &Destination) -> Result<()> {
        if !self.table_exists(&dest.name)? {
            return Err(PipelineError::MissingDestination(dest.name.clone()));
        }
        let declared = self.declared_columns(&dest.name)?;
        let expected = dest
            .family
            .columns()
            .iter()
            .map(|c| (c.name.to_string(), c.ty.sql_type().to_string()))
            .collect::<Vec<_>>();
        let matches = declared.len() == expected.len()
            && declared
                .iter()
                .zip(&expected)
                .all(|(d, e)| d.0 == e.0 && d.1.eq_ignore_ascii_case(&e.1));
        if !matches {
            return Err(PipelineError::schema(
                dest.name.clone(),
                format!("destination declares {declared:?}, expected {expected:?}"),
            ));
        }
        Ok(())
    }

    /// Reads the destination back typed by its family schema, in insertion order.
    pub fn read_table(&self, dest: &Destination) -> Result<DataFrame> {
        if !self.table_exists(&dest.name)? {
            return Err(PipelineError::MissingDestination(dest.name.clone()));
        }
        let columns = dest.family.columns();
        let select = columns
            .iter()
            .map(|c| quote_ident(c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {select} FROM {} ORDER BY rowid",
            quote_ident(&dest.name)
        ))?;

        let mut buffers = columns
            .iter()
            .map(|c| ColumnBuffer::new(c.ty, 0))
            .collect::<Vec<_>>();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (idx, (col, buffer)) in columns.iter().zip(&mut buffers).enumerate() {
                push_sql(buffer, row.get_ref(idx)?, col.name)?;
            }
        }
        frame_from_buffers(columns.iter().map(|c| c.name).zip(buffers).collect())
    }

    /// Copies `source` into `backup_<source>`, replacing any earlier backup.
    pub fn backup(&mut self, source: &str) -> Result<String> {
        if !self.table_exists(source)? {
            return Err(PipelineError::MissingDestination(source.to_string()));
        }
        let backup = format!("backup_{source}");
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {b};\nCREATE TABLE {b} AS SELECT * FROM {s};",
            b = quote_ident(&backup),
            s = quote_ident(source)
        ))?;
        tx.commit()?;
        Ok(backup)
    }
}

// `df` is conformed, so its columns line up with the family schema.
fn insert_rows(conn: &Connection, dest: &Destination, df: &DataFrame) -> Result<usize> {
    let defs = dest.family.columns();
    let columns = defs
        .iter()
        .map(|c| quote_ident(c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=defs.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let values = defs
        .iter()
        .map(|def| sql_values(df.column(def.name)?, def.ty))
        .collect::<Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote_ident(&dest.name)
    ))?;
    for row in 0..df.height() {
        stmt.execute(params_from_iter(values.iter().map(|column| &column[row])))?;
    }
    Ok(df.height())
}

fn sql_values(column: &Column, ty: ColumnType) -> Result<Vec<SqlValue>> {
    let series = column.as_materialized_series();
    let values = match ty {
        ColumnType::Integer => series
            .i64()?
            .into_iter()
            .map(|v| v.map_or(SqlValue::Null, SqlValue::Integer))
            .collect(),
        ColumnType::Float => series
            .f64()?
            .into_iter()
            .map(|v| v.map_or(SqlValue::Null, SqlValue::Real))
            .collect(),
        ColumnType::Text => series
            .str()?
            .into_iter()
            .map(|v| v.map_or(SqlValue::Null, |s| SqlValue::Text(s.to_string())))
            .collect(),
        ColumnType::Boolean => series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(SqlValue::Null, |b| SqlValue::Integer(i64::from(b))))
            .collect(),
        ColumnType::Date => {
            let days = series.cast(&DataType::Int32)?;
            days.i32()?
                .into_iter()
                .map(|v| match v.and_then(days_to_date) {
                    Some(date) => SqlValue::Text(date.format("%Y-%m-%d").to_string()),
                    None => SqlValue::Null,
                })
                .collect()
        }
    };
    Ok(values)
}

fn push_sql(buffer: &mut ColumnBuffer, raw: ValueRef<'_>, column: &str) -> Result<()> {
    if let ValueRef::Text(bytes) = raw
        && matches!(buffer, ColumnBuffer::Date(_))
    {
        return buffer.push_raw(column, &String::from_utf8_lossy(bytes));
    }
    let ty = buffer.column_type();
    match (buffer, raw) {
        (buffer, ValueRef::Null) => buffer.push_null(),
        (ColumnBuffer::Int(v), ValueRef::Integer(x)) => v.push(Some(x)),
        (ColumnBuffer::Float(v), ValueRef::Integer(x)) => v.push(Some(x as f64)),
        (ColumnBuffer::Float(v), ValueRef::Real(x)) => v.push(Some(x)),
        (ColumnBuffer::Bool(v), ValueRef::Integer(x)) => v.push(Some(x != 0)),
        (ColumnBuffer::Text(v), ValueRef::Text(bytes)) => {
            v.push(Some(String::from_utf8_lossy(bytes).into_owned()))
        }
        (_, other) => {
            return Err(PipelineError::InvalidValue {
                column: column.to_string(),
                value: format!("{other:?}"),
                ty,
            });
        }
    }
    Ok(())
}
