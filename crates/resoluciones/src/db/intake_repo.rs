//! Staging tables: `intake_files` holds the batch's filenames, `intake_keys`
//! the key triples sliced out of them.

use rusqlite::{params, Connection, Row};

use super::DatabaseError;
use crate::document::{CATEGORY_WIDTH, SEQUENCE_WIDTH, YEAR_WIDTH};

/// A row of `intake_files`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeFileRow {
    pub archivo: String,
}

/// A row of `intake_keys`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeKeyRow {
    pub letra: String,
    pub actuacion: String,
    pub ejercicio: String,
}

impl IntakeKeyRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            letra: row.get("letra")?,
            actuacion: row.get("actuacion")?,
            ejercicio: row.get("ejercicio")?,
        })
    }
}

/// 1-based `(start, length)` of each token in `category-sequence-year.ext`.
pub const fn key_offsets() -> [(usize, usize); 3] {
    [
        (1, CATEGORY_WIDTH),
        (CATEGORY_WIDTH + 2, SEQUENCE_WIDTH),
        (CATEGORY_WIDTH + SEQUENCE_WIDTH + 3, YEAR_WIDTH),
    ]
}

/// Empties both staging tables.
pub fn clear(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch("DELETE FROM intake_files; DELETE FROM intake_keys;")?;
    Ok(())
}

pub fn insert_file(conn: &Connection, row: &IntakeFileRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO intake_files (archivo) VALUES (?1)",
        params![row.archivo],
    )?;
    Ok(())
}

/// Fills `intake_keys` by slicing every staged filename at the fixed offsets.
/// Returns the number of rows derived.
pub fn derive_keys(conn: &Connection) -> Result<usize, DatabaseError> {
    let [(l_start, l_len), (a_start, a_len), (e_start, e_len)] = key_offsets();
    let sql = format!(
        "INSERT INTO intake_keys (letra, actuacion, ejercicio)
         SELECT SUBSTR(archivo, {}, {}), SUBSTR(archivo, {}, {}), SUBSTR(archivo, {}, {})
         FROM intake_files",
        l_start, l_len, a_start, a_len, e_start, e_len
    );
    Ok(conn.execute(&sql, [])?)
}

pub fn list_files(conn: &Connection) -> Result<Vec<IntakeFileRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT archivo FROM intake_files ORDER BY rowid")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(IntakeFileRow {
                archivo: row.get("archivo")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_keys(conn: &Connection) -> Result<Vec<IntakeKeyRow>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT letra, actuacion, ejercicio FROM intake_keys ORDER BY rowid")?;
    let rows = stmt
        .query_map([], IntakeKeyRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
