//! Master table operations.

use rusqlite::{params, Connection, Row};

use super::DatabaseError;

/// Prefix marking OCR/extracted content in `extracto`.
pub const EXTRACTION_MARKER: &str = "Reconocimiento optico de caracteres:";

pub const LABEL_PRESIDENCIA: &str = "RESOLUCION DE PRESIDENCIA";
pub const LABEL_DIRECTORIO: &str = "RESOLUCION DE DIRECTORIO";
pub const LABEL_JUBILACIONES: &str = "DISPOSICION DE JUBILACIONES";

// Fixed classification of every row created by the intake.
pub const BOCA: i64 = 2;
pub const ESTADO: &str = "N";
pub const FOLIO: i64 = 1;
pub const ORIGEN_NOMENC: i64 = 100180;
pub const SUBTRAMITE: i64 = 900999;

/// A row of `maestro`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaestroRow {
    pub id: i64,
    pub boca: i64,
    pub letra: String,
    pub actuacion: String,
    pub ejercicio: String,
    pub apeynom: Option<String>,
    pub extracto: Option<String>,
    pub fech_alta: String,
    pub estado: String,
    pub folio: i64,
    pub origen_nomenc: i64,
    pub subtramite: i64,
}

impl MaestroRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            boca: row.get("boca")?,
            letra: row.get("letra")?,
            actuacion: row.get("actuacion")?,
            ejercicio: row.get("ejercicio")?,
            apeynom: row.get("apeynom")?,
            extracto: row.get("extracto")?,
            fech_alta: row.get("fech_alta")?,
            estado: row.get("estado")?,
            folio: row.get("folio")?,
            origen_nomenc: row.get("origen_nomenc")?,
            subtramite: row.get("subtramite")?,
        })
    }
}

/// The `apeynom` label for a category code.
pub fn category_label(category: &str) -> &'static str {
    match category {
        "1" => LABEL_PRESIDENCIA,
        "2" => LABEL_DIRECTORIO,
        _ => LABEL_JUBILACIONES,
    }
}

/// The `extracto` a freshly inserted row carries until text is backfilled.
pub fn placeholder_extracto() -> String {
    format!("{} ", EXTRACTION_MARKER)
}

/// Folds newly extracted `text` into an existing `extracto`.
///
/// Content already carrying the marker is kept and the text appended after
/// it; anything else is replaced by the marker followed by the text.
pub fn merge_extracto(existing: Option<&str>, text: &str) -> String {
    match existing {
        Some(current) if current.contains(EXTRACTION_MARKER) => {
            format!("{} {}", current.trim(), text)
        }
        _ => format!("{} {}", EXTRACTION_MARKER, text),
    }
}

/// Inserts one master row per distinct staged key that has none yet.
/// Returns the number of rows created.
///
/// The `apeynom` CASE is fed from [`category_label`], so the SQL and the
/// Rust mapping cannot drift apart.
pub fn insert_missing_from_keys(conn: &Connection) -> Result<usize, DatabaseError> {
    let inserted = conn.execute(
        "INSERT INTO maestro
            (boca, letra, actuacion, ejercicio, apeynom, extracto, fech_alta,
             estado, folio, origen_nomenc, subtramite)
         SELECT ?1, a.letra, a.actuacion, a.ejercicio,
                CASE WHEN a.letra = '1' THEN ?2
                     WHEN a.letra = '2' THEN ?3
                     ELSE ?4 END,
                ?5, datetime('now', 'localtime'), ?6, ?7, ?8, ?9
         FROM (SELECT DISTINCT letra, actuacion, ejercicio FROM intake_keys) a
         WHERE NOT EXISTS (
             SELECT 1 FROM maestro b
             WHERE b.letra = a.letra AND b.actuacion = a.actuacion AND b.ejercicio = a.ejercicio
         )",
        params![
            BOCA,
            category_label("1"),
            category_label("2"),
            category_label(""),
            placeholder_extracto(),
            ESTADO,
            FOLIO,
            ORIGEN_NOMENC,
            SUBTRAMITE,
        ],
    )?;
    Ok(inserted)
}

pub fn find_by_key(
    conn: &Connection,
    letra: &str,
    actuacion: &str,
    ejercicio: &str,
) -> Result<Vec<MaestroRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM maestro WHERE letra = ?1 AND actuacion = ?2 AND ejercicio = ?3
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![letra, actuacion, ejercicio], MaestroRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Overwrites `extracto` of one row. Returns the number of rows changed.
pub fn update_extracto(conn: &Connection, id: i64, extracto: &str) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE maestro SET extracto = ?1 WHERE id = ?2",
        params![extracto, id],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::intake_repo::{self, IntakeFileRow};
    use crate::db::Database;

    fn stage(conn: &Connection, names: &[&str]) -> Result<(), DatabaseError> {
        intake_repo::clear(conn)?;
        for name in names {
            intake_repo::insert_file(
                conn,
                &IntakeFileRow {
                    archivo: name.to_string(),
                },
            )?;
        }
        intake_repo::derive_keys(conn)?;
        Ok(())
    }

    #[test]
    fn test_category_label() {
        assert_eq!(category_label("1"), LABEL_PRESIDENCIA);
        assert_eq!(category_label("2"), LABEL_DIRECTORIO);
        assert_eq!(category_label("3"), LABEL_JUBILACIONES);
        assert_eq!(category_label("J"), LABEL_JUBILACIONES);
    }

    #[test]
    fn test_merge_extracto_initializes_without_marker() {
        assert_eq!(
            merge_extracto(None, "texto"),
            "Reconocimiento optico de caracteres: texto"
        );
        assert_eq!(
            merge_extracto(Some("cargado a mano"), "texto"),
            "Reconocimiento optico de caracteres: texto"
        );
    }

    #[test]
    fn test_merge_extracto_appends_after_marker() {
        let first = merge_extracto(Some(&placeholder_extracto()), "uno");
        assert_eq!(first, "Reconocimiento optico de caracteres: uno");

        let second = merge_extracto(Some(&first), "dos");
        assert_eq!(second, "Reconocimiento optico de caracteres: uno dos");
        assert_eq!(second.matches(EXTRACTION_MARKER).count(), 1);
    }

    #[test]
    fn test_insert_missing_creates_labelled_rows() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            stage(conn, &["1-000123-2024.pdf", "2-000456-2023.pdf", "5-000789-2022.pdf"])?;
            assert_eq!(insert_missing_from_keys(conn)?, 3);

            let row = &find_by_key(conn, "1", "000123", "2024")?[0];
            assert_eq!(row.apeynom.as_deref(), Some(LABEL_PRESIDENCIA));
            assert_eq!(row.extracto.as_deref(), Some(placeholder_extracto().as_str()));
            assert_eq!(row.boca, BOCA);
            assert_eq!(row.estado, ESTADO);
            assert_eq!(row.origen_nomenc, ORIGEN_NOMENC);
            assert_eq!(row.subtramite, SUBTRAMITE);

            let row = &find_by_key(conn, "2", "000456", "2023")?[0];
            assert_eq!(row.apeynom.as_deref(), Some(LABEL_DIRECTORIO));
            let row = &find_by_key(conn, "5", "000789", "2022")?[0];
            assert_eq!(row.apeynom.as_deref(), Some(LABEL_JUBILACIONES));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_inserted_labels_follow_category_label() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            stage(
                conn,
                &[
                    "1-000001-2024.pdf",
                    "2-000002-2024.pdf",
                    "3-000003-2024.pdf",
                    "9-000009-2024.pdf",
                ],
            )?;
            insert_missing_from_keys(conn)?;

            let keys = [("1", "000001"), ("2", "000002"), ("3", "000003"), ("9", "000009")];
            for (letra, actuacion) in keys {
                let row = &find_by_key(conn, letra, actuacion, "2024")?[0];
                assert_eq!(row.apeynom.as_deref(), Some(category_label(letra)), "{}", letra);
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_insert_missing_is_idempotent_per_key() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            stage(conn, &["1-000123-2024.pdf"])?;
            assert_eq!(insert_missing_from_keys(conn)?, 1);

            stage(conn, &["1-000123-2024.pdf", "1-000124-2024.pdf"])?;
            assert_eq!(insert_missing_from_keys(conn)?, 1);

            assert_eq!(find_by_key(conn, "1", "000123", "2024")?.len(), 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_update_extracto() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            stage(conn, &["1-000123-2024.pdf"])?;
            insert_missing_from_keys(conn)?;
            let id = find_by_key(conn, "1", "000123", "2024")?[0].id;

            assert_eq!(update_extracto(conn, id, "nuevo")?, 1);
            assert_eq!(update_extracto(conn, id + 100, "nada")?, 0);

            let row = &find_by_key(conn, "1", "000123", "2024")?[0];
            assert_eq!(row.extracto.as_deref(), Some("nuevo"));
            Ok(())
        })
        .unwrap();
    }
}
