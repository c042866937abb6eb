//! Builders for test configurations and PDF fixtures.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object, Stream};

use resoluciones::config::{Config, DatabaseConfig};

/// Builder for `Config` instances rooted in a test directory.
pub struct ConfigBuilder {
    root: PathBuf,
    cleanup_days: u32,
    progress_steps: Vec<u8>,
    database_path: Option<PathBuf>,
}

impl ConfigBuilder {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            cleanup_days: 60,
            progress_steps: vec![10, 25, 50, 75, 100],
            database_path: None,
        }
    }

    pub fn cleanup_days(mut self, days: u32) -> Self {
        self.cleanup_days = days;
        self
    }

    pub fn progress_steps(mut self, steps: Vec<u8>) -> Self {
        self.progress_steps = steps;
        self
    }

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.database_path = Some(path);
        self
    }

    /// Lays the directories out like the production deployment: the backup
    /// directory nested inside the processed directory.
    pub fn build(self) -> Config {
        let processed_dir = self.root.join("Procesados");
        Config {
            temp_dir: self.root.join("Temp"),
            backup_dir: processed_dir.join("PDFs_BK"),
            processed_dir,
            source_dir: self.root.join("Resoluciones_Temp"),
            target_dir: self.root.join("Resoluciones"),
            cleanup_days: self.cleanup_days,
            progress_steps: self.progress_steps,
            database: DatabaseConfig {
                path: self
                    .database_path
                    .unwrap_or_else(|| self.root.join("gestion.db")),
            },
        }
    }
}

/// A single-page PDF whose text layer contains `text`.
pub fn pdf_bytes(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });
    let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1_i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize PDF");
    bytes
}

/// Bytes that carry a `.pdf` name but no parseable document.
pub fn corrupted_pdf_bytes() -> Vec<u8> {
    b"%PDF-1.5\nthis scan was truncated".to_vec()
}
