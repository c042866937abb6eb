//! Filename classification for intake documents.
//!
//! Every resolucion is named `<category>-<sequence>-<fiscal year>.pdf`, e.g.
//! `1-000123-2024.pdf`. The name is the only metadata the intake has, so
//! classification is a pure function of the filename and the current year.

use std::fmt;
use std::path::Path;

use chrono::Datelike;

/// Width of the category token in the staged filename layout.
pub const CATEGORY_WIDTH: usize = 1;
/// Width of the sequence token in the staged filename layout.
pub const SEQUENCE_WIDTH: usize = 6;
/// Width of the fiscal year token in the staged filename layout.
pub const YEAR_WIDTH: usize = 4;

/// A filename that passed classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub category: String,
    pub sequence_id: String,
    pub fiscal_year: i32,
    pub original_filename: String,
    // Year as written, leading zeros included
    year_token: String,
    extension: Option<String>,
}

impl ParsedDocument {
    /// The fiscal year exactly as it appears in the filename. Archive
    /// directories and database keys use this, not the parsed number.
    pub fn year_token(&self) -> &str {
        &self.year_token
    }

    /// Rebuilds the canonical `category-sequence-year.ext` name used in the
    /// staging table.
    pub fn staged_filename(&self) -> String {
        match &self.extension {
            Some(ext) => format!(
                "{}-{}-{}.{}",
                self.category, self.sequence_id, self.year_token, ext
            ),
            None => format!(
                "{}-{}-{}",
                self.category, self.sequence_id, self.year_token
            ),
        }
    }

    /// Whether the staged filename matches the fixed-width layout the
    /// database transform slices by offset.
    pub fn fits_fixed_width(&self) -> bool {
        self.category.chars().count() == CATEGORY_WIDTH
            && self.sequence_id.chars().count() == SEQUENCE_WIDTH
            && self.year_token.chars().count() == YEAR_WIDTH
    }

    /// The `(category, sequence, year)` key identifying a master row.
    pub fn key(&self) -> (String, String, String) {
        (
            self.category.clone(),
            self.sequence_id.clone(),
            self.year_token.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// The stem does not split into exactly three non-empty tokens.
    MalformedName { tokens: usize },
    /// The year token is not numeric or lies in the future.
    YearOutOfRange { token: String },
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::MalformedName { tokens } => {
                write!(f, "formato incorrecto: {} segmentos", tokens)
            }
            InvalidReason::YearOutOfRange { token } => {
                write!(f, "ejercicio no valido: '{}'", token)
            }
        }
    }
}

/// A filename that failed classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDocument {
    pub filename: String,
    pub reason: InvalidReason,
}

/// Classifies a bare filename against the current calendar year.
pub fn classify(filename: &str) -> Result<ParsedDocument, InvalidDocument> {
    classify_with_year(filename, chrono::Local::now().year())
}

/// Classifies a bare filename against an explicit `current_year`.
pub fn classify_with_year(
    filename: &str,
    current_year: i32,
) -> Result<ParsedDocument, InvalidDocument> {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_string());

    let invalid = |reason| InvalidDocument {
        filename: filename.to_string(),
        reason,
    };

    let tokens: Vec<&str> = stem.split('-').collect();
    if tokens.len() != 3 || tokens.iter().any(|t| t.is_empty()) {
        return Err(invalid(InvalidReason::MalformedName {
            tokens: tokens.len(),
        }));
    }

    let year_token = tokens[2];
    let year_out_of_range = || {
        invalid(InvalidReason::YearOutOfRange {
            token: year_token.to_string(),
        })
    };

    if !year_token.chars().all(|c| c.is_ascii_digit()) {
        return Err(year_out_of_range());
    }
    // All-digit tokens only fail to parse on overflow, which is certainly future.
    let fiscal_year: i32 = year_token.parse().map_err(|_| year_out_of_range())?;
    if fiscal_year > current_year {
        return Err(year_out_of_range());
    }

    Ok(ParsedDocument {
        category: tokens[0].to_string(),
        sequence_id: tokens[1].to_string(),
        fiscal_year,
        original_filename: filename.to_string(),
        year_token: year_token.to_string(),
        extension,
    })
}
