use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T> = color_eyre::eyre::Result<T>;

/// Minimal unit used across crates to represent a single translatable string
/// pulled out of RimWorld XML (Defs or Keyed/LanguageData).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransUnit {
    /// Context key: defName text + normalized structural path for Defs,
    /// or the element tag verbatim for Keyed files.
    pub key: String,
    /// Source string (may be missing for keys detected without text)
    pub source: Option<String>,
    /// Path to the file where this unit comes from, relative to the scan root
    pub path: PathBuf,
    /// 1-based line number if available
    pub line: Option<u32>,
}

/// One parsed PO entry as consumed by the inject side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoEntry {
    pub key: String,
    /// Translated text (msgstr); empty means "not translated yet"
    pub value: String,
    /// Entry carried a `#, fuzzy` flag
    pub fuzzy: bool,
    /// Optional reference like "Defs/Weapons.xml:42"
    pub reference: Option<String>,
}

#[derive(Debug, Error)]
pub enum RimTransError {
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
