//! Render configuration: an explicit struct of every recognized option.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Options are validated eagerly by `RenderConfig::validate`, before any
//! engine context is created, so a malformed configuration can never fail a
//! job partway through. Callback fields (importers, functions) are host
//! objects and are skipped by serde.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sassling_engine::{OutputStyle, Value};

use crate::error::RenderError;

/// Most indentation any engine accepts.
const MAX_INDENT_WIDTH: usize = 10;

/// Host importer callback: `(current_import_path, previous_import_path)`.
///
/// Invoked synchronously on the thread running the compile step, possibly
/// re-entrantly, zero or more times per job. Must not assume it runs on the
/// thread that started the job.
pub type ImporterCallback = Arc<dyn Fn(&str, &str) -> ImporterReply + Send + Sync>;

/// Host function callback, keyed by signature string in
/// [`RenderConfig::functions`]. Same threading contract as importers.
pub type FunctionCallback = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// What a host importer resolved an import to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImporterReply {
    /// Not handled; the engine tries the next importer, then its default
    /// file resolution.
    Pass,
    /// Redirect to another path, loaded through the engine's resolution.
    File(PathBuf),
    /// Literal content under a display name.
    Contents { file: String, contents: String },
    /// One-to-many resolved imports.
    Multiple(Vec<ImportEntry>),
    /// Fail the import (becomes a compile error).
    Error(String),
}

/// One entry of an [`ImporterReply::Multiple`] reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub file: String,
    pub contents: Option<String>,
}

/// Indentation character kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndentType {
    #[default]
    Space,
    Tab,
}

impl IndentType {
    pub(crate) fn ch(self) -> char {
        match self {
            IndentType::Space => ' ',
            IndentType::Tab => '\t',
        }
    }
}

impl std::str::FromStr for IndentType {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "space" => Ok(IndentType::Space),
            "tab" => Ok(IndentType::Tab),
            other => Err(RenderError::InvalidOption(format!(
                "unknown indent type: {:?}",
                other
            ))),
        }
    }
}

/// Line ending used in generated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linefeed {
    #[default]
    Lf,
    Cr,
    CrLf,
    LfCr,
}

impl Linefeed {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Linefeed::Lf => "\n",
            Linefeed::Cr => "\r",
            Linefeed::CrLf => "\r\n",
            Linefeed::LfCr => "\n\r",
        }
    }
}

impl std::str::FromStr for Linefeed {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lf" => Ok(Linefeed::Lf),
            "cr" => Ok(Linefeed::Cr),
            "crlf" => Ok(Linefeed::CrLf),
            "lfcr" => Ok(Linefeed::LfCr),
            other => Err(RenderError::InvalidOption(format!(
                "unknown linefeed: {:?}",
                other
            ))),
        }
    }
}

/// Configuration for one render job.
///
/// Immutable once compilation starts; the job layer snapshots everything it
/// needs into engine-owned or job-owned storage at bind time.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    /// Display path for inline-data compiles; also the base for relative
    /// import resolution.
    pub input_path: Option<PathBuf>,
    /// Where the output is intended to be written (used for source-map
    /// pathing; this crate does not write files itself).
    pub output_path: Option<PathBuf>,
    pub output_style: OutputStyle,
    /// 0..=10 repetitions of the indent character.
    pub indent_width: usize,
    pub indent_type: IndentType,
    pub linefeed: Linefeed,
    pub include_paths: Vec<PathBuf>,
    /// Fractional digits kept when numbers are serialized.
    pub precision: i32,
    pub source_map: Option<PathBuf>,
    pub source_map_root: Option<String>,
    pub source_map_embed: bool,
    pub source_map_contents: bool,
    pub omit_source_map_url: bool,
    pub indented_syntax: bool,
    pub source_comments: bool,
    /// Importers, in registration order. The *last* registration has the
    /// highest priority: engines try importers in reverse registration
    /// order, so later registrations override earlier ones.
    #[serde(skip)]
    pub importers: Vec<ImporterCallback>,
    /// Host functions keyed by signature string, e.g. `"double($n)"`.
    #[serde(skip)]
    pub functions: BTreeMap<String, FunctionCallback>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            input_path: None,
            output_path: None,
            output_style: OutputStyle::default(),
            indent_width: 2,
            indent_type: IndentType::default(),
            linefeed: Linefeed::default(),
            include_paths: Vec::new(),
            precision: 5,
            source_map: None,
            source_map_root: None,
            source_map_embed: false,
            source_map_contents: false,
            omit_source_map_url: false,
            indented_syntax: false,
            source_comments: false,
            importers: Vec::new(),
            functions: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("input_path", &self.input_path)
            .field("output_path", &self.output_path)
            .field("output_style", &self.output_style)
            .field("indent_width", &self.indent_width)
            .field("indent_type", &self.indent_type)
            .field("linefeed", &self.linefeed)
            .field("include_paths", &self.include_paths)
            .field("precision", &self.precision)
            .field("importers", &self.importers.len())
            .field("functions", &self.functions.len())
            .finish_non_exhaustive()
    }
}

impl RenderConfig {
    /// Validate the configuration. Called by the job layer before any
    /// engine context is created.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.indent_width > MAX_INDENT_WIDTH {
            return Err(RenderError::InvalidOption(format!(
                "indent width {} exceeds maximum of {}",
                self.indent_width, MAX_INDENT_WIDTH
            )));
        }
        if self.precision < 0 {
            return Err(RenderError::InvalidOption(format!(
                "precision must be non-negative, got {}",
                self.precision
            )));
        }
        for signature in self.functions.keys() {
            let name_end = signature.find('(').unwrap_or(signature.len());
            if signature[..name_end].trim().is_empty() {
                return Err(RenderError::InvalidOption(format!(
                    "function signature has no name: {:?}",
                    signature
                )));
            }
        }
        Ok(())
    }

    /// The indentation string the engine receives: the indent character
    /// repeated `indent_width` times.
    pub(crate) fn indent_string(&self) -> String {
        std::iter::repeat(self.indent_type.ch())
            .take(self.indent_width)
            .collect()
    }

    /// Include paths joined with the platform path-list separator.
    pub(crate) fn include_path_string(&self) -> Option<String> {
        if self.include_paths.is_empty() {
            return None;
        }
        let sep = if cfg!(windows) { ";" } else { ":" };
        Some(
            self.include_paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(sep),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RenderConfig::default();
        config.validate().unwrap();
        assert_eq!(config.indent_string(), "  ");
        assert_eq!(config.include_path_string(), None);
    }

    #[test]
    fn test_indent_width_cap() {
        let config = RenderConfig {
            indent_width: 11,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RenderError::InvalidOption(_)));
    }

    #[test]
    fn test_negative_precision_rejected() {
        let config = RenderConfig {
            precision: -1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tab_indent_string() {
        let config = RenderConfig {
            indent_width: 1,
            indent_type: IndentType::Tab,
            ..Default::default()
        };
        assert_eq!(config.indent_string(), "\t");
    }

    #[test]
    fn test_nameless_function_signature_rejected() {
        let mut config = RenderConfig::default();
        config.functions.insert(
            "($x)".to_string(),
            Arc::new(|_args: &[Value]| -> Result<Value, String> { Ok(Value::Null) }),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserializes_from_json() {
        let config: RenderConfig = serde_json::from_str(
            r#"{
                "outputStyle": "compressed",
                "indentWidth": 4,
                "indentType": "tab",
                "linefeed": "crlf",
                "precision": 3
            }"#,
        )
        .unwrap();
        assert_eq!(config.output_style, OutputStyle::Compressed);
        assert_eq!(config.indent_width, 4);
        assert_eq!(config.indent_type, IndentType::Tab);
        assert_eq!(config.linefeed, Linefeed::CrLf);
        assert_eq!(config.precision, 3);
    }
}
