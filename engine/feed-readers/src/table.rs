//! Delimited-text plumbing shared by the CSV readers

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::coerce::{clean_field, stat_key};
use crate::error::SourceError;

/// Validate a raw payload and return its text, minus any UTF-8 BOM
pub(crate) fn decode<'a>(source_id: &str, payload: &'a [u8]) -> Result<&'a str, SourceError> {
    let text = std::str::from_utf8(payload)
        .map_err(|error| SourceError::Encoding { source_id: source_id.to_string(), error })?;
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(SourceError::Empty { source_id: source_id.to_string() });
    }
    Ok(text)
}

pub(crate) fn reader(text: &str, has_headers: bool) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes())
}

/// Normalized header row with alias lookup
pub(crate) struct Header {
    keys: Vec<String>,
}

impl Header {
    pub(crate) fn read(source_id: &str, rdr: &mut csv::Reader<&[u8]>) -> Result<Self, SourceError> {
        let headers = rdr
            .headers()
            .map_err(|error| SourceError::Header { source_id: source_id.to_string(), error })?;
        Ok(Self { keys: headers.iter().map(stat_key).collect() })
    }

    /// First column matching any alias, in alias order
    pub(crate) fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| self.keys.iter().position(|k| k == alias))
    }

    pub(crate) fn require(&self, source_id: &str, aliases: &[&str]) -> Result<usize, SourceError> {
        self.find(aliases).ok_or_else(|| SourceError::MissingColumn {
            source_id: source_id.to_string(),
            column: aliases.first().copied().unwrap_or_default().to_string(),
        })
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = (usize, &str)> {
        self.keys.iter().enumerate().map(|(i, k)| (i, k.as_str()))
    }
}

pub(crate) fn field(record: &StringRecord, index: Option<usize>) -> &str {
    index.and_then(|i| record.get(i)).map(clean_field).unwrap_or("")
}

pub(crate) fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

pub(crate) fn raw_of(record: &StringRecord) -> String {
    record.iter().collect::<Vec<_>>().join(",")
}
