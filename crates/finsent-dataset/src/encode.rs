//! Reading raw news rows, encoding them, and the encoded CSV format.

use std::path::Path;

use finsent_core::{EncodedRow, Error, LabelMap, LabeledExample, RawRow, Result};
use tracing::{debug, info};

use crate::clean::clean_text;

/// Reads the raw `text,label` CSV.
pub fn read_raw_rows(path: &Path) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(path)?;

    let rows = reader
        .deserialize::<RawRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Err(Error::Dataset(format!("No rows found in {}", path.display())));
    }
    info!("Read {} raw rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Cleans every row and replaces its label by its index in the fitted map.
///
/// Row order is preserved.
pub fn encode_rows(rows: &[RawRow]) -> Result<(Vec<EncodedRow>, LabelMap)> {
    let labels = LabelMap::fit(rows.iter().map(|r| r.label.as_str()));
    info!("Label mapping: {}", labels);

    let encoded = rows
        .iter()
        .map(|row| {
            let label = labels.encode(&row.label)?;
            Ok(EncodedRow::new(clean_text(&row.text), label))
        })
        .collect::<Result<Vec<_>>>()?;

    let empty = encoded.iter().filter(|r| r.text.is_empty()).count();
    if empty > 0 {
        debug!("{} rows are empty after cleaning", empty);
    }
    Ok((encoded, labels))
}

pub fn write_encoded_rows(path: &Path, rows: &[EncodedRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {} encoded rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn read_encoded_rows(path: &Path) -> Result<Vec<EncodedRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize::<EncodedRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    debug!("Read {} encoded rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Attaches source row indices to encoded rows, checking labels against the map.
pub fn to_examples(rows: Vec<EncodedRow>, labels: &LabelMap) -> Result<Vec<LabeledExample>> {
    rows.into_iter()
        .enumerate()
        .map(|(row, encoded)| {
            if encoded.label >= labels.len() {
                return Err(Error::Dataset(format!(
                    "Row {row} has label index {} but only {} labels are known",
                    encoded.label,
                    labels.len()
                )));
            }
            Ok(LabeledExample {
                row,
                text: encoded.text,
                label: encoded.label,
            })
        })
        .collect()
}
