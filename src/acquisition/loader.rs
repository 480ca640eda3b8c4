//! CSV batch loader.
//!
//! Parses a header row, resolves each column case-insensitively against the
//! recognized schema, and ignores anything it does not know (machine-type
//! specific vendor columns are common). Numeric cells that fail to parse are
//! treated as missing and counted in the profile; validation decides later
//! whether the batch is usable.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use crate::error::LoadError;
use crate::types::{Column, ColumnPresence, DataProfile, MachineDataset, MachineRecord};

/// Load a machine telemetry batch from a CSV file.
pub fn load_csv(path: &Path) -> Result<MachineDataset, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let reader = BufReader::new(file);

    let mut lines = reader.lines();
    let header_line = loop {
        match lines.next() {
            Some(Ok(line)) if !line.trim().is_empty() => break line,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(LoadError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
            None => return Err(LoadError::MissingHeader),
        }
    };

    let header: Vec<&str> = header_line.split(',').collect();
    let mut column_map: Vec<Option<Column>> = Vec::with_capacity(header.len());
    let mut columns = ColumnPresence::new();
    let mut recognized = Vec::new();
    let mut ignored = Vec::new();

    for cell in &header {
        match Column::from_header(cell) {
            Some(col) => {
                column_map.push(Some(col));
                columns.insert(col);
                recognized.push(col.name().to_string());
            }
            None => {
                column_map.push(None);
                ignored.push(cell.trim().to_string());
            }
        }
    }

    if !columns.has(Column::MachineId) {
        return Err(LoadError::MissingIdentity);
    }

    let mut machines = Vec::new();
    let mut unparsable_cells = 0usize;

    for line in lines {
        let line = line.map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let mut record = MachineRecord::default();
        for (cell, mapped) in line.split(',').zip(&column_map) {
            let Some(column) = mapped else { continue };
            let cell = cell.trim();
            match column {
                Column::MachineId => record.machine_id = cell.to_string(),
                Column::MachineType => record.machine_type = cell.to_string(),
                numeric => {
                    if cell.is_empty() {
                        continue;
                    }
                    match cell.parse::<f64>() {
                        Ok(v) => record.set_value(*numeric, Some(v)),
                        Err(_) => {
                            unparsable_cells += 1;
                            debug!(column = numeric.name(), value = cell, "Unparsable numeric cell");
                        }
                    }
                }
            }
        }
        machines.push(record);
    }

    let profile = DataProfile {
        row_count: machines.len(),
        recognized_columns: recognized,
        ignored_columns: ignored,
        unparsable_cells,
    };

    info!(
        path = %path.display(),
        rows = profile.row_count,
        recognized = profile.recognized_columns.len(),
        ignored = profile.ignored_columns.len(),
        unparsable = profile.unparsable_cells,
        "Batch loaded"
    );

    Ok(MachineDataset {
        machines,
        columns,
        profile,
    })
}
