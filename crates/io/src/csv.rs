// CSV record store: whole-file load, atomic whole-file save.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use rekap_core::{parse_score, Column, Field, Record, RecordStore, StoreError, StoreTable};

/// Store Accessor backed by a single comma-separated file with a header row.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file bytes for download, unmodified. `None` if no store exists yet.
    pub fn export_bytes(&self) -> Result<Option<Vec<u8>>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        fs::read(&self.path)
            .map(Some)
            .map_err(|e| StoreError::Io(format!("cannot read {}: {e}", self.path.display())))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.csv".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

impl RecordStore for CsvStore {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn load(&self) -> Result<StoreTable, StoreError> {
        if !self.path.exists() {
            return Ok(StoreTable::new());
        }
        let content = read_file_as_utf8(&self.path)?;
        parse_table(&content, &self.location())
    }

    fn save(&mut self, table: &StoreTable) -> Result<(), StoreError> {
        let bytes = write_table(table)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Io(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        // Atomic: write sibling .tmp, fsync, then rename over the store
        let tmp_path = self.temp_path();
        let written = fs::File::create(&tmp_path).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Io(format!("cannot write {}: {e}", tmp_path.display())));
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Io(format!(
                "cannot replace {}: {e}",
                self.path.display()
            )));
        }

        log::debug!("wrote {} rows to {}", table.len(), self.path.display());
        Ok(())
    }
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252 exports).
/// A leading byte-order mark is dropped.
pub fn read_file_as_utf8(path: &Path) -> Result<String, StoreError> {
    let mut file = fs::File::open(path)
        .map_err(|e| StoreError::Io(format!("cannot open {}: {e}", path.display())))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| StoreError::Io(format!("cannot read {}: {e}", path.display())))?;

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            log::warn!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Parse store text into a table. The header must resolve an id column.
pub fn parse_table(content: &str, location: &str) -> Result<StoreTable, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        location: location.to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| corrupt(format!("unreadable header: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(corrupt("missing header row".to_string()));
    }

    let columns = StoreTable::layout_from_headers(&headers);
    if !columns.iter().any(|c| c.field() == Some(Field::Id)) {
        return Err(corrupt(format!(
            "no id column (expected one of: {})",
            Field::Id.synonyms().join(", ")
        )));
    }

    let mut records: Vec<Record> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for result in reader.records() {
        let row = result.map_err(|e| corrupt(e.to_string()))?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        let mut record = Record::default();
        for (column, cell) in columns.iter().zip(row.iter()) {
            match column {
                Column::Field { field, .. } => match field {
                    Field::Id => record.id = cell.trim().to_string(),
                    Field::Name => {
                        if !cell.trim().is_empty() {
                            record.name = Some(cell.to_string());
                        }
                    }
                    Field::Score => {
                        if !cell.trim().is_empty() {
                            let score = parse_score(cell).ok_or_else(|| {
                                corrupt(format!("line {line}: score '{cell}' is not a number"))
                            })?;
                            record.score = Some(score);
                        }
                    }
                    Field::Remark => record.remark = cell.to_string(),
                },
                Column::Extra { key, .. } => {
                    record.extra.insert(key.clone(), cell.to_string());
                }
            }
        }

        match record.key() {
            Some(key) => {
                if let Some(&pos) = positions.get(&key) {
                    log::warn!("{location}: duplicate id '{key}' on line {line}, keeping the later row");
                    records[pos] = record;
                } else {
                    positions.insert(key, records.len());
                    records.push(record);
                }
            }
            None => {
                log::warn!("{location}: line {line} has no usable id; row kept as-is");
                records.push(record);
            }
        }
    }

    Ok(StoreTable::from_parts(columns, records))
}

/// Serialize a table, header first, ids always as text.
pub fn write_table(table: &StoreTable) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

    writer
        .write_record(table.headers())
        .map_err(|e| StoreError::Io(e.to_string()))?;
    for record in table.records() {
        writer
            .write_record(table.row_cells(record))
            .map_err(|e| StoreError::Io(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.to_string()))
}
