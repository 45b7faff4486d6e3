// In-memory image of the persisted store: header layout plus rows.

use std::collections::{HashMap, HashSet};

use crate::field::Field;
use crate::record::{format_score, Record};

/// One header cell of the store, resolved to a logical field when possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// A logical field, remembering the exact header spelling in the file.
    Field { field: Field, header: String },
    /// Any other column, kept verbatim. `key` names the cell in
    /// `Record::extra`; it equals the header unless the header repeats.
    Extra { key: String, header: String },
}

impl Column {
    pub fn header(&self) -> &str {
        match self {
            Column::Field { header, .. } => header,
            Column::Extra { header, .. } => header,
        }
    }

    pub fn field(&self) -> Option<Field> {
        match self {
            Column::Field { field, .. } => Some(*field),
            Column::Extra { .. } => None,
        }
    }
}

/// Full contents of the store. Row order is insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreTable {
    columns: Vec<Column>,
    records: Vec<Record>,
}

impl Default for StoreTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreTable {
    /// Empty table with the default `id,name,score,remark` layout.
    pub fn new() -> Self {
        let columns = Field::ALL
            .iter()
            .map(|f| Column::Field {
                field: *f,
                header: f.canonical_name().to_string(),
            })
            .collect();
        Self {
            columns,
            records: Vec::new(),
        }
    }

    pub fn from_parts(columns: Vec<Column>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    /// Resolve raw header cells. When two headers name the same field the
    /// higher-priority synonym wins and the other is kept as an extra column.
    pub fn layout_from_headers<S: AsRef<str>>(headers: &[S]) -> Vec<Column> {
        let mut winner: HashMap<Field, (usize, usize)> = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            let header = header.as_ref();
            if let Some(field) = Field::from_key(header) {
                let rank = field.synonym_rank(header).unwrap_or(usize::MAX);
                match winner.get(&field) {
                    Some(&(_, best)) if best <= rank => {}
                    _ => {
                        winner.insert(field, (idx, rank));
                    }
                }
            }
        }

        let mut extra_keys: HashSet<String> = HashSet::new();
        headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let header = header.as_ref();
                match Field::from_key(header) {
                    Some(field) if winner.get(&field).map(|w| w.0) == Some(idx) => Column::Field {
                        field,
                        header: header.to_string(),
                    },
                    _ => Column::Extra {
                        key: unique_key(&mut extra_keys, header),
                        header: header.to_string(),
                    },
                }
            })
            .collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.header()).collect()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.columns.iter().any(|c| c.field() == Some(field))
    }

    /// Append a column for `field` if the layout does not have one yet.
    pub fn ensure_field(&mut self, field: Field) {
        if !self.has_field(field) {
            self.columns.push(Column::Field {
                field,
                header: field.canonical_name().to_string(),
            });
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Row position by canonical id.
    pub fn index(&self) -> HashMap<String, usize> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(pos, r)| r.key().map(|k| (k, pos)))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        let id = id.trim();
        self.records.iter().find(|r| r.id == id)
    }

    /// Cells of one row in column order.
    pub fn row_cells(&self, record: &Record) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| match column {
                Column::Field { field, .. } => match field {
                    Field::Id => record.id.clone(),
                    Field::Name => record.name.clone().unwrap_or_default(),
                    Field::Score => record.score.map(format_score).unwrap_or_default(),
                    Field::Remark => record.remark.clone(),
                },
                Column::Extra { key, .. } => record.extra.get(key).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

/// `header`, or `header#2`, `header#3`, ... when already taken.
fn unique_key(taken: &mut HashSet<String>, header: &str) -> String {
    let mut key = header.to_string();
    let mut n = 2;
    while taken.contains(&key) {
        key = format!("{header}#{n}");
        n += 1;
    }
    taken.insert(key.clone());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let table = StoreTable::new();
        assert_eq!(table.headers(), vec!["id", "name", "score", "remark"]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_layout_from_legacy_headers() {
        let columns = StoreTable::layout_from_headers(&["nama", "nim", "nilai", "keterangan", "kelas"]);
        assert_eq!(columns[0].field(), Some(Field::Name));
        assert_eq!(columns[1].field(), Some(Field::Id));
        assert_eq!(columns[2].field(), Some(Field::Score));
        assert_eq!(columns[3].field(), Some(Field::Remark));
        assert_eq!(columns[4], Column::Extra { key: "kelas".to_string(), header: "kelas".to_string() });
    }

    #[test]
    fn test_layout_duplicate_field_keeps_preferred_synonym() {
        let columns = StoreTable::layout_from_headers(&["id", "name", "nim"]);
        assert_eq!(columns[0], Column::Extra { key: "id".to_string(), header: "id".to_string() });
        assert_eq!(columns[2].field(), Some(Field::Id));
        assert_eq!(columns[2].header(), "nim");
    }

    #[test]
    fn test_repeated_extra_headers_get_distinct_keys() {
        let columns = StoreTable::layout_from_headers(&["nim", "id", "id", "kelas", "kelas", "kelas#2"]);
        let keys: Vec<&str> = columns
            .iter()
            .filter_map(|c| match c {
                Column::Extra { key, .. } => Some(key.as_str()),
                Column::Field { .. } => None,
            })
            .collect();
        assert_eq!(keys, vec!["id", "id#2", "kelas", "kelas#2", "kelas#2#2"]);
        assert_eq!(columns[2].header(), "id");
        assert_eq!(columns[4].header(), "kelas");
    }

    #[test]
    fn test_row_cells_follow_layout() {
        let columns = StoreTable::layout_from_headers(&["nilai", "nim", "kelas"]);
        let mut record = Record::new("105").with_score(88.0).with_name("Putri");
        record.extra.insert("kelas".into(), "A".into());
        let table = StoreTable::from_parts(columns, vec![record.clone()]);
        assert_eq!(table.row_cells(&record), vec!["88", "105", "A"]);
    }

    #[test]
    fn test_ensure_field_appends_once() {
        let columns = StoreTable::layout_from_headers(&["id", "name"]);
        let mut table = StoreTable::from_parts(columns, Vec::new());
        table.ensure_field(Field::Score);
        table.ensure_field(Field::Score);
        assert_eq!(table.headers(), vec!["id", "name", "score"]);
    }
}
