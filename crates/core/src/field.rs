// Logical record fields and the key synonyms that map onto them.
//
// The same table resolves JSON keys coming back from the model and CSV
// header cells of an existing store, so a file written with Indonesian
// headers (nim, nama, nilai, keterangan) loads like one with English ones.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Id,
    Name,
    Score,
    Remark,
}

impl Field {
    /// Column order used when a store is created from scratch.
    pub const ALL: [Field; 4] = [Field::Id, Field::Name, Field::Score, Field::Remark];

    /// Header written for a newly created column.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Name => "name",
            Field::Score => "score",
            Field::Remark => "remark",
        }
    }

    /// Accepted spellings, highest priority first.
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Field::Id => &["nim", "id"],
            Field::Name => &["nama", "name"],
            Field::Score => &["nilai", "score"],
            Field::Remark => &["keterangan", "remark", "note"],
        }
    }

    /// Resolve a key (case-insensitive, whitespace-trimmed) to a field.
    pub fn from_key(key: &str) -> Option<Field> {
        let key = key.trim().to_lowercase();
        Field::ALL
            .into_iter()
            .find(|field| field.synonyms().contains(&key.as_str()))
    }

    /// Priority of `key` among this field's synonyms (0 = preferred).
    pub fn synonym_rank(&self, key: &str) -> Option<usize> {
        let key = key.trim().to_lowercase();
        self.synonyms().iter().position(|s| *s == key)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_key_synonyms() {
        assert_eq!(Field::from_key("nim"), Some(Field::Id));
        assert_eq!(Field::from_key("ID"), Some(Field::Id));
        assert_eq!(Field::from_key(" Nama "), Some(Field::Name));
        assert_eq!(Field::from_key("nilai"), Some(Field::Score));
        assert_eq!(Field::from_key("note"), Some(Field::Remark));
        assert_eq!(Field::from_key("kelas"), None);
    }

    #[test]
    fn test_synonym_rank_prefers_indonesian() {
        assert_eq!(Field::Id.synonym_rank("nim"), Some(0));
        assert_eq!(Field::Id.synonym_rank("id"), Some(1));
        assert_eq!(Field::Id.synonym_rank("name"), None);
    }
}
