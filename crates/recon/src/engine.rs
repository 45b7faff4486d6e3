use std::collections::HashMap;

use rekap_core::{Field, MergePolicy, Record, RecordStore, StoreTable};

use crate::error::MergeError;
use crate::model::MergeOutcome;

/// Collapse a batch to one record per canonical id, last write wins.
/// Keeps first-appearance order. Returns the keyed records and the number
/// of records without a usable id.
fn dedupe_batch(batch: &[Record]) -> (Vec<Record>, usize) {
    let mut keyed: Vec<Record> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0;

    for record in batch {
        let Some(key) = record.key() else {
            skipped += 1;
            continue;
        };
        let mut record = record.clone();
        record.id = key.clone();
        match positions.get(&key) {
            Some(&pos) => keyed[pos] = record,
            None => {
                positions.insert(key, keyed.len());
                keyed.push(record);
            }
        }
    }

    (keyed, skipped)
}

fn apply_update(stored: &mut Record, incoming: &Record, policy: MergePolicy) {
    match policy {
        MergePolicy::FieldWise => {
            if incoming.name.is_some() {
                stored.name = incoming.name.clone();
            }
            if incoming.score.is_some() {
                stored.score = incoming.score;
            }
            if !incoming.remark.is_empty() {
                stored.remark = incoming.remark.clone();
            }
        }
        MergePolicy::Replace => {
            stored.name = incoming.name.clone();
            stored.score = incoming.score;
            stored.remark = incoming.remark.clone();
        }
    }
}

/// Upsert `batch` into `table` by id.
pub fn merge(table: &mut StoreTable, batch: &[Record], policy: MergePolicy) -> MergeOutcome {
    let (incoming, skipped) = dedupe_batch(batch);
    let mut outcome = MergeOutcome {
        skipped,
        ..MergeOutcome::default()
    };
    if incoming.is_empty() {
        return outcome;
    }

    let index = table.index();

    // Counts come from the key sets before any row is touched
    outcome.updated = incoming.iter().filter(|r| index.contains_key(&r.id)).count();
    outcome.added = incoming.len() - outcome.updated;

    for field in [Field::Name, Field::Score, Field::Remark] {
        let supplied = incoming.iter().any(|r| match field {
            Field::Name => r.name.is_some(),
            Field::Score => r.score.is_some(),
            Field::Remark => !r.remark.is_empty(),
            Field::Id => true,
        });
        if supplied {
            table.ensure_field(field);
        }
    }

    for record in incoming {
        match index.get(&record.id) {
            Some(&pos) => {
                let stored = &mut table.records_mut()[pos];
                let before = stored.clone();
                apply_update(stored, &record, policy);
                if *stored == before {
                    outcome.unchanged += 1;
                }
            }
            None => table.push(record),
        }
    }

    outcome
}

/// Single owner of a store: every merge is load, merge, full save.
#[derive(Debug)]
pub struct Reconciler<S: RecordStore> {
    store: S,
    policy: MergePolicy,
}

impl<S: RecordStore> Reconciler<S> {
    pub fn new(store: S, policy: MergePolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Merge a batch into the store. A batch with no usable id returns zero
    /// counts without reading or writing the store.
    pub fn reconcile(&mut self, batch: &[Record]) -> Result<MergeOutcome, MergeError> {
        if !batch.iter().any(|r| r.key().is_some()) {
            log::debug!("batch of {} has no usable id, store untouched", batch.len());
            return Ok(MergeOutcome {
                skipped: batch.len(),
                ..MergeOutcome::default()
            });
        }

        let mut table = self.store.load().map_err(MergeError::Load)?;
        let outcome = merge(&mut table, batch, self.policy);
        self.store.save(&table).map_err(MergeError::Save)?;

        log::info!(
            "merged batch: {} added, {} updated ({} unchanged), {} skipped",
            outcome.added,
            outcome.updated,
            outcome.unchanged,
            outcome.skipped
        );
        Ok(outcome)
    }
}
