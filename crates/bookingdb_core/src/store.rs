//! The document store: CRUD over the booking collection.
//!
//! Every mutation follows the same path:
//! 1. take the advisory lock,
//! 2. re-read the collection from disk,
//! 3. apply the change,
//! 4. replace the file atomically,
//! 5. release the lock (on every exit, including errors and panics).
//!
//! Reads skip the lock entirely and may run alongside a writer; they see
//! either the state before or after its rename, never a mix.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::lock::{LockGuard, LockManager};
use crate::record::{BookingPatch, BookingRecord, NewBooking, RecordFactory};
use crate::snapshot::SnapshotReader;
use crate::writer::AtomicWriter;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Result of [`BookingStore::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The record was found, merged and written.
    Updated(BookingRecord),
    /// No record has the requested id; nothing was written.
    NotFound,
}

impl UpdateOutcome {
    /// Returns the merged record, if any.
    #[must_use]
    pub fn into_record(self) -> Option<BookingRecord> {
        match self {
            Self::Updated(record) => Some(record),
            Self::NotFound => None,
        }
    }

    /// Whether the update hit an existing record.
    #[must_use]
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// Summary of a consistency scan over the store file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Whether the store file exists.
    pub exists: bool,
    /// Number of records.
    pub record_count: usize,
    /// Ids held by more than one record.
    pub duplicate_ids: Vec<String>,
    /// Number of records with an empty id.
    pub empty_ids: usize,
    /// Record count per status.
    pub statuses: BTreeMap<String, usize>,
}

impl VerifyReport {
    /// Whether every record has a non-empty, unique id.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.duplicate_ids.is_empty() && self.empty_ids == 0
    }
}

/// A booking collection persisted in a single JSON file.
///
/// The store holds no cached data; each call goes to disk. Any number of
/// `BookingStore` values, in one process or many, may point at the same
/// file as long as every writer goes through this type.
///
/// # Deployment precondition
///
/// The lock is advisory. A process that writes the file without going
/// through a `BookingStore` breaks every guarantee documented here.
#[derive(Debug, Clone)]
pub struct BookingStore {
    config: StoreConfig,
    lock: LockManager,
    reader: SnapshotReader,
    writer: AtomicWriter,
    factory: RecordFactory,
}

impl BookingStore {
    /// Creates a store over `config.path`.
    ///
    /// Nothing is touched on disk until the first write.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            lock: LockManager::new(config.lock_path(), config.retry),
            reader: SnapshotReader::new(&config.path),
            writer: AtomicWriter::from_config(&config),
            factory: RecordFactory,
            config,
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the store file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    // --- Reads ---

    /// Returns every record in file order.
    pub fn get_all(&self) -> StoreResult<Vec<BookingRecord>> {
        self.reader.read_all()
    }

    /// Returns the records matching `predicate`, in file order.
    pub fn get_where<P>(&self, mut predicate: P) -> StoreResult<Vec<BookingRecord>>
    where
        P: FnMut(&BookingRecord) -> bool,
    {
        let mut records = self.get_all()?;
        records.retain(|record| predicate(record));
        Ok(records)
    }

    /// Returns the records whose `userId` equals `user_id`.
    pub fn get_by_user(&self, user_id: &str) -> StoreResult<Vec<BookingRecord>> {
        self.get_where(|record| record.user_id() == Some(user_id))
    }

    /// Returns the first record with the given id.
    ///
    /// A missing record is `Ok(None)`, not an error.
    pub fn get_by_id(&self, id: &str) -> StoreResult<Option<BookingRecord>> {
        Ok(self.get_all()?.into_iter().find(|record| record.id == id))
    }

    // --- Mutations ---

    /// Adds one record, generating whichever of `id`, `createdAt` and
    /// `status` the input lacks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] without writing if a record with
    /// the supplied id already exists.
    pub fn create(&self, input: NewBooking) -> StoreResult<BookingRecord> {
        self.with_lock(|lock, mut records| {
            let record = self.factory.complete(input);
            self.ensure_new_ids(&records, std::slice::from_ref(&record))?;
            records.push(record.clone());
            self.write_locked(lock, &records)?;
            debug!(id = %record.id, "created booking");
            Ok(record)
        })
    }

    /// Adds a batch of records under one lock and one write.
    ///
    /// Either the whole batch is persisted or none of it is. An empty batch
    /// touches nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] without writing if an id in the
    /// batch already exists or appears twice within the batch.
    pub fn create_many<I>(&self, inputs: I) -> StoreResult<Vec<BookingRecord>>
    where
        I: IntoIterator<Item = NewBooking>,
    {
        let inputs: Vec<NewBooking> = inputs.into_iter().collect();
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        self.with_lock(|lock, mut records| {
            let created: Vec<BookingRecord> = inputs
                .into_iter()
                .map(|input| self.factory.complete(input))
                .collect();
            self.ensure_new_ids(&records, &created)?;
            records.extend(created.iter().cloned());
            self.write_locked(lock, &records)?;
            debug!(count = created.len(), "created bookings");
            Ok(created)
        })
    }

    /// Merges `patch` into the record with the same id and stamps `updatedAt`.
    ///
    /// If no record has that id, nothing is written and
    /// [`UpdateOutcome::NotFound`] is returned.
    pub fn update(&self, patch: BookingPatch) -> StoreResult<UpdateOutcome> {
        self.with_lock(|lock, mut records| {
            let Some(record) = records.iter_mut().find(|record| record.id == patch.id) else {
                debug!(id = %patch.id, "update target not found");
                return Ok(UpdateOutcome::NotFound);
            };

            patch.apply_to(record, self.factory.now());
            let merged = record.clone();
            self.write_locked(lock, &records)?;
            debug!(id = %merged.id, "updated booking");
            Ok(UpdateOutcome::Updated(merged))
        })
    }

    /// Replaces the whole collection, taking the lock first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] without taking the lock if two of
    /// `records` share an id.
    pub fn save_all(&self, records: &[BookingRecord]) -> StoreResult<()> {
        self.ensure_new_ids(&[], records)?;
        let lock = self.lock.acquire()?;
        self.write_locked(&lock, records)
    }

    /// Replaces the whole collection without taking the lock.
    ///
    /// The caller must guarantee that no other writer touches the file for
    /// the duration of the call, for example by coordinating all writers
    /// externally. Two unlocked writers racing on the same file can
    /// silently lose one of the updates; the store does not detect this.
    /// Ids within `records` are still checked for uniqueness.
    pub fn save_all_unlocked(&self, records: &[BookingRecord]) -> StoreResult<()> {
        self.ensure_new_ids(&[], records)?;
        self.writer.write(records)
    }

    /// Scans the store file for duplicate or empty ids.
    pub fn verify(&self) -> StoreResult<VerifyReport> {
        let Some(records) = self.reader.load()? else {
            return Ok(VerifyReport::default());
        };

        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut report = VerifyReport {
            exists: true,
            record_count: records.len(),
            ..VerifyReport::default()
        };
        for record in &records {
            if record.id.is_empty() {
                report.empty_ids += 1;
            } else {
                *seen.entry(record.id.as_str()).or_default() += 1;
            }
            *report.statuses.entry(record.status.clone()).or_default() += 1;
        }
        report.duplicate_ids = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id.to_string())
            .collect();
        report.duplicate_ids.sort();

        Ok(report)
    }

    // --- Private Helpers ---

    /// Acquires the lock, re-reads the collection and runs `f`.
    ///
    /// The guard is dropped when this returns, whatever `f` did.
    fn with_lock<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&LockGuard, Vec<BookingRecord>) -> StoreResult<T>,
    {
        let lock = self.lock.acquire()?;
        let records = self.reader.read_all()?;
        f(&lock, records)
    }

    /// Fails if an id in `added` is already used in `existing` or earlier in
    /// `added`.
    fn ensure_new_ids(
        &self,
        existing: &[BookingRecord],
        added: &[BookingRecord],
    ) -> StoreResult<()> {
        let mut taken: HashSet<&str> = existing.iter().map(|r| r.id.as_str()).collect();
        for record in added {
            if !taken.insert(record.id.as_str()) {
                debug!(id = %record.id, "rejecting duplicate id");
                return Err(StoreError::duplicate_id(self.path(), &record.id));
            }
        }
        Ok(())
    }

    /// Writes the collection. Requires proof that the lock is held.
    fn write_locked(&self, _lock: &LockGuard, records: &[BookingRecord]) -> StoreResult<()> {
        self.writer.write(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, StoreError};
    use crate::lock::RetryPolicy;
    use crate::record::{DEFAULT_STATUS, ID_PREFIX};
    use serde_json::json;
    use std::collections::HashSet;
    use std::fs;
    use std::thread;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn test_store(dir: &TempDir) -> BookingStore {
        BookingStore::new(
            StoreConfig::new(dir.path().join("data").join("bookings.json"))
                .sync_on_write(false)
                .retry(RetryPolicy::new(
                    200,
                    Duration::from_millis(1),
                    Duration::from_millis(10),
                )),
        )
    }

    #[test]
    fn get_all_without_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        assert!(store.get_all().unwrap().is_empty());
        assert!(store.get_by_id("anything").unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn create_generates_missing_fields() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        let record = store.create(NewBooking::new().field("userId", "u1")).unwrap();

        let uuid_part = record.id.strip_prefix(ID_PREFIX).unwrap();
        assert_eq!(uuid_part.len(), 36);
        assert!(!record.created_at.is_empty());
        assert_eq!(record.status, DEFAULT_STATUS);
        assert_eq!(record.user_id(), Some("u1"));

        assert_eq!(store.get_all().unwrap(), vec![record]);
    }

    #[test]
    fn create_preserves_supplied_fields() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        let input = NewBooking::new()
            .with_id("x")
            .with_created_at("2020-01-01T00:00:00Z")
            .with_status("confirmed")
            .field("userId", "u1");
        let record = store.create(input).unwrap();

        let stored = store.get_by_id("x").unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(stored.created_at, "2020-01-01T00:00:00Z");
        assert_eq!(stored.status, "confirmed");
        assert_eq!(stored.user_id(), Some("u1"));
    }

    #[test]
    fn create_many_is_one_write() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        store.create(NewBooking::new().with_id("first")).unwrap();

        let created = store
            .create_many((0..3).map(|i| NewBooking::new().field("seq", i)))
            .unwrap();

        assert_eq!(created.len(), 3);
        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].id, "first");
        assert_eq!(&all[1..], created.as_slice());
    }

    #[test]
    fn create_many_empty_touches_nothing() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        assert!(store.create_many(Vec::new()).unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn filter_by_user() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        store
            .create_many(vec![
                NewBooking::new().with_id("a").field("userId", "u1"),
                NewBooking::new().with_id("b").field("userId", "u2"),
                NewBooking::new().with_id("c").field("userId", "u1"),
                NewBooking::new().with_id("d"),
            ])
            .unwrap();

        let ids: Vec<String> = store
            .get_by_user("u1")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);

        let pending = store.get_where(|r| r.status == "pending").unwrap();
        assert_eq!(pending.len(), 4);
    }

    #[test]
    fn update_merges_fields() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let original = store
            .create(
                NewBooking::new()
                    .with_id("1")
                    .with_status("pending")
                    .field("userId", "u1"),
            )
            .unwrap();

        let outcome = store
            .update(BookingPatch::new("1").with_status("confirmed"))
            .unwrap();
        let merged = outcome.into_record().unwrap();

        assert_eq!(merged.id, "1");
        assert_eq!(merged.status, "confirmed");
        assert_eq!(merged.user_id(), Some("u1"));
        assert_eq!(merged.created_at, original.created_at);
        assert!(merged.updated_at.is_some());
        assert_eq!(store.get_by_id("1").unwrap(), Some(merged));
    }

    #[test]
    fn update_unknown_id_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        store.create(NewBooking::new().with_id("1")).unwrap();
        let before = fs::read(store.path()).unwrap();

        let outcome = store.update(BookingPatch::new("unknown")).unwrap();

        assert_eq!(outcome, UpdateOutcome::NotFound);
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn update_on_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        let outcome = store.update(BookingPatch::new("1")).unwrap();
        assert!(!outcome.is_updated());
        assert!(!store.path().exists());
    }

    #[test]
    fn status_transitions_are_unrestricted() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        store.create(NewBooking::new().with_id("1")).unwrap();

        for status in ["confirmed", "cancelled", "pending", "whatever"] {
            let merged = store
                .update(BookingPatch::new("1").with_status(status))
                .unwrap()
                .into_record()
                .unwrap();
            assert_eq!(merged.status, status);
        }
    }

    #[test]
    fn corrupt_file_fails_reads_and_writes() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), b"{not json").unwrap();

        assert_eq!(store.get_all().unwrap_err().kind(), ErrorKind::Read);
        let err = store.create(NewBooking::new()).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));

        // The failed mutation released the lock.
        fs::write(store.path(), b"[]").unwrap();
        store.create(NewBooking::new()).unwrap();
    }

    #[test]
    fn mutation_fails_when_lock_is_held() {
        let dir = tempdir().unwrap();
        let store = BookingStore::new(
            StoreConfig::new(dir.path().join("bookings.json"))
                .retry(RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1))),
        );
        let holder = LockManager::new(store.config().lock_path(), RetryPolicy::no_retry());

        let _guard = holder.acquire().unwrap();
        let err = store.create(NewBooking::new()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Lock);
        assert!(!store.path().exists());
    }

    #[test]
    fn lock_released_after_panic_under_lock() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = store.with_lock::<(), _>(|_, _| panic!("boom"));
        }));
        assert!(result.is_err());

        store.create(NewBooking::new()).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn failed_write_keeps_file_and_releases_lock() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        store.create(NewBooking::new().with_id("kept")).unwrap();
        let before = fs::read(store.path()).unwrap();

        // A directory squatting on the staging path makes the write fail.
        let temp_path = store.config().temp_path();
        fs::create_dir(&temp_path).unwrap();
        fs::write(temp_path.join("occupant"), b"x").unwrap();

        let err = store
            .create_many(vec![NewBooking::new(), NewBooking::new()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);
        assert_eq!(fs::read(store.path()).unwrap(), before);

        let lock = LockManager::new(store.config().lock_path(), RetryPolicy::no_retry());
        drop(lock.acquire().unwrap());

        fs::remove_dir_all(&temp_path).unwrap();
        store.create(NewBooking::new()).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 2);
    }

    #[test]
    fn create_rejects_existing_id() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        store.create(NewBooking::new().with_id("x")).unwrap();
        let before = fs::read(store.path()).unwrap();

        let err = store
            .create(NewBooking::new().with_id("x").with_status("confirmed"))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(matches!(err, StoreError::DuplicateId { ref id, .. } if id == "x"));
        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn create_many_rejects_whole_batch_on_collision() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        store.create(NewBooking::new().with_id("x")).unwrap();
        let before = fs::read(store.path()).unwrap();

        let against_store = store
            .create_many(vec![NewBooking::new().with_id("y"), NewBooking::new().with_id("x")])
            .unwrap_err();
        assert_eq!(against_store.kind(), ErrorKind::Conflict);
        assert_eq!(fs::read(store.path()).unwrap(), before);

        let within_batch = store
            .create_many(vec![
                NewBooking::new().with_id("z"),
                NewBooking::new(),
                NewBooking::new().with_id("z"),
            ])
            .unwrap_err();
        assert!(matches!(within_batch, StoreError::DuplicateId { ref id, .. } if id == "z"));
        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert!(store.get_by_id("y").unwrap().is_none());
    }

    #[test]
    fn save_all_rejects_duplicate_ids() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let record = RecordFactory.complete(NewBooking::new().with_id("x"));
        let records = vec![record.clone(), record];

        assert_eq!(store.save_all(&records).unwrap_err().kind(), ErrorKind::Conflict);
        assert_eq!(
            store.save_all_unlocked(&records).unwrap_err().kind(),
            ErrorKind::Conflict
        );
        assert!(!store.path().exists());
    }

    #[test]
    fn save_all_replaces_collection() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        store.create_many(vec![NewBooking::new(), NewBooking::new()]).unwrap();

        let mut records = store.get_all().unwrap();
        records.truncate(1);
        store.save_all(&records).unwrap();

        assert_eq!(store.get_all().unwrap(), records);
    }

    #[test]
    fn concurrent_creates_lose_nothing() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 10;

        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|i| {
                            store
                                .create(NewBooking::new().field("thread", t).field("seq", i))
                                .unwrap()
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let created: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        let stored = store.get_all().unwrap();
        assert_eq!(stored.len(), THREADS * PER_THREAD);

        let stored_ids: HashSet<&str> = stored.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(stored_ids.len(), stored.len());
        for id in &created {
            assert!(stored_ids.contains(id.as_str()));
        }
    }

    #[test]
    fn unlocked_writers_can_lose_updates() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        store.create(NewBooking::new().with_id("base")).unwrap();

        // Both writers read the same snapshot before either writes.
        let mut first = store.get_all().unwrap();
        let mut second = store.get_all().unwrap();
        first.push(RecordFactory.complete(NewBooking::new().with_id("from-first")));
        second.push(RecordFactory.complete(NewBooking::new().with_id("from-second")));

        store.save_all_unlocked(&first).unwrap();
        store.save_all_unlocked(&second).unwrap();

        let ids: Vec<String> = store.get_all().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["base", "from-second"]);
    }

    #[test]
    fn verify_reports_duplicates() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        assert!(!store.verify().unwrap().exists);

        // Written behind the store's back; the store itself refuses duplicates.
        let raw = json!([
            {"id": "a", "createdAt": "2024-01-01T00:00:00.000Z", "status": "pending"},
            {"id": "a", "createdAt": "2024-01-01T00:00:00.000Z", "status": "confirmed"},
            {"id": "", "createdAt": "2024-01-01T00:00:00.000Z", "status": "pending"},
        ]);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), raw.to_string()).unwrap();

        let report = store.verify().unwrap();
        assert!(report.exists);
        assert_eq!(report.record_count, 3);
        assert_eq!(report.duplicate_ids, vec!["a".to_string()]);
        assert_eq!(report.empty_ids, 1);
        assert_eq!(report.statuses.get("pending"), Some(&2));
        assert!(!report.is_consistent());
    }

    #[test]
    fn unknown_fields_round_trip() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let nested = json!({"seats": [1, 2], "meta": {"source": "web"}});

        store
            .create(NewBooking::new().with_id("1").field("details", nested.clone()))
            .unwrap();

        let stored = store.get_by_id("1").unwrap().unwrap();
        assert_eq!(stored.get("details"), Some(&nested));
    }
}
