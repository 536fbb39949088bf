//! Time-ordered casting queue with screen rotation and paging.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::cursor::{plan_screen, ScreenCursors};
use super::{CastingAction, CastingEntry, CastingListQuery, CastingPage};
use crate::error::KioskError;
use crate::locks::KeyedLocks;
use crate::metrics::CASTING_OPERATIONS;
use crate::store::{get_i64, get_json, set_json, KvStore, ScoredMember};
use crate::task::{Task, TaskType};
use crate::tenant::Tenant;

/// Smallest batch fetched per round of a keyword scan.
const MIN_SCAN_BATCH: usize = 100;
/// Batch size of the keyword count pass.
const COUNT_BATCH: usize = 100;
/// Largest accepted page size.
pub const MAX_PAGE_SIZE: usize = 100;

/// Casting queue of one tenant.
///
/// Per task type it keeps an ordered set of entry names scored by insertion
/// time, a pinned slot and two screen cursors:
/// - `casting_queue_<TYPE>`
/// - `casting_pinned_<TYPE>`
/// - `screen_latest_cursor_<TYPE>` / `screen_earliest_cursor_<TYPE>`
///
/// Mutations of the set and the cursor bookkeeping that goes with them run
/// under a per-(tenant, type) lock.
pub struct CastingQueue {
    store: Arc<dyn KvStore>,
    tenant: Tenant,
    locks: Arc<KeyedLocks<Mutex<()>>>,
}

impl CastingQueue {
    pub fn new(store: Arc<dyn KvStore>, tenant: Tenant, locks: Arc<KeyedLocks<Mutex<()>>>) -> Self {
        Self {
            store,
            tenant,
            locks,
        }
    }

    /// Set member for task `code`.
    pub fn entry_name(code: &str) -> String {
        format!("casting:{}", code)
    }

    fn normalize_name(name: &str) -> String {
        if name.starts_with("casting:") {
            name.to_string()
        } else {
            Self::entry_name(name)
        }
    }

    fn set_key(task_type: TaskType) -> String {
        format!("casting_queue_{}", task_type)
    }

    fn pinned_key(task_type: TaskType) -> String {
        format!("casting_pinned_{}", task_type)
    }

    fn latest_key(task_type: TaskType) -> String {
        format!("screen_latest_cursor_{}", task_type)
    }

    fn earliest_key(task_type: TaskType) -> String {
        format!("screen_earliest_cursor_{}", task_type)
    }

    fn lock(&self, task_type: TaskType) -> Arc<Mutex<()>> {
        self.locks
            .get(&format!("{}:casting:{}", self.tenant.as_str(), task_type))
    }

    fn guard(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
        match lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn load(&self, name: &str) -> Result<Option<CastingEntry>, KioskError> {
        Ok(get_json(self.store.as_ref(), name)?)
    }

    fn load_members(&self, members: &[ScoredMember]) -> Result<Vec<CastingEntry>, KioskError> {
        let mut entries = Vec::with_capacity(members.len());
        for member in members {
            match self.load(&member.member)? {
                Some(entry) => entries.push(entry),
                None => debug!(name = %member.member, "Casting member without record"),
            }
        }
        Ok(entries)
    }

    fn read_cursors(&self, task_type: TaskType) -> Result<ScreenCursors, KioskError> {
        let read = |key: String| -> Result<usize, KioskError> {
            Ok(get_i64(self.store.as_ref(), &key)?.unwrap_or(0).max(0) as usize)
        };
        Ok(ScreenCursors::new(
            read(Self::latest_key(task_type))?,
            read(Self::earliest_key(task_type))?,
        ))
    }

    fn write_cursors(&self, task_type: TaskType, cursors: ScreenCursors) -> Result<(), KioskError> {
        self.store
            .set(&Self::latest_key(task_type), &cursors.latest.to_string())?;
        self.store
            .set(&Self::earliest_key(task_type), &cursors.earliest.to_string())?;
        Ok(())
    }

    /// Insert under the type lock with a score above every existing one.
    fn insert_locked(&self, task: &Task) -> Result<CastingEntry, KioskError> {
        let key = Self::set_key(task.task_type);
        let now = Utc::now();
        let top = self
            .store
            .zrevrange(&key, 0, 1)?
            .first()
            .map(|m| m.score);
        let score = match top {
            Some(top) if top >= now.timestamp_millis() => top + 1,
            _ => now.timestamp_millis(),
        };

        let entry = CastingEntry {
            id: Uuid::new_v4().to_string(),
            name: Self::entry_name(&task.name),
            task: task.clone(),
            score,
            created_at: now,
        };
        set_json(self.store.as_ref(), &entry.name, &entry)?;
        self.store.zadd(&key, score, &entry.name)?;
        Ok(entry)
    }

    /// Remove under the type lock, shifting cursors that pointed past it.
    fn remove_locked(&self, task_type: TaskType, name: &str) -> Result<bool, KioskError> {
        let key = Self::set_key(task_type);
        let Some(rank) = self.store.zrank(&key, name)? else {
            return Ok(false);
        };
        self.store.zrem(&key, name)?;
        let cursors = self.read_cursors(task_type)?.after_removal(rank);
        self.write_cursors(task_type, cursors)?;
        Ok(true)
    }

    /// Add a finished task to the rotation.
    ///
    /// A task already in the rotation keeps its entry and score.
    pub fn add_entry(&self, task: &Task) -> Result<CastingEntry, KioskError> {
        let lock = self.lock(task.task_type);
        let _guard = Self::guard(&lock);
        let name = Self::entry_name(&task.name);
        if self
            .store
            .zrank(&Self::set_key(task.task_type), &name)?
            .is_some()
        {
            if let Some(existing) = self.load(&name)? {
                debug!(name = %name, "Casting entry already present");
                return Ok(existing);
            }
        }
        let entry = self.insert_locked(task)?;
        info!(name = %entry.name, score = entry.score, "Added casting entry");
        Ok(entry)
    }

    /// Apply an operator action to entry `name` (`casting:<code>` or `<code>`).
    ///
    /// Returns the entry as it is after the action.
    pub fn operate(
        &self,
        task_type: TaskType,
        name: &str,
        action: CastingAction,
    ) -> Result<CastingEntry, KioskError> {
        let name = Self::normalize_name(name);
        let lock = self.lock(task_type);
        let _guard = Self::guard(&lock);

        let entry = self
            .load(&name)?
            .ok_or_else(|| KioskError::NotFound(format!("casting entry {}", name)))?;
        if entry.task.task_type != task_type {
            return Err(KioskError::Validation(format!(
                "{} belongs to {}, not {}",
                name, entry.task.task_type, task_type
            )));
        }
        let key = Self::set_key(task_type);
        let in_set = self.store.zrank(&key, &name)?.is_some();
        let pinned_key = Self::pinned_key(task_type);
        let is_pinned = self.store.get(&pinned_key)?.as_deref() == Some(name.as_str());

        let result = match action {
            CastingAction::Pin => {
                if !in_set {
                    return Err(KioskError::NotFound(format!("casting entry {}", name)));
                }
                self.store.set(&pinned_key, &name)?;
                entry
            }
            CastingAction::Unpin => {
                if is_pinned {
                    self.store.del(&pinned_key)?;
                }
                entry
            }
            CastingAction::Promote => {
                if !self.remove_locked(task_type, &name)? {
                    return Err(KioskError::NotFound(format!("casting entry {}", name)));
                }
                self.insert_locked(&entry.task)?
            }
            CastingAction::Delete => {
                if !self.remove_locked(task_type, &name)? {
                    return Err(KioskError::NotFound(format!("casting entry {}", name)));
                }
                if is_pinned {
                    self.store.del(&pinned_key)?;
                }
                self.store.del(&name)?;
                entry
            }
        };

        CASTING_OPERATIONS.with_label_values(&[action.as_str()]).inc();
        info!(name = %name, action = %action, "Casting entry operated");
        Ok(result)
    }

    /// Currently pinned entry of a type.
    pub fn get_pinned(&self, task_type: TaskType) -> Result<Option<CastingEntry>, KioskError> {
        match self.store.get(&Self::pinned_key(task_type))? {
            Some(name) => self.load(&name),
            None => Ok(None),
        }
    }

    /// Number of entries of a type.
    pub fn len(&self, task_type: TaskType) -> Result<usize, KioskError> {
        Ok(self.store.zcard(&Self::set_key(task_type))?)
    }

    pub fn is_empty(&self, task_type: TaskType) -> Result<bool, KioskError> {
        Ok(self.len(task_type)? == 0)
    }

    /// Next `n` entries for the public display.
    ///
    /// Newly added entries are shown first; older entries are replayed in
    /// order behind them, so every entry keeps coming back.
    pub fn screen(&self, task_type: TaskType, n: usize) -> Result<Vec<CastingEntry>, KioskError> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let lock = self.lock(task_type);
        let _guard = Self::guard(&lock);

        let key = Self::set_key(task_type);
        let size = self.store.zcard(&key)?;
        if size == 0 {
            return Ok(Vec::new());
        }

        let (ranges, cursors) = plan_screen(self.read_cursors(task_type)?, size, n);
        let mut members = Vec::with_capacity(n);
        for (start, count) in ranges {
            members.extend(self.store.zrange(&key, start, count)?);
        }
        self.write_cursors(task_type, cursors)?;

        debug!(
            task_type = %task_type,
            shown = members.len(),
            latest = cursors.latest,
            earliest = cursors.earliest,
            "Screen rotation"
        );
        self.load_members(&members)
    }

    /// Newest-first page of entries, optionally filtered by keyword.
    pub fn list(
        &self,
        task_type: TaskType,
        query: &CastingListQuery,
    ) -> Result<CastingPage, KioskError> {
        if query.page_size == 0 || query.page_size > MAX_PAGE_SIZE {
            return Err(KioskError::Validation(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if query.page_num == 0 {
            return Err(KioskError::Validation(
                "page_num starts at 1".to_string(),
            ));
        }

        let key = Self::set_key(task_type);
        let anchor = match query.score {
            Some(score) => Some(score),
            None => self.store.zrevrange(&key, 0, 1)?.first().map(|m| m.score),
        };
        let keyword = query
            .keyword
            .as_deref()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty());

        let (members, has_more, total) = match keyword {
            None => self.page_by_score(&key, query, anchor)?,
            Some(keyword) => self.page_by_keyword(&key, query, anchor, &keyword)?,
        };

        Ok(CastingPage {
            items: self.load_members(&members)?,
            total,
            has_more,
            score: anchor,
            page_size: query.page_size,
            page_num: query.page_num,
        })
    }

    fn page_by_score(
        &self,
        key: &str,
        query: &CastingListQuery,
        anchor: Option<i64>,
    ) -> Result<(Vec<ScoredMember>, bool, usize), KioskError> {
        let Some(anchor) = anchor else {
            return Ok((Vec::new(), false, 0));
        };
        let offset = (query.page_num - 1) * query.page_size;
        let mut members = self
            .store
            .zrevrange_by_score(key, anchor, offset, query.page_size + 1)?;
        let has_more = members.len() > query.page_size;
        members.truncate(query.page_size);
        let total = self.store.zcount(key, i64::MIN, anchor)?;
        Ok((members, has_more, total))
    }

    fn page_by_keyword(
        &self,
        key: &str,
        query: &CastingListQuery,
        anchor: Option<i64>,
        keyword: &str,
    ) -> Result<(Vec<ScoredMember>, bool, usize), KioskError> {
        let Some(anchor) = anchor else {
            return Ok((Vec::new(), false, 0));
        };
        let matches = |m: &ScoredMember| m.member.to_lowercase().contains(keyword);
        let batch = (query.page_size * 5).max(MIN_SCAN_BATCH);
        let skip = (query.page_num - 1) * query.page_size;

        let mut page = Vec::with_capacity(query.page_size);
        let mut skipped = 0;
        let mut has_more = false;
        let mut probing = false;
        let mut cursor = anchor;

        loop {
            let chunk = self.store.zrevrange_by_score(key, cursor, 0, batch)?;
            for member in chunk.iter().filter(|m| matches(m)) {
                if skipped < skip {
                    skipped += 1;
                } else if page.len() < query.page_size {
                    page.push(member.clone());
                } else {
                    has_more = true;
                    break;
                }
            }

            let Some(last) = chunk.last() else { break };
            if has_more || chunk.len() < batch {
                break;
            }
            if page.len() == query.page_size {
                // One extra batch decides has_more
                if probing {
                    break;
                }
                probing = true;
            }
            cursor = last.score - 1;
        }

        let total = self.count_matching(key, anchor, &matches)?;
        Ok((page, has_more, total))
    }

    fn count_matching(
        &self,
        key: &str,
        anchor: i64,
        matches: &dyn Fn(&ScoredMember) -> bool,
    ) -> Result<usize, KioskError> {
        let mut total = 0;
        let mut cursor = anchor;
        loop {
            let chunk = self.store.zrevrange_by_score(key, cursor, 0, COUNT_BATCH)?;
            total += chunk.iter().filter(|m| matches(m)).count();
            match chunk.last() {
                Some(last) if chunk.len() == COUNT_BATCH => cursor = last.score - 1,
                _ => break,
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteKvStore;
    use crate::testing::fixtures;

    fn queue() -> CastingQueue {
        CastingQueue::new(
            Arc::new(SqliteKvStore::in_memory().unwrap()),
            Tenant::none(),
            Arc::new(KeyedLocks::new()),
        )
    }

    fn fill(queue: &CastingQueue, codes: &[&str]) -> Vec<CastingEntry> {
        codes
            .iter()
            .map(|code| {
                queue
                    .add_entry(&fixtures::succeeded_image_task(code))
                    .unwrap()
            })
            .collect()
    }

    fn names(entries: &[CastingEntry]) -> Vec<String> {
        entries.iter().map(|e| e.name.clone()).collect()
    }

    fn query(keyword: Option<&str>, page_size: usize, page_num: usize) -> CastingListQuery {
        CastingListQuery {
            keyword: keyword.map(str::to_string),
            score: None,
            page_size,
            page_num,
        }
    }

    #[test]
    fn test_scores_strictly_increase() {
        let queue = queue();
        let entries = fill(&queue, &["No.1", "No.2", "No.3", "No.4"]);
        for pair in entries.windows(2) {
            assert!(pair[1].score > pair[0].score);
        }
        assert_eq!(queue.len(TaskType::StyledImage).unwrap(), 4);
    }

    #[test]
    fn test_adding_same_task_twice_keeps_one_entry() {
        let queue = queue();
        let task = fixtures::succeeded_image_task("No.1");
        let first = queue.add_entry(&task).unwrap();
        fill(&queue, &["No.2"]);

        let again = queue.add_entry(&task).unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.score, first.score);
        assert_eq!(queue.len(TaskType::StyledImage).unwrap(), 2);
    }

    #[test]
    fn test_pin_and_unpin() {
        let queue = queue();
        fill(&queue, &["No.1", "No.2"]);

        queue
            .operate(TaskType::StyledImage, "No.1", CastingAction::Pin)
            .unwrap();
        let pinned = queue.get_pinned(TaskType::StyledImage).unwrap().unwrap();
        assert_eq!(pinned.name, "casting:No.1");

        // Unpinning another entry leaves the pin alone
        queue
            .operate(TaskType::StyledImage, "casting:No.2", CastingAction::Unpin)
            .unwrap();
        assert!(queue.get_pinned(TaskType::StyledImage).unwrap().is_some());

        queue
            .operate(TaskType::StyledImage, "casting:No.1", CastingAction::Unpin)
            .unwrap();
        assert!(queue.get_pinned(TaskType::StyledImage).unwrap().is_none());
    }

    #[test]
    fn test_operate_unknown_entry() {
        let queue = queue();
        let result = queue.operate(TaskType::StyledImage, "No.404", CastingAction::Pin);
        assert!(matches!(result, Err(KioskError::NotFound(_))));
    }

    #[test]
    fn test_operate_wrong_type_is_rejected() {
        let queue = queue();
        fill(&queue, &["No.1"]);
        let result = queue.operate(TaskType::VideoEffect, "No.1", CastingAction::Delete);
        assert!(matches!(result, Err(KioskError::Validation(_))));
        assert_eq!(queue.len(TaskType::StyledImage).unwrap(), 1);
    }

    #[test]
    fn test_delete_removes_from_list_and_pin() {
        let queue = queue();
        fill(&queue, &["No.1", "No.2", "No.3"]);
        queue
            .operate(TaskType::StyledImage, "No.2", CastingAction::Pin)
            .unwrap();

        queue
            .operate(TaskType::StyledImage, "No.2", CastingAction::Delete)
            .unwrap();

        let page = queue.list(TaskType::StyledImage, &query(None, 10, 1)).unwrap();
        assert_eq!(names(&page.items), vec!["casting:No.3", "casting:No.1"]);
        assert!(queue.get_pinned(TaskType::StyledImage).unwrap().is_none());

        let again = queue.operate(TaskType::StyledImage, "No.2", CastingAction::Delete);
        assert!(matches!(again, Err(KioskError::NotFound(_))));
    }

    #[test]
    fn test_promote_moves_entry_to_newest() {
        let queue = queue();
        let entries = fill(&queue, &["No.1", "No.2", "No.3"]);

        let promoted = queue
            .operate(TaskType::StyledImage, "No.1", CastingAction::Promote)
            .unwrap();
        assert!(promoted.score > entries[2].score);
        assert_ne!(promoted.id, entries[0].id);

        let page = queue.list(TaskType::StyledImage, &query(None, 10, 1)).unwrap();
        assert_eq!(
            names(&page.items),
            vec!["casting:No.1", "casting:No.3", "casting:No.2"]
        );
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_delete_adjusts_screen_cursors() {
        let queue = queue();
        fill(&queue, &["No.1", "No.2", "No.3", "No.4"]);

        let first = queue.screen(TaskType::StyledImage, 2).unwrap();
        assert_eq!(names(&first), vec!["casting:No.1", "casting:No.2"]);

        // Removing a shown entry must not skip No.3
        queue
            .operate(TaskType::StyledImage, "No.1", CastingAction::Delete)
            .unwrap();
        let next = queue.screen(TaskType::StyledImage, 2).unwrap();
        assert_eq!(names(&next), vec!["casting:No.3", "casting:No.4"]);
    }

    #[test]
    fn test_screen_favors_new_entries() {
        let queue = queue();
        fill(&queue, &["No.1", "No.2", "No.3"]);
        queue.screen(TaskType::StyledImage, 3).unwrap();

        fill(&queue, &["No.4"]);
        let shown = queue.screen(TaskType::StyledImage, 2).unwrap();
        assert_eq!(names(&shown), vec!["casting:No.4", "casting:No.1"]);
    }

    #[test]
    fn test_screen_repeats_when_set_is_small() {
        let queue = queue();
        fill(&queue, &["No.1", "No.2"]);
        let shown = queue.screen(TaskType::StyledImage, 5).unwrap();
        assert_eq!(shown.len(), 5);
    }

    #[test]
    fn test_screen_empty_type() {
        let queue = queue();
        assert!(queue.screen(TaskType::VideoEffect, 4).unwrap().is_empty());
        assert!(queue.screen(TaskType::StyledImage, 0).unwrap().is_empty());
    }

    #[test]
    fn test_list_pages_newest_first() {
        let queue = queue();
        let codes: Vec<String> = (1..=5).map(|i| format!("No.{}", i)).collect();
        let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        fill(&queue, &refs);

        let first = queue.list(TaskType::StyledImage, &query(None, 2, 1)).unwrap();
        assert_eq!(names(&first.items), vec!["casting:No.5", "casting:No.4"]);
        assert!(first.has_more);
        assert_eq!(first.total, 5);

        // Entries added after the first page do not shift later pages
        fill(&queue, &["No.6"]);
        let second = queue
            .list(
                TaskType::StyledImage,
                &CastingListQuery {
                    score: first.score,
                    ..query(None, 2, 2)
                },
            )
            .unwrap();
        assert_eq!(names(&second.items), vec!["casting:No.3", "casting:No.2"]);

        let third = queue
            .list(
                TaskType::StyledImage,
                &CastingListQuery {
                    score: first.score,
                    ..query(None, 2, 3)
                },
            )
            .unwrap();
        assert_eq!(names(&third.items), vec!["casting:No.1"]);
        assert!(!third.has_more);
    }

    #[test]
    fn test_list_with_keyword() {
        let queue = queue();
        fill(&queue, &["No.1001", "No.2001", "No.1002", "No.2002", "No.1003"]);

        let page = queue
            .list(TaskType::StyledImage, &query(Some("no.100"), 2, 1))
            .unwrap();
        assert_eq!(names(&page.items), vec!["casting:No.1003", "casting:No.1002"]);
        assert!(page.has_more);
        assert_eq!(page.total, 3);

        let page = queue
            .list(TaskType::StyledImage, &query(Some("NO.100"), 2, 2))
            .unwrap();
        assert_eq!(names(&page.items), vec!["casting:No.1001"]);
        assert!(!page.has_more);
    }

    #[test]
    fn test_keyword_scan_crosses_batches() {
        let queue = queue();
        let codes: Vec<String> = (0..250).map(|i| format!("No.{}", 1000 + i)).collect();
        let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        fill(&queue, &refs);

        // Only No.1000..No.1009 match, all in the oldest batch
        let page = queue
            .list(TaskType::StyledImage, &query(Some("No.100"), 4, 1))
            .unwrap();
        assert_eq!(
            names(&page.items),
            vec![
                "casting:No.1009",
                "casting:No.1008",
                "casting:No.1007",
                "casting:No.1006"
            ]
        );
        assert!(page.has_more);
        assert_eq!(page.total, 10);
    }

    #[test]
    fn test_list_validation() {
        let queue = queue();
        assert!(matches!(
            queue.list(TaskType::StyledImage, &query(None, 0, 1)),
            Err(KioskError::Validation(_))
        ));
        assert!(matches!(
            queue.list(TaskType::StyledImage, &query(None, 10, 0)),
            Err(KioskError::Validation(_))
        ));
    }

    #[test]
    fn test_list_empty() {
        let queue = queue();
        let page = queue.list(TaskType::StyledImage, &query(Some("x"), 10, 1)).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
        assert!(!page.has_more);
        assert!(page.score.is_none());
    }
}
