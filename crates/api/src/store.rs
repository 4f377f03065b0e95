use dashmap::DashMap;
use report::Report;
use std::sync::Arc;
use uuid::Uuid;

/// Finished reports, keyed by the id handed to the browser.
pub struct ReportStore {
    reports: Arc<DashMap<Uuid, Arc<Report>>>,
    max_entries: usize,
}

impl ReportStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            reports: Arc::new(DashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Store a report. When full, the oldest quarter (by generation time) is dropped first.
    pub fn insert(&self, report: Arc<Report>) -> Uuid {
        if self.reports.len() >= self.max_entries {
            self.evict_oldest((self.max_entries / 4).max(1));
        }
        let id = Uuid::new_v4();
        self.reports.insert(id, report);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Report>> {
        self.reports.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    fn evict_oldest(&self, count: usize) {
        let mut by_age: Vec<_> = self
            .reports
            .iter()
            .map(|r| (r.value().generated_at, *r.key()))
            .collect();
        by_age.sort();
        for (_, key) in by_age.into_iter().take(count) {
            self.reports.remove(&key);
        }
    }
}
