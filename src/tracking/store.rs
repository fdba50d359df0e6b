use std::fs;
use std::path::Path;
use tracing::warn;

use crate::models::Candidate;

/// Repository seam over the candidate log so the storage mechanism is
/// swappable without touching detection logic. The detector appends on
/// flag; the tracker rewrites on resolution.
pub trait CandidateStore: Send + Sync {
    fn list(&self) -> Vec<Candidate>;
    fn append(&mut self, candidate: Candidate);
    /// Replaces the stored record with the same id, then persists.
    fn update(&mut self, candidate: &Candidate);

    fn list_open(&self) -> Vec<Candidate> {
        self.list().into_iter().filter(|c| c.is_open()).collect()
    }

    fn open_for_code(&self, code: &str) -> Option<Candidate> {
        self.list()
            .into_iter()
            .find(|c| c.is_open() && c.code == code)
    }

    fn next_id(&self) -> u64 {
        self.list().iter().map(|c| c.id).max().unwrap_or(0) + 1
    }
}

/// Flat-file JSON log, the sole durable state. An absent or corrupt
/// file reads as "no candidates to track".
pub struct JsonFileStore {
    path: String,
    candidates: Vec<Candidate>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let candidates = Self::load(&path);
        Self { path, candidates }
    }

    fn load(path: &str) -> Vec<Candidate> {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Vec<Candidate>>(&content) {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("candidate log at {} is unreadable, starting empty: {}", path, e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        }
    }

    fn save(&self) {
        if let Some(parent) = Path::new(&self.path).parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&self.candidates) {
            if let Err(e) = fs::write(&self.path, json) {
                warn!("failed to write candidate log {}: {}", self.path, e);
            }
        }
    }
}

impl CandidateStore for JsonFileStore {
    fn list(&self) -> Vec<Candidate> {
        self.candidates.clone()
    }

    fn append(&mut self, candidate: Candidate) {
        self.candidates.push(candidate);
        self.save();
    }

    fn update(&mut self, candidate: &Candidate) {
        if let Some(slot) = self.candidates.iter_mut().find(|c| c.id == candidate.id) {
            *slot = candidate.clone();
        }
        self.save();
    }
}
