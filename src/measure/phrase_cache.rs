//! Batch-scoped phrase containment cache
//!
//! All (path, revision, phrase) questions a differential batch will ask are
//! collected up front, deduplicated, answered concurrently, and then read
//! without locking.

use futures::stream::{self, StreamExt};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::ContentLookupPolicy;
use crate::error::{MetricsError, Result};
use crate::repository::ObjectStore;

use super::progress::{Phase, ProgressReporter};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhraseKey {
    pub path: String,
    pub revision: String,
    pub phrase: String,
}

impl PhraseKey {
    pub fn new(path: &str, revision: &str, phrase: &str) -> Self {
        Self {
            path: path.to_string(),
            revision: revision.to_string(),
            phrase: phrase.to_string(),
        }
    }
}

/// Questions to be answered in one batch
#[derive(Debug, Default)]
pub struct PhraseRequests {
    keys: FxHashSet<PhraseKey>,
}

impl PhraseRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, path: &str, revision: &str, phrase: &str) {
        self.keys.insert(PhraseKey::new(path, revision, phrase));
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Answers for one batch; `None` marks a lookup degraded under the
/// best-effort policy
#[derive(Debug, Default)]
pub struct PhraseCache {
    answers: FxHashMap<PhraseKey, Option<bool>>,
}

impl PhraseCache {
    pub async fn resolve<S: ObjectStore>(
        store: &S,
        requests: PhraseRequests,
        max_concurrent: usize,
        policy: ContentLookupPolicy,
        progress: &dyn ProgressReporter,
    ) -> Result<Self> {
        let mut keys: Vec<PhraseKey> = requests.keys.into_iter().collect();
        keys.sort_unstable();
        tracing::debug!(lookups = keys.len(), "resolving phrase lookups");

        let pb = progress.phase(Phase::Lookups, keys.len());
        let results: Vec<(PhraseKey, Result<bool>)> = stream::iter(keys)
            .map(|key| {
                let pb = &pb;
                async move {
                    let answer = store.phrase_contains(&key.revision, &key.path, &key.phrase).await;
                    pb.advance();
                    (key, answer)
                }
            })
            .buffered(max_concurrent.max(1))
            .collect()
            .await;
        pb.finish();

        let mut answers = FxHashMap::with_capacity_and_hasher(results.len(), Default::default());
        for (key, answer) in results {
            let answer = match answer {
                Ok(found) => Some(found),
                Err(e) if policy == ContentLookupPolicy::BestEffort => {
                    tracing::warn!(
                        revision = %key.revision,
                        path = %key.path,
                        error = %e,
                        "phrase lookup failed, file contributes 0 to its metric"
                    );
                    None
                }
                Err(e) => return Err(e),
            };
            answers.insert(key, answer);
        }
        Ok(Self { answers })
    }

    /// Answer for a key that was requested before `resolve`
    pub fn get(&self, path: &str, revision: &str, phrase: &str) -> Result<Option<bool>> {
        self.answers
            .get(&PhraseKey::new(path, revision, phrase))
            .copied()
            .ok_or_else(|| MetricsError::lookup(revision, format!("phrase lookup for '{}' was never planned", path)))
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}
