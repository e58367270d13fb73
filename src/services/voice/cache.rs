use super::catalog::local_voices;
use super::elevenlabs::{VoiceCatalog, VoiceScope};
use super::{VoiceEntry, VoiceSource};
use log::{info, warn};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibrarySource {
    /// Official presets merged with community voices.
    Remote,
    Collection,
    LocalFallback,
}

#[derive(Debug)]
struct Snapshot {
    voices: Arc<Vec<VoiceEntry>>,
    fetched_at: Instant,
    source: LibrarySource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryStatus {
    pub loaded: bool,
    pub loading: bool,
    pub count: usize,
    pub official_count: usize,
    pub community_count: usize,
    pub cache_age: Option<Duration>,
    pub is_stale: bool,
    pub source: Option<LibrarySource>,
}

/// Time-boxed cache over a remote voice catalog.
///
/// Refreshes are serialized on their own lock, so concurrent callers queue
/// behind the one fetch and then read its snapshot. Readers never wait on a
/// fetch. A snapshot is never edited in place: a finished refresh swaps in
/// a new one, and a refresh that is dropped half way leaves the old one.
#[derive(Debug)]
pub struct VoiceLibrary {
    fetcher: Option<Arc<dyn VoiceCatalog>>,
    collection: Option<String>,
    ttl: Duration,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    refresh: Mutex<()>,
}

impl VoiceLibrary {
    pub fn new(
        fetcher: Option<Arc<dyn VoiceCatalog>>,
        collection: Option<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            fetcher,
            collection,
            ttl,
            snapshot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Cached snapshot while fresh; otherwise a full refetch-and-replace.
    pub async fn get_voices(&self, force_refresh: bool) -> Arc<Vec<VoiceEntry>> {
        if !force_refresh {
            if let Some(snap) = self.current().filter(|s| s.fetched_at.elapsed() < self.ttl) {
                return snap.voices.clone();
            }
        }

        let requested_at = Instant::now();
        let _refresh = self.refresh.lock().await;
        // someone else may have refreshed while we queued
        if let Some(snap) = self.current() {
            let fresh = !force_refresh && snap.fetched_at.elapsed() < self.ttl;
            if fresh || snap.fetched_at >= requested_at {
                return snap.voices.clone();
            }
        }

        let (voices, source) = self.fetch().await;
        let snap = Arc::new(Snapshot {
            voices: Arc::new(voices),
            fetched_at: Instant::now(),
            source,
        });
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(snap.clone());
        snap.voices.clone()
    }

    async fn fetch(&self) -> (Vec<VoiceEntry>, LibrarySource) {
        let Some(fetcher) = &self.fetcher else {
            info!("No voice provider configured, using bundled voices");
            return (local_voices(), LibrarySource::LocalFallback);
        };

        let (voices, source) = match &self.collection {
            Some(id) => {
                let env = fetcher.list_voices(&VoiceScope::Collection(id.clone())).await;
                (unwrap_or_log(env.into_result(), "collection"), LibrarySource::Collection)
            }
            None => {
                let (official, community) = tokio::join!(
                    fetcher.list_voices(&VoiceScope::Official),
                    fetcher.list_voices(&VoiceScope::Community)
                );
                let mut merged = unwrap_or_log(official.into_result(), "official");
                let official_count = merged.len();
                merged.extend(unwrap_or_log(community.into_result(), "community"));
                info!(
                    "Voice library: {} official + {} community",
                    official_count,
                    merged.len() - official_count
                );
                (merged, LibrarySource::Remote)
            }
        };

        if voices.is_empty() {
            warn!("Voice library came back empty, using bundled voices");
            return (local_voices(), LibrarySource::LocalFallback);
        }
        (voices, source)
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Voices sharing at least one tag (case-insensitive); all when `tags` is empty.
    pub fn filter_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> Vec<VoiceEntry> {
        let Some(snap) = self.current() else {
            return Vec::new();
        };
        if tags.is_empty() {
            return snap.voices.to_vec();
        }
        snap.voices
            .iter()
            .filter(|v| v.overlap(tags) > 0)
            .cloned()
            .collect()
    }

    pub fn official_voices(&self) -> Vec<VoiceEntry> {
        self.by_source(|s| s == VoiceSource::Official)
    }

    pub fn community_voices(&self) -> Vec<VoiceEntry> {
        self.by_source(|s| s != VoiceSource::Official)
    }

    fn by_source(&self, keep: impl Fn(VoiceSource) -> bool) -> Vec<VoiceEntry> {
        self.current()
            .map(|s| s.voices.iter().filter(|e| keep(e.source)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn voice_by_id(&self, id: &str) -> Option<VoiceEntry> {
        self.current()?.voices.iter().find(|v| v.id == id).cloned()
    }

    /// Reports the last good snapshot, even while a refresh is running.
    pub fn status(&self) -> LibraryStatus {
        let loading = self.refresh.try_lock().is_err();
        let Some(snap) = self.current() else {
            return LibraryStatus {
                loaded: false,
                loading,
                count: 0,
                official_count: 0,
                community_count: 0,
                cache_age: None,
                is_stale: true,
                source: None,
            };
        };
        let age = snap.fetched_at.elapsed();
        let official_count = snap
            .voices
            .iter()
            .filter(|v| v.source == VoiceSource::Official)
            .count();
        LibraryStatus {
            loaded: true,
            loading,
            count: snap.voices.len(),
            official_count,
            community_count: snap.voices.len() - official_count,
            cache_age: Some(age),
            is_stale: age >= self.ttl,
            source: Some(snap.source),
        }
    }
}

fn unwrap_or_log<E: std::fmt::Display>(
    result: Result<Vec<VoiceEntry>, E>,
    what: &str,
) -> Vec<VoiceEntry> {
    result.unwrap_or_else(|e| {
        warn!("Failed to fetch {} voices: {}", what, e);
        Vec::new()
    })
}
