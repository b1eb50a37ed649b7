use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ContextConfig;
use crate::context::{self, ContextSections};
use crate::db::{Database, FactStore, SqliteFactStore};
use crate::embeddings::{EmbeddingProvider, OpenAiEmbedder};
use crate::indexer::{SearchHit, VectorIndexClient};
use crate::message::{ChannelMessage, IndexEntry};
use crate::participants::Participant;
use crate::queue::IndexingQueue;
use crate::registry::ChannelRegistry;
use crate::vector::{QdrantStore, VectorStore};

/// Per-channel counters for the stats surface.
#[derive(Debug, Clone, Default)]
pub struct ChannelStats {
    pub buffer_count: usize,
    pub indexed_count: u64,
    pub pending_count: usize,
    pub is_tracked: bool,
}

/// The conversation-context engine.
///
/// Owns the channel registry, the indexing queue and the vector index
/// facade; exposes lifecycle plus the operations the command layer consumes.
/// Outside the started state every operation besides `start`/`is_enabled`
/// is a no-op returning a neutral value, never an error, and external
/// outages degrade queries the same way (recency-only context at worst).
pub struct ContextService {
    config: ContextConfig,
    db: Database,
    registry: Mutex<ChannelRegistry>,
    queue: IndexingQueue,
    index: VectorIndexClient,
    facts: Arc<dyn FactStore>,
    started: AtomicBool,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl ContextService {
    pub fn new(
        config: ContextConfig,
        db: Database,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        facts: Arc<dyn FactStore>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let registry = Mutex::new(ChannelRegistry::new(config.recent_message_count));
        Ok(Self {
            config,
            db,
            registry,
            queue: IndexingQueue::new(),
            index: VectorIndexClient::new(embedder, store),
            facts,
            started: AtomicBool::new(false),
            flush_task: Mutex::new(None),
        })
    }

    /// Builds a service wired to the real collaborators: sqlite tracking
    /// store, OpenAI-compatible embedder and Qdrant over REST.
    pub fn connect(config: ContextConfig) -> anyhow::Result<Arc<Self>> {
        let db = Database::open(&config.database_url)?;
        db.execute_init()?;
        let embedder = Arc::new(OpenAiEmbedder::new(&config));
        let store = Arc::new(QdrantStore::new(&config)?);
        let facts = Arc::new(SqliteFactStore::new(db.clone(), true));
        Ok(Arc::new(Self::new(config, db, embedder, store, facts)?))
    }

    /// Transitions to the started state: ensures the vector collection,
    /// loads previously tracked channels and arms the flush timer. A second
    /// concurrent `start` is a no-op (single-flight).
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        if !self.config.enabled {
            info!("Context engine disabled by configuration, not starting");
            return Ok(());
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        // Collection setup is best-effort; channel loading must not block
        // on the vector store being ready.
        if let Err(e) = self.index.ensure_ready().await {
            warn!("Vector collection setup failed, search degraded: {}", e);
        }

        match self.db.run_blocking(|db| db.get_tracked_channels()).await {
            Ok(channels) => {
                let mut registry = self.registry.lock().unwrap();
                for channel in &channels {
                    registry.enable(channel.channel_id, channel.guild_id);
                }
                info!("Context engine started, tracking {} channels", channels.len());
            }
            Err(e) => {
                warn!("Failed to load tracked channels, starting empty: {}", e);
            }
        }

        let service = Arc::clone(self);
        let interval = Duration::from_secs(self.config.batch_index_interval_minutes * 60);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                service.flush_cycle().await;
            }
        });
        *self.flush_task.lock().unwrap() = Some(handle);

        Ok(())
    }

    /// Transitions to the stopped state: disarms the timer and drains the
    /// queue one last time, best-effort.
    pub async fn stop(&self) {
        if self
            .started
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        if let Some(handle) = self.flush_task.lock().unwrap().take() {
            handle.abort();
        }

        let entries = self.queue.drain();
        if !entries.is_empty() {
            let total = entries.len();
            let indexed = self.index.index_batch(entries).await;
            info!("Final drain: indexed {}/{} pending messages", indexed, total);
        }
        info!("Context engine stopped");
    }

    /// True only in the started state.
    pub fn is_enabled(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    async fn flush_cycle(&self) {
        let entries = self.queue.drain();
        if !entries.is_empty() {
            let total = entries.len();
            let indexed = self.index.index_batch(entries).await;
            info!("Batch flush: indexed {}/{} messages", indexed, total);
        } else {
            debug!("Batch flush: queue empty");
        }
        self.index.prune_older_than(self.config.retention_days).await;
    }

    // ---- channel lifecycle -------------------------------------------------

    pub fn is_channel_tracked(&self, channel_id: u64) -> bool {
        self.is_enabled() && self.registry.lock().unwrap().is_tracked(channel_id)
    }

    /// Starts tracking a channel. Idempotent. Persistence to the tracking
    /// store is fire-and-forget: in-process memory is the source of truth,
    /// so a store outage only costs durability across restarts.
    pub fn enable_channel(&self, channel_id: u64, guild_id: u64, actor_id: u64) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let added = self.registry.lock().unwrap().enable(channel_id, guild_id);
        if added {
            info!("Tracking enabled for channel {} by {}", channel_id, actor_id);
        }

        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(e) = db
                .run_blocking(move |db| db.enable_channel_tracking(channel_id, guild_id, actor_id))
                .await
            {
                warn!(
                    "Failed to persist tracking for channel {}: {}",
                    channel_id, e
                );
            }
        });
        true
    }

    /// Stops tracking a channel, discarding its window and participants.
    pub fn disable_channel(&self, channel_id: u64) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let removed = self.registry.lock().unwrap().disable(channel_id);
        if removed {
            info!("Tracking disabled for channel {}", channel_id);
        }

        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(e) = db
                .run_blocking(move |db| db.disable_channel_tracking(channel_id))
                .await
            {
                warn!(
                    "Failed to persist tracking removal for channel {}: {}",
                    channel_id, e
                );
            }
        });
        removed
    }

    // ---- recording ---------------------------------------------------------

    /// Records one inbound message: window push, participant touch (humans
    /// only), index enqueue, plus a detached last-activity write whose
    /// latency and failures never reach the caller. No-op for untracked
    /// channels.
    pub fn record_message(&self, message: ChannelMessage) {
        if !self.is_enabled() {
            return;
        }

        {
            let mut registry = self.registry.lock().unwrap();
            let Some(state) = registry.get_mut(message.channel_id) else {
                return;
            };
            if !message.is_bot {
                state
                    .participants
                    .touch(message.author_id, &message.author_name);
            }
            state.window.push(message.clone());
        }

        self.queue.enqueue(IndexEntry::from(&message));

        let db = self.db.clone();
        let channel_id = message.channel_id;
        tokio::spawn(async move {
            if let Err(e) = db
                .run_blocking(move |db| db.update_channel_activity(channel_id))
                .await
            {
                debug!(
                    "Failed to persist activity for channel {}: {}",
                    channel_id, e
                );
            }
        });
    }

    // ---- queries -----------------------------------------------------------

    /// Last `limit` window entries as `"[author]: content"` lines, bots
    /// excluded, oldest first. Empty for untracked channels.
    pub fn get_recent_context(&self, channel_id: u64, limit: usize) -> String {
        if !self.is_enabled() {
            return String::new();
        }
        let registry = self.registry.lock().unwrap();
        match registry.get(channel_id) {
            Some(state) => context::format_recent_window(&state.window, limit),
            None => String::new(),
        }
    }

    /// Semantic hits for `query` within one channel, best score first.
    pub async fn search_relevant_history(&self, channel_id: u64, query: &str) -> Vec<SearchHit> {
        if !self.is_channel_tracked(channel_id) {
            return Vec::new();
        }
        self.index
            .search(
                query,
                channel_id,
                self.config.semantic_search_limit,
                self.config.search_score_threshold,
            )
            .await
    }

    /// Participants active within `window_minutes`, most talkative first.
    pub fn active_participants(&self, channel_id: u64, window_minutes: i64) -> Vec<Participant> {
        if !self.is_enabled() {
            return Vec::new();
        }
        let registry = self.registry.lock().unwrap();
        match registry.get(channel_id) {
            Some(state) => state.participants.active(window_minutes),
            None => Vec::new(),
        }
    }

    /// The merged context string: recent conversation, relevant history,
    /// participant summary and channel facts, in that order, each section
    /// omitted when empty. Untracked channels get an empty string outright.
    pub async fn build_hybrid_context(&self, channel_id: u64, query: &str) -> String {
        if !self.is_channel_tracked(channel_id) {
            return String::new();
        }

        let (recent, participants) = {
            let registry = self.registry.lock().unwrap();
            match registry.get(channel_id) {
                Some(state) => (
                    context::format_recent_window(&state.window, self.config.recent_message_count),
                    state
                        .participants
                        .format_summary(self.config.participant_window_minutes),
                ),
                None => return String::new(),
            }
        };

        let relevant = self
            .index
            .search(
                query,
                channel_id,
                self.config.semantic_search_limit,
                self.config.search_score_threshold,
            )
            .await;

        let facts = if self.facts.is_enabled().await {
            match self.facts.facts_for_channel(channel_id).await {
                Ok(facts) => facts,
                Err(e) => {
                    debug!("Fact lookup failed for channel {}: {}", channel_id, e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        context::assemble(ContextSections {
            recent,
            relevant,
            participants,
            facts,
        })
    }

    /// Buffer/index/queue counters for one channel; zeros when untracked.
    pub async fn get_channel_stats(&self, channel_id: u64) -> ChannelStats {
        if !self.is_channel_tracked(channel_id) {
            return ChannelStats::default();
        }

        let buffer_count = {
            let registry = self.registry.lock().unwrap();
            registry.get(channel_id).map_or(0, |s| s.window.len())
        };

        ChannelStats {
            buffer_count,
            indexed_count: self.index.indexed_count(channel_id).await,
            pending_count: self.queue.pending_for_channel(channel_id),
            is_tracked: true,
        }
    }
}
