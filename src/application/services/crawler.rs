//! Depth-first crawl of the remote classification
//!
//! Every visited node is fetched, classified leaf/internal, persisted when it
//! is a changed leaf, and its children are always queued. Failures prune only
//! the subtree of the node they occur on.
//!
//! Without `cycle_guard` the remote graph is trusted to be acyclic and finite;
//! a cycle keeps the crawl running until the remote side stops answering.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::application::hash::fingerprint;
use crate::application::services::{EntityClient, TokenManager};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{child_entity_path, RemoteNode};
use crate::infrastructure::traits::EntityStore;

/// Something that happened to one node during a crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Node fetched and classified.
    Visited {
        path: String,
        who_id: Option<u64>,
        leaf: bool,
    },
    /// Leaf inserted (`created`) or updated in place.
    Saved {
        who_id: u64,
        title: Option<String>,
        created: bool,
    },
    /// Leaf fingerprint matched the stored row.
    Unchanged { who_id: u64, title: Option<String> },
    /// Token renewal failed; node and subtree skipped.
    AuthFailed { path: String, reason: String },
    /// Fetch failed; node and subtree skipped.
    FetchFailed { path: String, reason: String },
    /// Document malformed; node and subtree skipped.
    ParseFailed { path: String, reason: String },
    /// Path seen before in this run (only with `cycle_guard`).
    Revisited { path: String },
}

/// Counters for a finished crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub visited: usize,
    pub leaves: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub auth_failures: usize,
    pub fetch_failures: usize,
    pub parse_failures: usize,
    pub revisits: usize,
}

impl SyncReport {
    fn record(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Visited { leaf, .. } => {
                self.visited += 1;
                if *leaf {
                    self.leaves += 1;
                }
            }
            SyncEvent::Saved { created: true, .. } => self.inserted += 1,
            SyncEvent::Saved { created: false, .. } => self.updated += 1,
            SyncEvent::Unchanged { .. } => self.unchanged += 1,
            SyncEvent::AuthFailed { .. } => self.auth_failures += 1,
            SyncEvent::FetchFailed { .. } => self.fetch_failures += 1,
            SyncEvent::ParseFailed { .. } => self.parse_failures += 1,
            SyncEvent::Revisited { .. } => self.revisits += 1,
        }
    }

    /// Rows written in this run.
    pub fn saved(&self) -> usize {
        self.inserted + self.updated
    }

    /// Nodes skipped with their subtree.
    pub fn failures(&self) -> usize {
        self.auth_failures + self.fetch_failures + self.parse_failures
    }
}

/// Node waiting to be visited.
#[derive(Debug)]
struct Pending {
    path: String,
    parent_who_id: Option<u64>,
}

/// Crawls the remote tree and persists disease leaves.
pub struct CrawlerService {
    client: EntityClient,
    store: Arc<dyn EntityStore>,
    tokens: TokenManager,
}

impl CrawlerService {
    pub fn new(client: EntityClient, store: Arc<dyn EntityStore>, tokens: TokenManager) -> Self {
        Self {
            client,
            store,
            tokens,
        }
    }

    /// Full sync from the root path.
    ///
    /// The initial token acquisition is fatal on failure; everything after it
    /// is contained per node except store failures.
    pub fn sync<F>(&mut self, observer: F) -> ApplicationResult<SyncReport>
    where
        F: FnMut(&SyncEvent),
    {
        self.tokens.acquire()?;
        let root = self.client.options().root_path.clone();
        self.traverse(&root, None, observer)
    }

    /// Pre-order depth-first traversal starting at `entity_path`.
    ///
    /// Children are visited in API order. Only a store failure aborts the run.
    #[instrument(skip(self, observer))]
    pub fn traverse<F>(
        &mut self,
        entity_path: &str,
        parent_who_id: Option<u64>,
        mut observer: F,
    ) -> ApplicationResult<SyncReport>
    where
        F: FnMut(&SyncEvent),
    {
        let mut report = SyncReport::default();
        let mut emit = |event: SyncEvent| {
            report.record(&event);
            observer(&event);
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut stack = vec![Pending {
            path: entity_path.to_string(),
            parent_who_id,
        }];

        while let Some(pending) = stack.pop() {
            if self.client.options().cycle_guard && !seen.insert(pending.path.clone()) {
                warn!("Already visited {}, skipping", pending.path);
                emit(SyncEvent::Revisited { path: pending.path });
                continue;
            }

            let token = match self.tokens.ensure_fresh() {
                Ok(token) => token.to_string(),
                Err(e) => {
                    warn!("Skipping {}: {}", pending.path, e);
                    emit(SyncEvent::AuthFailed {
                        path: pending.path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let node = match self.client.fetch(&pending.path, &token) {
                Ok(node) => node,
                Err(ApplicationError::Domain(e)) => {
                    warn!("Malformed entity {}: {}", pending.path, e);
                    emit(SyncEvent::ParseFailed {
                        path: pending.path,
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    warn!("Failed to fetch entity: {} ({})", pending.path, e);
                    emit(SyncEvent::FetchFailed {
                        path: pending.path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            debug!(
                "visit {}: who_id={:?} children={}",
                pending.path,
                node.who_id,
                node.children.len()
            );
            emit(SyncEvent::Visited {
                path: pending.path.clone(),
                who_id: node.who_id,
                leaf: node.is_leaf(),
            });

            if node.is_leaf() {
                match self.persist_leaf(&node, pending.parent_who_id) {
                    Ok(event) => emit(event),
                    Err(ApplicationError::Domain(e)) => {
                        warn!("Cannot store leaf {}: {}", pending.path, e);
                        emit(SyncEvent::ParseFailed {
                            path: pending.path.clone(),
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }

            let children: Vec<Pending> = node
                .children
                .iter()
                .filter_map(|url| match child_entity_path(url) {
                    Some(path) => Some(Pending {
                        path,
                        parent_who_id: node.who_id,
                    }),
                    None => {
                        warn!("Ignoring child reference without id: {:?}", url);
                        None
                    }
                })
                .collect();
            stack.extend(children.into_iter().rev());
        }

        drop(emit);
        info!(
            "crawl done: visited={} saved={} unchanged={} failures={}",
            report.visited,
            report.saved(),
            report.unchanged,
            report.failures()
        );
        Ok(report)
    }

    /// Upsert a leaf if its fingerprint differs from the stored one.
    fn persist_leaf(
        &self,
        node: &RemoteNode,
        parent_who_id: Option<u64>,
    ) -> ApplicationResult<SyncEvent> {
        let record = node.to_record(parent_who_id, node.raw.to_string(), fingerprint(&node.raw))?;

        let stored = self
            .store
            .content_hash(record.who_id)
            .map_err(|e| ApplicationError::Store {
                context: format!("look up who_id {}", record.who_id),
                source: e,
            })?;

        if stored.as_deref() == Some(record.content_hash.as_str()) {
            info!("Skipped unchanged disease: {}", node.label());
            return Ok(SyncEvent::Unchanged {
                who_id: record.who_id,
                title: record.title,
            });
        }

        self.store
            .upsert(&record)
            .map_err(|e| ApplicationError::Store {
                context: format!("upsert who_id {}", record.who_id),
                source: e,
            })?;
        info!("Saved disease: {}", node.label());
        Ok(SyncEvent::Saved {
            who_id: record.who_id,
            title: record.title,
            created: stored.is_none(),
        })
    }
}
