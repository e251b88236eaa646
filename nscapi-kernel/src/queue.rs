/**
 * INGESTION QUEUE - File FIFO entre la couche protocole et le cache
 *
 * RÔLE :
 * Découple l'arrivée des paquets (MQTT) de la mise à jour du cache.
 * Le producteur ne touche jamais au cache et ne bloque jamais.
 *
 * FONCTIONNEMENT :
 * - `CheckQueue::enqueue` pousse dans un canal mpsc non borné
 * - `CacheWorker::run` dépile dans l'ordre et applique `StatusCache::update`
 * - RunMode::Forever attend sur le canal (pas de polling)
 * - RunMode::Drain rend la main dès que la file est vide (tests, arrêt)
 * - `run_until` : Forever puis Drain à l'arrêt, rien n'est perdu en file
 * - Un payload illisible est jeté avec un warning, le worker continue
 */

use crate::cache::StatusCache;
use crate::models::CheckPacket;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("payload is not a check packet: {0}")]
    TypeMismatch(#[from] serde_json::Error),
    #[error("cache worker is gone")]
    Closed,
}

/// Élément de la file : paquet déjà décodé par la couche protocole,
/// ou payload brut que le worker décodera.
#[derive(Debug, Clone)]
pub enum QueueItem {
    Packet(CheckPacket),
    Encoded(Vec<u8>),
}

impl From<CheckPacket> for QueueItem {
    fn from(p: CheckPacket) -> Self {
        QueueItem::Packet(p)
    }
}

impl From<Vec<u8>> for QueueItem {
    fn from(raw: Vec<u8>) -> Self {
        QueueItem::Encoded(raw)
    }
}

impl QueueItem {
    fn into_packet(self) -> Result<CheckPacket, IngestError> {
        match self {
            QueueItem::Packet(p) => Ok(p),
            QueueItem::Encoded(raw) => Ok(serde_json::from_slice(&raw)?),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Attend les éléments jusqu'à ce que tous les producteurs soient droppés
    Forever,
    /// Rend la main dès que la file est vide
    Drain,
}

/// Handle producteur, clonable
#[derive(Debug, Clone)]
pub struct CheckQueue {
    tx: UnboundedSender<QueueItem>,
    pending: Arc<AtomicUsize>,
}

pub struct CacheWorker {
    rx: UnboundedReceiver<QueueItem>,
    pending: Arc<AtomicUsize>,
    cache: Arc<StatusCache>,
}

/// Crée la file et l'unique worker qui alimente `cache`
pub fn channel(cache: Arc<StatusCache>) -> (CheckQueue, CacheWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));
    (
        CheckQueue { tx, pending: Arc::clone(&pending) },
        CacheWorker { rx, pending, cache },
    )
}

impl CheckQueue {
    /// Best effort, jamais bloquant. File fermée -> élément jeté.
    pub fn enqueue(&self, item: impl Into<QueueItem>) {
        if let Err(e) = self.try_enqueue(item) {
            warn!("[queue] dropping check: {}", e);
        }
    }

    pub fn try_enqueue(&self, item: impl Into<QueueItem>) -> Result<(), IngestError> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(item.into()).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            IngestError::Closed
        })
    }

    /// Éléments en file, pas encore pris par le worker
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheWorker {
    pub async fn run(&mut self, mode: RunMode) {
        if mode == RunMode::Forever {
            info!("[worker] cache worker started");
        }
        loop {
            let item = match mode {
                RunMode::Forever => match self.rx.recv().await {
                    Some(item) => item,
                    None => {
                        info!("[worker] queue closed, stopping");
                        return;
                    }
                },
                RunMode::Drain => match self.rx.try_recv() {
                    Ok(item) => item,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
                },
            };
            self.pending.fetch_sub(1, Ordering::SeqCst);
            self.apply(item);
        }
    }

    /// Tourne en Forever jusqu'à `shutdown`, puis vide ce qui reste en file.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = self.run(RunMode::Forever) => return,
            _ = shutdown => {}
        }
        info!("[worker] shutdown requested, flushing {} queued item(s)", self.pending.load(Ordering::SeqCst));
        self.run(RunMode::Drain).await;
    }

    fn apply(&self, item: QueueItem) {
        match item.into_packet() {
            Ok(p) => {
                debug!("[worker] {}/{} -> state {}", p.host, p.service, p.state);
                self.cache.update(&p.host, &p.service, &p.output, p.timestamp, p.state);
            }
            Err(e) => warn!("[worker] dropped queued item: {}", e),
        }
    }
}
