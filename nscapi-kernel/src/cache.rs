/**
 * STATUS CACHE - Dernier résultat connu par couple (host, service)
 *
 * RÔLE :
 * Garde en mémoire le résultat le plus récent de chaque check passif et
 * la date depuis laquelle le check est dans son état actuel.
 *
 * FONCTIONNEMENT :
 * - Map à deux niveaux : host -> service -> Arc<CheckResult>
 * - Un seul écrivain (le worker d'ingestion), lecteurs concurrents (API)
 * - Le RwLock protège la structure des maps ; chaque entrée est immuable
 *   et remplacée en bloc, un lecteur ne voit jamais d'entrée à moitié écrite
 */

use crate::models::{CheckResult, HostsMap};
use parking_lot::RwLock;
use std::sync::Arc;

/// Une ligne du snapshot du cache
#[derive(Debug, Clone)]
pub struct CachedCheck {
    pub host: String,
    pub service: String,
    pub result: Arc<CheckResult>,
}

#[derive(Debug, Default)]
pub struct StatusCache {
    hosts: RwLock<HostsMap>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vide le cache. Le binaire part d'un cache neuf (`new`) et ne s'en sert pas.
    #[allow(dead_code)]
    pub fn init(&self) {
        self.hosts.write().clear();
    }

    /// Enregistre une observation, remplace l'entrée du couple (host, service).
    /// `status_first_seen` n'est conservé que si l'état n'a pas changé.
    pub fn update(&self, host: &str, service: &str, output: &str, timestamp: u32, state: i16) {
        let mut hosts = self.hosts.write();
        let services = hosts.entry(host.to_string()).or_default();

        let status_first_seen = match services.get(service) {
            Some(prev) if prev.state == state => prev.status_first_seen,
            _ => timestamp,
        };

        services.insert(
            service.to_string(),
            Arc::new(CheckResult {
                timestamp,
                status_first_seen,
                state,
                output: output.to_string(),
            }),
        );
    }

    #[cfg(test)]
    pub fn get(&self, host: &str, service: &str) -> Option<Arc<CheckResult>> {
        self.hosts.read().get(host)?.get(service).cloned()
    }

    /// Copie à l'instant t de toutes les entrées, triées par host puis service.
    /// Sous le read lock on ne clone que des `Arc`.
    pub fn snapshot(&self) -> Vec<CachedCheck> {
        let mut rows: Vec<CachedCheck> = {
            let hosts = self.hosts.read();
            hosts
                .iter()
                .flat_map(|(host, services)| {
                    services.iter().map(move |(service, result)| CachedCheck {
                        host: host.clone(),
                        service: service.clone(),
                        result: Arc::clone(result),
                    })
                })
                .collect()
        };
        rows.sort_by(|a, b| (&a.host, &a.service).cmp(&(&b.host, &b.service)));
        rows
    }

    pub fn host_count(&self) -> usize {
        self.hosts.read().len()
    }

    pub fn check_count(&self) -> usize {
        self.hosts.read().values().map(|s| s.len()).sum()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.check_count() == 0
    }
}
