//! Upstream pool management.
//!
//! # Responsibilities
//! - Build upstreams by name from configuration
//! - Carry health records across reloads for unchanged upstreams

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::schema::UpstreamConfig;
use crate::upstream::backend::Upstream;

#[derive(Debug, Default)]
pub struct UpstreamPool {
    upstreams: HashMap<String, Arc<Upstream>>,
}

impl UpstreamPool {
    /// Build a pool, reusing health records from `previous` where the
    /// upstream's name and address are unchanged.
    pub fn build(
        configs: &[UpstreamConfig],
        previous: Option<&UpstreamPool>,
    ) -> Result<Self, axum::http::uri::InvalidUri> {
        let mut upstreams = HashMap::with_capacity(configs.len());
        for config in configs {
            let health = previous
                .and_then(|pool| pool.get(&config.name))
                .filter(|old| old.same_server(config))
                .map(|old| Arc::clone(&old.health))
                .unwrap_or_default();
            upstreams.insert(config.name.clone(), Arc::new(Upstream::new(config, health)?));
        }
        Ok(Self { upstreams })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Upstream>> {
        self.upstreams.get(name)
    }

    /// All upstreams, sorted by name.
    pub fn all(&self) -> Vec<Arc<Upstream>> {
        let mut all: Vec<_> = self.upstreams.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_survives_reload_for_same_server() {
        let first = UpstreamPool::build(
            &[
                UpstreamConfig::new("webapp", "127.0.0.1:8000"),
                UpstreamConfig::new("encoder", "127.0.0.1:9000"),
            ],
            None,
        )
        .unwrap();
        first.get("webapp").unwrap().health.mark_failure(1);
        first.get("encoder").unwrap().health.mark_failure(1);

        let second = UpstreamPool::build(
            &[
                UpstreamConfig::new("webapp", "127.0.0.1:8000"),
                UpstreamConfig::new("encoder", "127.0.0.1:9100"),
            ],
            Some(&first),
        )
        .unwrap();

        assert!(!second.get("webapp").unwrap().health.is_healthy());
        assert!(second.get("encoder").unwrap().health.is_healthy());
        assert_eq!(
            second.all().iter().map(|u| u.name.as_str()).collect::<Vec<_>>(),
            ["encoder", "webapp"]
        );
    }
}
