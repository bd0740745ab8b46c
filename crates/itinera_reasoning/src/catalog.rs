//! Merged tool namespace across all provider connections.
//!
//! Discovery runs concurrently, but the merge walks providers in their
//! configured order, so the first provider to advertise a name always owns it
//! no matter which connection answered first.

use futures_util::future::join_all;
use itinera_core::config::UnavailablePolicy;
use itinera_core::tools::{ToolDescriptor, ToolProvider};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("tool provider '{provider}' unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },
    #[error("no tools discovered from {providers} provider(s)")]
    NoTools { providers: usize },
    #[error("unknown tool '{0}'")]
    ToolNotFound(String),
}

/// A name advertised by more than one provider. The earlier provider kept it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCollision {
    pub tool: String,
    pub kept_provider: String,
    pub shadowed_provider: String,
}

struct CatalogEntry {
    provider: Arc<dyn ToolProvider>,
}

/// Immutable name → (descriptor, provider) table for one request.
pub struct ToolCatalog {
    descriptors: Vec<ToolDescriptor>,
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
    collisions: Vec<ToolCollision>,
    omitted: Vec<String>,
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.descriptors.iter().map(|d| &d.name).collect::<Vec<_>>())
            .field("collisions", &self.collisions)
            .field("omitted", &self.omitted)
            .finish()
    }
}

impl ToolCatalog {
    /// Discover every provider's tools and merge them.
    pub async fn build(
        providers: &[Arc<dyn ToolProvider>],
        policy: UnavailablePolicy,
    ) -> Result<Self, CatalogError> {
        let discovered = join_all(providers.iter().map(|p| p.discover())).await;

        let mut catalog = Self {
            descriptors: Vec::new(),
            entries: Vec::new(),
            index: HashMap::new(),
            collisions: Vec::new(),
            omitted: Vec::new(),
        };

        for (provider, result) in providers.iter().zip(discovered) {
            let tools = match result {
                Ok(tools) => tools,
                Err(e) => match policy {
                    UnavailablePolicy::Fatal => {
                        tracing::error!("Tool provider '{}' unavailable: {:#}", provider.name(), e);
                        return Err(CatalogError::ProviderUnavailable {
                            provider: provider.name().to_string(),
                            reason: format!("{:#}", e),
                        });
                    }
                    UnavailablePolicy::Omit => {
                        tracing::warn!(
                            "Tool provider '{}' unavailable, omitting: {:#}",
                            provider.name(),
                            e
                        );
                        catalog.omitted.push(provider.name().to_string());
                        continue;
                    }
                },
            };
            tracing::info!(
                "Provider '{}': {} tool(s) discovered",
                provider.name(),
                tools.len()
            );
            for tool in tools {
                catalog.insert(tool, provider);
            }
        }

        if catalog.descriptors.is_empty() {
            return Err(CatalogError::NoTools {
                providers: providers.len(),
            });
        }
        Ok(catalog)
    }

    fn insert(&mut self, tool: ToolDescriptor, provider: &Arc<dyn ToolProvider>) {
        if let Some(&existing) = self.index.get(&tool.name) {
            if Arc::ptr_eq(&self.entries[existing].provider, provider) {
                tracing::debug!(
                    "Provider '{}' listed tool '{}' twice, keeping the first",
                    provider.name(),
                    tool.name
                );
                return;
            }
            let kept = self.entries[existing].provider.name().to_string();
            tracing::warn!(
                "Tool '{}' from '{}' shadowed by earlier provider '{}'",
                tool.name,
                provider.name(),
                kept
            );
            self.collisions.push(ToolCollision {
                tool: tool.name,
                kept_provider: kept,
                shadowed_provider: provider.name().to_string(),
            });
            return;
        }
        tracing::debug!("  → tool '{}' from provider '{}'", tool.name, provider.name());
        self.index.insert(tool.name.clone(), self.descriptors.len());
        self.descriptors.push(tool);
        self.entries.push(CatalogEntry {
            provider: provider.clone(),
        });
    }

    pub fn resolve(&self, name: &str) -> Result<&ToolDescriptor, CatalogError> {
        self.index
            .get(name)
            .map(|&i| &self.descriptors[i])
            .ok_or_else(|| CatalogError::ToolNotFound(name.to_string()))
    }

    /// Descriptor plus owning provider.
    pub(crate) fn route(
        &self,
        name: &str,
    ) -> Result<(&ToolDescriptor, &Arc<dyn ToolProvider>), CatalogError> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| CatalogError::ToolNotFound(name.to_string()))?;
        Ok((&self.descriptors[i], &self.entries[i].provider))
    }

    /// All tools in provider order, then advertisement order.
    pub fn describe_all(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Name of the provider that owns `name`.
    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&i| self.entries[i].provider.name())
    }

    pub fn collisions(&self) -> &[ToolCollision] {
        &self.collisions
    }

    /// Providers left out under `UnavailablePolicy::Omit`.
    pub fn omitted(&self) -> &[String] {
        &self.omitted
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{descriptor, StubProvider};
    use super::*;
    use std::time::Duration;

    fn arc(p: StubProvider) -> Arc<dyn ToolProvider> {
        Arc::new(p)
    }

    #[tokio::test]
    async fn test_merges_in_provider_order() {
        let travel = StubProvider::new(
            "travel",
            vec![descriptor("get_flights", &[]), descriptor("get_hotels", &[])],
        );
        let dest = StubProvider::new("destination", vec![descriptor("get_weather", &[])]);
        let catalog = ToolCatalog::build(&[arc(travel), arc(dest)], UnavailablePolicy::Fatal)
            .await
            .unwrap();
        let names: Vec<_> = catalog.describe_all().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["get_flights", "get_hotels", "get_weather"]);
        assert_eq!(catalog.owner_of("get_weather"), Some("destination"));
        assert!(catalog.collisions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_provider_wins_regardless_of_completion_order() {
        // The first provider answers last.
        let mut slow = StubProvider::new("slow", vec![descriptor("get_weather", &[])]);
        slow.discover_delay = Duration::from_secs(5);
        let fast = StubProvider::new(
            "fast",
            vec![descriptor("get_weather", &[]), descriptor("get_local_events", &[])],
        );
        let catalog = ToolCatalog::build(&[arc(slow), arc(fast)], UnavailablePolicy::Fatal)
            .await
            .unwrap();

        assert_eq!(catalog.owner_of("get_weather"), Some("slow"));
        assert_eq!(
            catalog.collisions(),
            &[ToolCollision {
                tool: "get_weather".into(),
                kept_provider: "slow".into(),
                shadowed_provider: "fast".into(),
            }]
        );
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test]
    async fn test_collision_recorded_once_per_shadowed_provider() {
        let a = StubProvider::new("a", vec![descriptor("search", &[])]);
        let b = StubProvider::new("b", vec![descriptor("search", &[])]);
        let c = StubProvider::new("c", vec![descriptor("search", &[])]);
        let catalog = ToolCatalog::build(&[arc(a), arc(b), arc(c)], UnavailablePolicy::Fatal)
            .await
            .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.collisions().len(), 2);
        assert!(catalog.collisions().iter().all(|c| c.kept_provider == "a"));
        assert_eq!(
            catalog
                .collisions()
                .iter()
                .filter(|c| c.shadowed_provider == "b")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_repeated_name_within_one_provider_is_not_a_collision() {
        let travel = StubProvider::new(
            "travel",
            vec![descriptor("get_flights", &["origin"]), descriptor("get_flights", &[])],
        );
        let catalog = ToolCatalog::build(&[arc(travel)], UnavailablePolicy::Fatal)
            .await
            .unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.collisions().is_empty());
        assert_eq!(catalog.describe_all()[0].input_schema.required, vec!["origin"]);
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_fatal_by_default() {
        let ok = StubProvider::new("travel", vec![descriptor("get_flights", &[])]);
        let mut down = StubProvider::new("destination", vec![descriptor("get_weather", &[])]);
        down.fail_discovery = true;
        let err = ToolCatalog::build(&[arc(ok), arc(down)], UnavailablePolicy::Fatal)
            .await
            .unwrap_err();
        match err {
            CatalogError::ProviderUnavailable { provider, reason } => {
                assert_eq!(provider, "destination");
                assert!(reason.contains("connection refused"));
            }
            other => panic!("Expected ProviderUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_omit_policy_skips_unavailable_provider() {
        let ok = StubProvider::new("travel", vec![descriptor("get_flights", &[])]);
        let mut down = StubProvider::new("destination", vec![descriptor("get_weather", &[])]);
        down.fail_discovery = true;
        let catalog = ToolCatalog::build(&[arc(ok), arc(down)], UnavailablePolicy::Omit)
            .await
            .unwrap();
        assert_eq!(catalog.omitted(), &["destination".to_string()]);
        assert!(catalog.resolve("get_weather").is_err());
        assert!(catalog.resolve("get_flights").is_ok());
    }

    #[tokio::test]
    async fn test_empty_catalog_rejected() {
        let empty = StubProvider::new("travel", vec![]);
        let err = ToolCatalog::build(&[arc(empty)], UnavailablePolicy::Fatal)
            .await
            .unwrap_err();
        assert_eq!(err, CatalogError::NoTools { providers: 1 });
    }

    #[tokio::test]
    async fn test_resolve_unknown() {
        let p = StubProvider::new("travel", vec![descriptor("get_flights", &[])]);
        let catalog = ToolCatalog::build(&[arc(p)], UnavailablePolicy::Fatal)
            .await
            .unwrap();
        assert_eq!(
            catalog.resolve("book_flight").unwrap_err(),
            CatalogError::ToolNotFound("book_flight".into())
        );
    }
}
