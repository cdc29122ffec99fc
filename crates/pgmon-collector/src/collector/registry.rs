use std::collections::{BTreeMap, HashMap};

use pgmon_common::error::{PgmonError, Result};
use tracing::{debug, warn};

use super::{Collector, CollectorConfig};

/// Builds a collector from shared configuration. Must not touch the database.
pub type CollectorFactory = fn(&CollectorConfig) -> Result<Box<dyn Collector>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Enabled,
    Disabled,
}

impl CollectorState {
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

struct Registration {
    default_state: CollectorState,
    factory: CollectorFactory,
}

/// Name-keyed table of collector kinds, filled once at startup.
#[derive(Default)]
pub struct CollectorRegistry {
    entries: BTreeMap<&'static str, Registration>,
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("collectors", &self.names())
            .finish()
    }
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &'static str,
        default_state: CollectorState,
        factory: CollectorFactory,
    ) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(PgmonError::CollectorAlreadyRegistered(name.to_string()));
        }

        self.entries.insert(
            name,
            Registration {
                default_state,
                factory,
            },
        );
        debug!(collector = name, ?default_state, "collector registered");
        Ok(())
    }

    /// Registered names in lexical order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    pub fn default_state(&self, name: &str) -> Option<CollectorState> {
        self.entries.get(name).map(|entry| entry.default_state)
    }

    /// Resolves whether `name` runs, letting an explicit override win over the
    /// registered default.
    pub fn is_enabled(&self, name: &str, overrides: &HashMap<String, bool>) -> Result<bool> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| PgmonError::UnknownCollector(name.to_string()))?;

        Ok(overrides
            .get(name)
            .copied()
            .unwrap_or_else(|| entry.default_state.is_enabled()))
    }

    /// Constructs every enabled collector.
    ///
    /// An override naming an unregistered collector is an error. A failing
    /// constructor only drops its own collector.
    pub fn build_enabled(
        &self,
        config: &CollectorConfig,
        overrides: &HashMap<String, bool>,
    ) -> Result<Vec<(&'static str, Box<dyn Collector>)>> {
        if let Some(unknown) = overrides
            .keys()
            .find(|name| !self.entries.contains_key(name.as_str()))
        {
            return Err(PgmonError::UnknownCollector(unknown.clone()));
        }

        let mut collectors = Vec::new();
        for (name, entry) in &self.entries {
            if !self.is_enabled(name, overrides)? {
                continue;
            }

            match (entry.factory)(config) {
                Ok(collector) => collectors.push((*name, collector)),
                Err(err) => {
                    warn!(collector = name, error = %err, "failed to construct collector");
                }
            }
        }

        Ok(collectors)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use pgmon_common::{PgmonError, Result};

    use super::{CollectorRegistry, CollectorState};
    use crate::{
        collector::{Collector, CollectorConfig, MetricSink},
        db::{Database, QueryContext},
    };

    struct NoopCollector;

    #[async_trait]
    impl Collector for NoopCollector {
        async fn update(
            &self,
            _ctx: &QueryContext,
            _db: &dyn Database,
            _sink: &MetricSink,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn noop(_config: &CollectorConfig) -> Result<Box<dyn Collector>> {
        Ok(Box::new(NoopCollector))
    }

    fn broken(_config: &CollectorConfig) -> Result<Box<dyn Collector>> {
        Err(PgmonError::MissingConfig("dsn".to_string()))
    }

    fn registry() -> CollectorRegistry {
        let mut registry = CollectorRegistry::new();
        registry.register("alpha", CollectorState::Enabled, noop).unwrap();
        registry.register("beta", CollectorState::Disabled, noop).unwrap();
        registry
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = registry();
        let err = registry
            .register("alpha", CollectorState::Disabled, noop)
            .unwrap_err();
        assert!(matches!(err, PgmonError::CollectorAlreadyRegistered(name) if name == "alpha"));
        assert_eq!(registry.default_state("alpha"), Some(CollectorState::Enabled));
    }

    #[test]
    fn overrides_win_over_defaults() {
        let registry = registry();
        let none = HashMap::new();
        assert!(registry.is_enabled("alpha", &none).unwrap());
        assert!(!registry.is_enabled("beta", &none).unwrap());

        let overrides = HashMap::from([
            ("alpha".to_string(), false),
            ("beta".to_string(), true),
        ]);
        assert!(!registry.is_enabled("alpha", &overrides).unwrap());
        assert!(registry.is_enabled("beta", &overrides).unwrap());
    }

    #[test]
    fn build_enabled_uses_resolved_state() {
        let registry = registry();
        let built = registry
            .build_enabled(&CollectorConfig::default(), &HashMap::new())
            .unwrap();
        let names: Vec<_> = built.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["alpha"]);
    }

    #[test]
    fn unknown_override_is_rejected() {
        let registry = registry();
        let overrides = HashMap::from([("gamma".to_string(), true)]);
        let err = registry
            .build_enabled(&CollectorConfig::default(), &overrides)
            .err()
            .unwrap();
        assert!(matches!(err, PgmonError::UnknownCollector(name) if name == "gamma"));
    }

    #[test]
    fn constructor_failure_only_drops_that_collector() {
        let mut registry = registry();
        registry
            .register("broken", CollectorState::Enabled, broken)
            .unwrap();

        let built = registry
            .build_enabled(&CollectorConfig::default(), &HashMap::new())
            .unwrap();
        let names: Vec<_> = built.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["alpha"]);
    }
}
