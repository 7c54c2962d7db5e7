use slotmap::{SlotMap, new_key_type};
use thiserror::Error;
use tracing::debug;

use crate::config::mask::ConfigMask;
use crate::config::object::ConfigObject;
use crate::config::scope::{Rule, Scope, ScopeLevel};

new_key_type! { pub struct WatchId; }

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("rule targets {rule:?}, broader than its source scope {from_scope:?}")]
    InvalidScope { from_scope: ScopeLevel, rule: ScopeLevel },
}

struct ConfigEntry {
    source: Scope,
    config: ConfigObject,
    rules: Vec<Rule>,
}

struct Watcher {
    scope: Scope,
    mask: ConfigMask,
    last: ConfigObject,
    callback: Box<dyn FnMut(&ConfigObject)>,
}

/// Layered configuration entries with rule-based re-targeting.
///
/// A plain in-process structure: it mutates only on explicit `add` /
/// `remove_from_source`, both synchronous, so every other component reads it
/// without coordination.
#[derive(Default)]
pub struct ConfigStore {
    entries: Vec<ConfigEntry>,
    watchers: SlotMap<WatchId, Watcher>,
}

impl ConfigStore {
    pub fn new() -> Self { Self::default() }

    /// Insert an entry. The unconditional payload applies at `source`; each
    /// rule re-targets its own payload at the scopes its pattern selects.
    /// A rule may only target scopes at or below the scope it was added at.
    pub fn add(
        &mut self,
        source: Scope,
        config: ConfigObject,
        rules: Vec<Rule>,
    ) -> Result<(), ConfigError> {
        for rule in &rules {
            if rule.scope.level.rank() < source.level().rank() {
                return Err(ConfigError::InvalidScope {
                    from_scope: source.level(),
                    rule: rule.scope.level,
                });
            }
        }
        debug!(?source, rules = rules.len(), "config entry added");
        self.entries.push(ConfigEntry { source, config, rules });
        self.notify_watchers();
        Ok(())
    }

    /// Drop every entry contributed by `source`.
    pub fn remove_from_source(&mut self, source: &Scope) {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.source != *source);
        if self.entries.len() != before {
            debug!(?source, removed = before - self.entries.len(), "config entries removed");
            self.notify_watchers();
        }
    }

    /// Effective configuration at `scope`: matching layers deep-merged in
    /// ascending priority, broader first, insertion order breaking ties.
    pub fn effective(&self, scope: &Scope) -> ConfigObject {
        let mut layers: Vec<(u8, usize, &ConfigObject)> = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if !entry.source.matches(scope) {
                continue;
            }
            if entry.rules.is_empty() {
                layers.push((entry.source.level().rank(), index, &entry.config));
                continue;
            }
            for rule in &entry.rules {
                if rule.scope.matches(scope) {
                    layers.push((rule.scope.level.rank(), index, &rule.config));
                }
            }
        }
        layers.sort_by_key(|&(rank, index, _)| (rank, index));

        let mut merged = ConfigObject::default();
        for (_, _, config) in layers {
            merged.merge(config);
        }
        merged
    }

    /// Masked effective configuration at `scope`.
    pub fn query(&self, scope: &Scope, mask: &ConfigMask) -> ConfigObject {
        self.effective(scope).masked(mask)
    }

    /// Register a callback fired whenever the masked result at `scope`
    /// changes. Fires only on change, not on registration.
    pub fn watch(
        &mut self,
        scope: Scope,
        mask: ConfigMask,
        callback: impl FnMut(&ConfigObject) + 'static,
    ) -> WatchId {
        let last = self.query(&scope, &mask);
        self.watchers.insert(Watcher { scope, mask, last, callback: Box::new(callback) })
    }

    pub fn unwatch(&mut self, id: WatchId) { self.watchers.remove(id); }

    fn notify_watchers(&mut self) {
        // Recompute against an immutable view of the entries; callbacks only
        // borrow the changed value.
        let results: Vec<(WatchId, ConfigObject)> = self
            .watchers
            .iter()
            .map(|(id, watcher)| (id, self.effective(&watcher.scope).masked(&watcher.mask)))
            .collect();
        for (id, current) in results {
            if let Some(watcher) = self.watchers.get_mut(id) {
                if watcher.last != current {
                    watcher.last = current.clone();
                    (watcher.callback)(&current);
                }
            }
        }
    }
}
