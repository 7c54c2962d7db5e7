//! The scoped configuration store.
//!
//! Policy (is a window engine-enabled, which features it gets, how its tab
//! strip looks) is resolved by deep-merging partial configuration entries
//! layered over four scopes: service < desktop < application < window.
//! Entries may carry rules that re-target their payload at narrower scopes
//! via literal or regex matches.

pub mod mask;
pub mod object;
pub mod scope;
pub mod store;

pub use mask::{ConfigMask, FeaturesMask, TabstripMask};
pub use object::{ConfigObject, FeaturesConfig, TabstripConfig};
pub use scope::{RegexPattern, Rule, Scope, ScopeLevel, ScopePattern, StringMatch};
pub use store::{ConfigError, ConfigStore, WatchId};
