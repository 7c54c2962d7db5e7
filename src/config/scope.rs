use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::collections::HashMap;
use crate::config::object::ConfigObject;
use crate::sys::runtime::WindowId;

/// A level in the configuration hierarchy, broadest first.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum Scope {
    Service,
    Desktop,
    Application { uuid: String },
    Window { uuid: String, name: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    Service,
    Desktop,
    Application,
    Window,
}

impl ScopeLevel {
    pub fn rank(self) -> u8 {
        match self {
            ScopeLevel::Service => 0,
            ScopeLevel::Desktop => 1,
            ScopeLevel::Application => 2,
            ScopeLevel::Window => 3,
        }
    }
}

impl Scope {
    pub fn window(id: &WindowId) -> Scope {
        Scope::Window { uuid: id.uuid.clone(), name: id.name.clone() }
    }

    pub fn application(uuid: impl Into<String>) -> Scope {
        Scope::Application { uuid: uuid.into() }
    }

    pub fn level(&self) -> ScopeLevel {
        match self {
            Scope::Service => ScopeLevel::Service,
            Scope::Desktop => ScopeLevel::Desktop,
            Scope::Application { .. } => ScopeLevel::Application,
            Scope::Window { .. } => ScopeLevel::Window,
        }
    }

    /// True when `self` is broader-than-or-equal to `target` and they agree
    /// on the components both specify. The finer components of `target` are
    /// wildcarded in the broader scope.
    pub fn matches(&self, target: &Scope) -> bool {
        match (self, target) {
            (Scope::Service, _) => true,
            (Scope::Desktop, Scope::Service) => false,
            (Scope::Desktop, _) => true,
            (Scope::Application { uuid }, Scope::Application { uuid: t }) => uuid == t,
            (Scope::Application { uuid }, Scope::Window { uuid: t, .. }) => uuid == t,
            (Scope::Application { .. }, _) => false,
            (Scope::Window { uuid, name }, Scope::Window { uuid: tu, name: tn }) => {
                uuid == tu && name == tn
            }
            (Scope::Window { .. }, _) => false,
        }
    }
}

/// A literal string or a regex pattern, as rules appear in manifests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringMatch {
    Literal(String),
    Pattern(RegexPattern),
}

impl StringMatch {
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            StringMatch::Literal(s) => s == value,
            StringMatch::Pattern(p) => p.is_match(value),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegexPattern {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
    #[serde(default)]
    pub invert: bool,
}

// Compiled patterns are cached for the lifetime of the process; manifests
// repeat the same handful of expressions across many queries.
static REGEX_CACHE: Lazy<Mutex<HashMap<String, Option<Regex>>>> =
    Lazy::new(|| Mutex::new(HashMap::default()));

impl RegexPattern {
    fn source(&self) -> String {
        match self.flags.as_deref() {
            Some(flags) if flags.contains('i') => format!("(?i){}", self.expression),
            _ => self.expression.clone(),
        }
    }

    pub fn is_match(&self, value: &str) -> bool {
        let source = self.source();
        let mut cache = REGEX_CACHE.lock();
        let compiled = cache.entry(source.clone()).or_insert_with(|| match Regex::new(&source) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Invalid rule pattern '{}': {e}", source);
                None
            }
        });
        let matched = compiled.as_ref().map_or(false, |re| re.is_match(value));
        matched != self.invert
    }
}

/// The scope selector of a rule: a level plus optional component matchers.
/// A missing matcher wildcards that component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScopePattern {
    pub level: ScopeLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<StringMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<StringMatch>,
}

impl ScopePattern {
    /// A rule applies to scopes at or below its own level whose components
    /// match. Querying a broader scope than the rule targets never matches.
    pub fn matches(&self, target: &Scope) -> bool {
        if self.level.rank() > target.level().rank() {
            return false;
        }
        let (uuid, name) = match target {
            Scope::Service | Scope::Desktop => (None, None),
            Scope::Application { uuid } => (Some(uuid.as_str()), None),
            Scope::Window { uuid, name } => (Some(uuid.as_str()), Some(name.as_str())),
        };
        if let Some(ref matcher) = self.uuid {
            match uuid {
                Some(u) if matcher.is_match(u) => {}
                _ => return false,
            }
        }
        if let Some(ref matcher) = self.name {
            match name {
                Some(n) if matcher.is_match(n) => {}
                _ => return false,
            }
        }
        true
    }
}

/// A configuration payload re-targeted at the scopes a pattern selects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub scope: ScopePattern,
    pub config: ConfigObject,
}
