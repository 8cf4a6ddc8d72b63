use std::sync::{PoisonError, RwLock};

use crate::{PolicyRule, SourceError};

/// Where rules come from. Called once at load and again on every reload.
pub trait PolicySource: Send + Sync {
    fn load(&self) -> Result<Vec<PolicyRule>, SourceError>;
}

/// Rules held in memory. `replace` followed by a reload swaps them in.
#[derive(Debug, Default)]
pub struct StaticPolicySource {
    rules: RwLock<Vec<PolicyRule>>,
}

impl StaticPolicySource {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    pub fn from_csv(text: &str) -> Result<Self, SourceError> {
        Ok(Self::new(parse_rules(text)?))
    }

    pub fn replace(&self, rules: Vec<PolicyRule>) {
        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = rules;
    }
}

impl PolicySource for StaticPolicySource {
    fn load(&self) -> Result<Vec<PolicyRule>, SourceError> {
        Ok(self.rules.read().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// Parse CSV rule lines (`ptype, v0, v1, ...`). Blank lines and lines
/// starting with `#` are skipped.
pub fn parse_rules(text: &str) -> Result<Vec<PolicyRule>, SourceError> {
    let mut rules = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut cols = line.split(',').map(str::trim);
        let ptype = cols.next().unwrap_or_default();
        let values: Vec<&str> = cols.collect();
        if ptype.is_empty() || values.is_empty() {
            return Err(SourceError::Parse {
                line: idx + 1,
                reason: format!("expected `ptype, value, ...`, got `{line}`"),
            });
        }
        rules.push(PolicyRule::new(ptype, values));
    }
    Ok(rules)
}
