use std::collections::{BTreeMap, HashSet};

use crate::{Model, PolicyError};

/// One line of a rule source: `p, admin, /api/*, *` or `g, alice, admin`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyRule {
    pub ptype: String,
    pub values: Vec<String>,
}

impl PolicyRule {
    pub fn new<I, S>(ptype: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ptype: ptype.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allow(sub: &str, obj: &str, act: &str) -> Self {
        Self::new("p", [sub, obj, act])
    }

    pub fn inherit(child: &str, parent: &str) -> Self {
        Self::new("g", [child, parent])
    }
}

/// Rules checked against a model, deduplicated and grouped by rule type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    policies: BTreeMap<String, Vec<Vec<String>>>,
    links: BTreeMap<String, Vec<Vec<String>>>,
}

impl RuleSet {
    pub fn build(model: &Model, rules: &[PolicyRule]) -> Result<Self, PolicyError> {
        let mut set = Self::default();
        let mut seen: HashSet<&PolicyRule> = HashSet::new();

        for (index, rule) in rules.iter().enumerate() {
            let invalid = |reason: String| PolicyError::InvalidRule {
                index,
                ptype: rule.ptype.clone(),
                reason,
            };
            if rule.values.iter().any(|v| v.is_empty()) {
                return Err(invalid("empty value".into()));
            }

            let (expected, target) = if let Some(fields) = model.policy_fields(&rule.ptype) {
                if let Some(eft) = fields.iter().position(|f| f == "eft") {
                    match rule.values.get(eft).map(String::as_str) {
                        None | Some("allow" | "deny") => {}
                        Some(other) => return Err(invalid(format!("unknown effect `{other}`"))),
                    }
                }
                (fields.len(), &mut set.policies)
            } else if let Some(arity) = model.role_arity(&rule.ptype) {
                (arity, &mut set.links)
            } else {
                return Err(invalid("rule type is not declared by the model".into()));
            };
            if rule.values.len() != expected {
                return Err(invalid(format!(
                    "expected {expected} values, found {}",
                    rule.values.len()
                )));
            }

            if seen.insert(rule) {
                target
                    .entry(rule.ptype.clone())
                    .or_default()
                    .push(rule.values.clone());
            }
        }

        Ok(set)
    }

    /// Policy rules plus inheritance links, after deduplication.
    pub fn len(&self) -> usize {
        self.policy_count() + self.link_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn policy_count(&self) -> usize {
        self.policies.values().map(Vec::len).sum()
    }

    pub fn link_count(&self) -> usize {
        self.links.values().map(Vec::len).sum()
    }

    pub(crate) fn policies(&self) -> impl Iterator<Item = (&str, &[Vec<String>])> {
        self.policies.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub(crate) fn links(&self) -> impl Iterator<Item = (&str, &[Vec<String>])> {
        self.links.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}
