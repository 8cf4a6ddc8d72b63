//! Access control model in casbin's `.conf` format.
//!
//! ```text
//! [request_definition]
//! r = sub, obj, act
//!
//! [policy_definition]
//! p = sub, obj, act
//!
//! [role_definition]
//! g = _, _
//!
//! [policy_effect]
//! e = some(where (p.eft == allow))
//!
//! [matchers]
//! m = g(r.sub, p.sub) && keyMatch2(r.obj, p.obj) && r.act == p.act
//! ```
//!
//! casbin owns parsing and evaluation. [`Model`] keeps the validated text so a
//! fresh enforcer can be compiled for every rule snapshot, plus the shape of
//! each rule type so rule sources can be checked before they reach casbin.

use std::collections::BTreeMap;
use std::path::Path;

use casbin::DefaultModel;

use crate::ModelError;

/// Model used when no model file is configured.
pub const DEFAULT_MODEL: &str = include_str!("model.conf");

/// A model casbin has accepted. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    text: String,
    policy_types: BTreeMap<String, Vec<String>>,
    role_types: BTreeMap<String, usize>,
}

impl Model {
    pub async fn default_rbac() -> Result<Self, ModelError> {
        Self::parse(DEFAULT_MODEL).await
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ModelError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::parse(&text).await
    }

    pub async fn parse(text: &str) -> Result<Self, ModelError> {
        DefaultModel::from_str(text)
            .await
            .map_err(|e| ModelError::Invalid(e.to_string()))?;

        let mut policy_types = BTreeMap::new();
        let mut role_types = BTreeMap::new();
        for (section, key, fields) in definitions(text) {
            match section {
                "policy_definition" => {
                    policy_types.insert(key.to_string(), fields);
                }
                "role_definition" => {
                    role_types.insert(key.to_string(), fields.len());
                }
                _ => {}
            }
        }
        if policy_types.is_empty() {
            return Err(ModelError::MissingSection("policy_definition"));
        }

        Ok(Self {
            text: text.to_string(),
            policy_types,
            role_types,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Field names of a policy type (`p`, `p2`, ...).
    pub fn policy_fields(&self, ptype: &str) -> Option<&[String]> {
        self.policy_types.get(ptype).map(Vec::as_slice)
    }

    /// Number of values a grouping rule (`g`, `g2`, ...) carries.
    pub fn role_arity(&self, gtype: &str) -> Option<usize> {
        self.role_types.get(gtype).copied()
    }

    pub fn has_roles(&self) -> bool {
        !self.role_types.is_empty()
    }

    pub(crate) async fn compile(&self) -> Result<DefaultModel, ModelError> {
        DefaultModel::from_str(&self.text)
            .await
            .map_err(|e| ModelError::Invalid(e.to_string()))
    }
}

/// `key = a, b, c` lines with the section they appear in.
fn definitions(text: &str) -> impl Iterator<Item = (&str, &str, Vec<String>)> {
    let mut section = "";
    text.lines().filter_map(move |raw| {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            return None;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim();
            return None;
        }
        let (key, value) = line.split_once('=')?;
        let fields = value.split(',').map(|f| f.trim().to_string()).collect();
        Some((section, key.trim(), fields))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedded_default_model_compiles() {
        let model = Model::default_rbac().await.unwrap();
        assert_eq!(model.policy_fields("p").unwrap(), ["sub", "obj", "act"]);
        assert_eq!(model.role_arity("g"), Some(2));
        assert!(model.has_roles());
        assert!(model.compile().await.is_ok());
    }

    #[tokio::test]
    async fn deny_capable_model_without_roles() {
        let model = Model::parse(
            "[request_definition]\nr = sub, obj, act\n\
             [policy_definition]\np = sub, obj, act, eft\n\
             [policy_effect]\ne = some(where (p.eft == allow)) && !some(where (p.eft == deny))\n\
             [matchers]\nm = r.sub == p.sub && keyMatch(r.obj, p.obj) && r.act == p.act",
        )
        .await
        .unwrap();
        assert_eq!(model.policy_fields("p").unwrap().len(), 4);
        assert_eq!(model.policy_fields("p2"), None);
        assert!(!model.has_roles());
    }

    #[tokio::test]
    async fn model_without_policy_definition_is_rejected() {
        assert!(Model::parse("[request_definition]\nr = sub, obj, act\n").await.is_err());
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        assert!(matches!(
            Model::from_file("/definitely/not/here.conf").await,
            Err(ModelError::Read { .. })
        ));
    }
}
