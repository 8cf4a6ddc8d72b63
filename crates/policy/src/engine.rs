use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use casbin::{CoreApi, MemoryAdapter, MgmtApi};
use tokio::sync::Mutex;

use crate::{EnforceError, Model, PolicyError, PolicySource, RuleSet};

/// Decision seam used by the authorization middleware.
#[async_trait]
pub trait Enforcer: Send + Sync {
    /// `Ok(true)` allows. Callers must treat `Err` as deny.
    fn enforce(&self, role: &str, resource: &str, action: &str) -> Result<bool, EnforceError>;

    /// Re-read the rule source and swap it in. Returns the loaded rule count.
    async fn reload(&self) -> Result<usize, PolicyError>;
}

struct Snapshot {
    enforcer: casbin::Enforcer,
    rules: usize,
    generation: u64,
}

/// Model plus the casbin enforcer built from the current rules.
///
/// Every reload builds a new enforcer and swaps it in with one store, so a
/// concurrent call sees either the old rule set or the new one, never a mix.
pub struct PolicyEngine {
    model: Model,
    source: Arc<dyn PolicySource>,
    snapshot: ArcSwap<Snapshot>,
    reload_lock: Mutex<()>,
}

impl PolicyEngine {
    pub async fn load(model: Model, source: Arc<dyn PolicySource>) -> Result<Self, PolicyError> {
        let rules = RuleSet::build(&model, &source.load()?)?;
        let enforcer = build_enforcer(&model, &rules).await?;
        tracing::info!(
            rules = rules.len(),
            policies = rules.policy_count(),
            "policy loaded"
        );
        Ok(Self {
            model,
            source,
            snapshot: ArcSwap::from_pointee(Snapshot {
                enforcer,
                rules: rules.len(),
                generation: 0,
            }),
            reload_lock: Mutex::new(()),
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Number of rules in the active snapshot.
    pub fn rule_count(&self) -> usize {
        self.snapshot.load().rules
    }

    /// Incremented by every successful reload.
    pub fn generation(&self) -> u64 {
        self.snapshot.load().generation
    }

    pub fn enforce(&self, role: &str, resource: &str, action: &str) -> Result<bool, EnforceError> {
        let snapshot = self.snapshot.load();
        // casbin's regexMatch panics on a pattern that does not compile.
        catch_unwind(AssertUnwindSafe(|| {
            snapshot.enforcer.enforce((role, resource, action))
        }))
        .map_err(|payload| EnforceError::Panicked(panic_text(payload.as_ref())))?
        .map_err(|e| EnforceError::Evaluation(e.to_string()))
    }

    /// On failure the previous snapshot stays active.
    pub async fn reload(&self) -> Result<usize, PolicyError> {
        let _guard = self.reload_lock.lock().await;

        let rules = RuleSet::build(&self.model, &self.source.load()?)?;
        let enforcer = build_enforcer(&self.model, &rules).await?;
        let count = rules.len();
        let generation = self.snapshot.load().generation + 1;
        self.snapshot.store(Arc::new(Snapshot {
            enforcer,
            rules: count,
            generation,
        }));

        tracing::info!(rules = count, generation, "policy reloaded");
        Ok(count)
    }
}

#[async_trait]
impl Enforcer for PolicyEngine {
    fn enforce(&self, role: &str, resource: &str, action: &str) -> Result<bool, EnforceError> {
        PolicyEngine::enforce(self, role, resource, action)
    }

    async fn reload(&self) -> Result<usize, PolicyError> {
        PolicyEngine::reload(self).await
    }
}

impl core::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let snapshot = self.snapshot.load();
        f.debug_struct("PolicyEngine")
            .field("rules", &snapshot.rules)
            .field("generation", &snapshot.generation)
            .finish_non_exhaustive()
    }
}

async fn build_enforcer(model: &Model, rules: &RuleSet) -> Result<casbin::Enforcer, PolicyError> {
    let casbin_err = |e: casbin::Error| PolicyError::Enforcer(e.to_string());

    let mut enforcer = casbin::Enforcer::new(model.compile().await?, MemoryAdapter::default())
        .await
        .map_err(casbin_err)?;
    for (ptype, values) in rules.policies() {
        enforcer
            .add_named_policies(ptype, values.to_vec())
            .await
            .map_err(casbin_err)?;
    }
    for (gtype, values) in rules.links() {
        enforcer
            .add_named_grouping_policies(gtype, values.to_vec())
            .await
            .map_err(casbin_err)?;
    }
    enforcer.build_role_links().map_err(casbin_err)?;
    Ok(enforcer)
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PolicyRule, StaticPolicySource};
    use proptest::prelude::*;

    async fn engine(rules: Vec<PolicyRule>) -> PolicyEngine {
        PolicyEngine::load(
            Model::default_rbac().await.unwrap(),
            Arc::new(StaticPolicySource::new(rules)),
        )
        .await
        .unwrap()
    }

    fn sample_rules() -> Vec<PolicyRule> {
        vec![
            PolicyRule::allow("admin", "/api/*", "*"),
            PolicyRule::allow("user", "/api/me", "GET"),
            PolicyRule::allow("user", "/api/users/:id", "GET"),
            PolicyRule::inherit("auditor", "user"),
        ]
    }

    fn chain(links: usize) -> Vec<PolicyRule> {
        (0..links)
            .map(|i| PolicyRule::inherit(&format!("r{i}"), &format!("r{}", i + 1)))
            .collect()
    }

    #[tokio::test]
    async fn admin_wildcard_allows_everything_under_api() {
        let e = engine(sample_rules()).await;
        assert_eq!(e.enforce("admin", "/api/users", "POST"), Ok(true));
        assert_eq!(e.enforce("admin", "/api/policy/reload", "POST"), Ok(true));
        assert_eq!(e.enforce("admin", "/health", "GET"), Ok(false));
    }

    #[tokio::test]
    async fn user_is_limited_to_its_rules() {
        let e = engine(sample_rules()).await;
        assert_eq!(e.enforce("user", "/api/me", "GET"), Ok(true));
        assert_eq!(e.enforce("user", "/api/users/42", "GET"), Ok(true));
        assert_eq!(e.enforce("user", "/api/users", "GET"), Ok(false));
        assert_eq!(e.enforce("user", "/api/me", "DELETE"), Ok(false));
    }

    #[tokio::test]
    async fn inherited_role_gets_parent_rules() {
        let e = engine(sample_rules()).await;
        assert_eq!(e.enforce("auditor", "/api/me", "GET"), Ok(true));
        assert_eq!(e.enforce("auditor", "/api/users", "POST"), Ok(false));
    }

    #[tokio::test]
    async fn unknown_role_and_empty_rule_set_deny() {
        assert_eq!(engine(sample_rules()).await.enforce("guest", "/api/me", "GET"), Ok(false));
        assert_eq!(engine(vec![]).await.enforce("admin", "/api/me", "GET"), Ok(false));
    }

    #[tokio::test]
    async fn deny_rules_override_when_the_model_says_so() {
        let model = Model::parse(
            "[request_definition]\nr = sub, obj, act\n\
             [policy_definition]\np = sub, obj, act, eft\n\
             [policy_effect]\ne = some(where (p.eft == allow)) && !some(where (p.eft == deny))\n\
             [matchers]\nm = r.sub == p.sub && keyMatch(r.obj, p.obj) && r.act == p.act",
        )
        .await
        .unwrap();
        let source = StaticPolicySource::new(vec![
            PolicyRule::new("p", ["ops", "/api/*", "GET", "allow"]),
            PolicyRule::new("p", ["ops", "/api/secrets", "GET", "deny"]),
        ]);
        let e = PolicyEngine::load(model, Arc::new(source)).await.unwrap();
        assert_eq!(e.enforce("ops", "/api/users", "GET"), Ok(true));
        assert_eq!(e.enforce("ops", "/api/secrets", "GET"), Ok(false));
        assert_eq!(e.enforce("ops", "/api/users", "PUT"), Ok(false));
    }

    #[tokio::test]
    async fn deny_override_allows_by_default() {
        let model = Model::parse(
            "[request_definition]\nr = sub, obj, act\n\
             [policy_definition]\np = sub, obj, act, eft\n\
             [policy_effect]\ne = !some(where (p.eft == deny))\n\
             [matchers]\nm = r.sub == p.sub && r.obj == p.obj && r.act == p.act",
        )
        .await
        .unwrap();
        let source = StaticPolicySource::new(vec![PolicyRule::new("p", ["guest", "/admin", "GET", "deny"])]);
        let e = PolicyEngine::load(model, Arc::new(source)).await.unwrap();
        assert_eq!(e.enforce("guest", "/admin", "GET"), Ok(false));
        assert_eq!(e.enforce("guest", "/other", "GET"), Ok(true));
    }

    #[tokio::test]
    async fn bad_regex_in_a_rule_never_allows() {
        let model = Model::parse(
            "[request_definition]\nr = sub, obj, act\n\
             [policy_definition]\np = sub, obj, act\n\
             [policy_effect]\ne = some(where (p.eft == allow))\n\
             [matchers]\nm = r.sub == p.sub && regexMatch(r.obj, p.obj)",
        )
        .await
        .unwrap();
        let source = StaticPolicySource::new(vec![PolicyRule::allow("a", "(broken", "GET")]);
        let e = PolicyEngine::load(model, Arc::new(source)).await.unwrap();
        assert_ne!(e.enforce("a", "/x", "GET"), Ok(true));
        assert_eq!(e.enforce("b", "/x", "GET"), Ok(false));
    }

    #[tokio::test]
    async fn long_chain_does_not_mask_a_direct_grant_in_either_order() {
        let direct = PolicyRule::allow("r0", "/api/me", "GET");
        let wide = PolicyRule::allow("admin", "/api/*", "*");

        let mut direct_first = vec![direct.clone(), wide.clone()];
        direct_first.extend(chain(12));
        let mut wide_first = vec![wide, direct];
        wide_first.extend(chain(12));

        for rules in [direct_first, wide_first] {
            let e = engine(rules).await;
            assert_eq!(e.enforce("r0", "/api/me", "GET"), Ok(true));
            assert_eq!(e.enforce("r0", "/api/users", "GET"), Ok(false));
        }
    }

    #[tokio::test]
    async fn inheritance_stops_quietly_past_ten_links() {
        let mut rules = chain(12);
        rules.push(PolicyRule::allow("r5", "/api/near", "GET"));
        rules.push(PolicyRule::allow("r12", "/api/far", "GET"));
        let e = engine(rules).await;
        assert_eq!(e.enforce("r0", "/api/near", "GET"), Ok(true));
        assert_eq!(e.enforce("r0", "/api/far", "GET"), Ok(false));
        assert_eq!(e.enforce("r11", "/api/far", "GET"), Ok(true));
    }

    #[tokio::test]
    async fn reload_swaps_rules_and_bumps_generation() {
        let source = Arc::new(StaticPolicySource::new(vec![PolicyRule::allow("user", "/api/me", "GET")]));
        let e = PolicyEngine::load(Model::default_rbac().await.unwrap(), source.clone())
            .await
            .unwrap();
        assert_eq!(e.enforce("user", "/api/me", "GET"), Ok(true));
        assert_eq!(e.generation(), 0);

        source.replace(vec![
            PolicyRule::allow("user", "/api/users", "GET"),
            PolicyRule::inherit("intern", "user"),
        ]);
        assert_eq!(e.reload().await.unwrap(), 2);
        assert_eq!(e.generation(), 1);
        assert_eq!(e.rule_count(), 2);
        assert_eq!(e.enforce("user", "/api/me", "GET"), Ok(false));
        assert_eq!(e.enforce("intern", "/api/users", "GET"), Ok(true));
    }

    #[tokio::test]
    async fn failed_reload_keeps_the_previous_rules() {
        let source = Arc::new(StaticPolicySource::new(vec![PolicyRule::allow("user", "/api/me", "GET")]));
        let e = PolicyEngine::load(Model::default_rbac().await.unwrap(), source.clone())
            .await
            .unwrap();

        source.replace(vec![PolicyRule::new("p", ["only-two", "values"])]);
        assert!(e.reload().await.is_err());
        assert_eq!(e.generation(), 0);
        assert_eq!(e.enforce("user", "/api/me", "GET"), Ok(true));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        #[test]
        fn enforce_is_deterministic(
            role in prop::sample::select(vec!["admin", "user", "auditor", "guest", ""]),
            path in "(/[a-z0-9:]{0,6}){0,4}",
            action in prop::sample::select(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"]),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let e = runtime.block_on(engine(sample_rules()));
            let first = e.enforce(role, &path, action);
            for _ in 0..4 {
                prop_assert_eq!(e.enforce(role, &path, action), first.clone());
            }
        }
    }
}
