//! Route validation specs: per-method rule sets composed at registration
//! time from the method's category memberships and caller overrides.

use crate::error::ConfigError;
use crate::model::{ModelDescriptor, ModelRegistry, Permissions};
use crate::service::validation::ValueRule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The CRUD methods a model can expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    List,
    Get,
    Scope,
    Create,
    Update,
    Destroy,
    DestroyAll,
    DestroyScope,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::List,
        Method::Get,
        Method::Scope,
        Method::Create,
        Method::Update,
        Method::Destroy,
        Method::DestroyAll,
        Method::DestroyScope,
    ];

    /// Accepts attribute and operator filters in the query string.
    pub fn has_where(self) -> bool {
        matches!(
            self,
            Method::List
                | Method::Get
                | Method::Scope
                | Method::Destroy
                | Method::DestroyScope
                | Method::DestroyAll
        )
    }

    /// Accepts an `include` query parameter.
    pub fn has_include(self) -> bool {
        matches!(
            self,
            Method::List | Method::Get | Method::Scope | Method::DestroyScope
        )
    }

    /// Accepts an entity payload body.
    pub fn has_payload(self) -> bool {
        matches!(self, Method::Create | Method::Update)
    }

    /// Takes a `{scope}` path parameter.
    pub fn has_scope_param(self) -> bool {
        matches!(self, Method::Scope | Method::DestroyScope)
    }

    /// Takes an `{id}` path parameter.
    pub fn has_id_param(self) -> bool {
        matches!(self, Method::Get | Method::Update)
    }

    /// Accepts `limit`/`offset`/`order` query parameters.
    pub fn has_pagination(self) -> bool {
        matches!(self, Method::List | Method::Scope)
    }
}

/// The recognized filter-operator tokens, accepted as query keys on every
/// where-capable method.
pub const OPERATOR_TOKENS: [&str; 21] = [
    "$and",
    "$or",
    "$gt",
    "$gte",
    "$lt",
    "$lte",
    "$ne",
    "$eq",
    "$not",
    "$between",
    "$notBetween",
    "$in",
    "$notIn",
    "$like",
    "$notLike",
    "$iLike",
    "$notILike",
    "$overlap",
    "$contains",
    "$contained",
    "$col",
];

/// One location's rule set: declared keys and the rule each value must
/// satisfy. Undeclared keys are rejected at request time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchemaRules {
    pub keys: HashMap<String, ValueRule>,
}

impl SchemaRules {
    pub fn with(mut self, key: &str, rule: ValueRule) -> Self {
        self.keys.insert(key.to_string(), rule);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Additive merge: contributed keys join the set, but a key the caller
    /// already defined keeps the caller's rule.
    fn merge_contributed(&mut self, contributed: impl IntoIterator<Item = (String, ValueRule)>) {
        for (key, rule) in contributed {
            self.keys.entry(key).or_insert(rule);
        }
    }
}

/// The composed validation spec for one (method, model) route: query,
/// payload, and path-params rule sets. Built once at registration time and
/// reused for every request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteSpec {
    pub query: SchemaRules,
    pub payload: SchemaRules,
    pub params: SchemaRules,
}

/// Compose the spec for one method: start from a deep copy of the caller's
/// base (never mutating it) and merge each applicable category additively.
pub fn compose_for_method(method: Method, model: &ModelDescriptor, base: &RouteSpec) -> RouteSpec {
    let mut spec = base.clone();

    if method.has_where() {
        spec.query.merge_contributed(
            model
                .attributes
                .iter()
                .map(|attr| (attr.clone(), ValueRule::Any)),
        );
        spec.query.merge_contributed(
            OPERATOR_TOKENS
                .iter()
                .map(|token| (token.to_string(), ValueRule::Any)),
        );
    }

    if method.has_include() {
        spec.query.merge_contributed([(
            "include".to_string(),
            ValueRule::IncludeNames(model.include_names()),
        )]);
    }

    if method.has_payload() {
        spec.payload.merge_contributed(
            model
                .attributes
                .iter()
                .map(|attr| (attr.clone(), ValueRule::Any)),
        );
    }

    if method.has_scope_param() {
        spec.params
            .merge_contributed([("scope".to_string(), ValueRule::OneOf(model.scopes.clone()))]);
    }

    if method.has_id_param() {
        spec.params
            .merge_contributed([("id".to_string(), ValueRule::Any)]);
    }

    if method.has_pagination() {
        spec.query.merge_contributed([
            ("limit".to_string(), ValueRule::NonNegativeInt),
            ("offset".to_string(), ValueRule::NonNegativeInt),
            ("order".to_string(), ValueRule::StringOrArray),
        ]);
    }

    spec
}

/// All composed specs, keyed by (model, method). The only place permissions
/// are consulted; built once when routes are registered.
#[derive(Debug, Default)]
pub struct SpecIndex {
    specs: HashMap<(String, Method), Arc<RouteSpec>>,
}

impl SpecIndex {
    /// Compose specs for every permitted (model, method) pair. Fails fast on
    /// malformed permissions.
    pub fn build(
        registry: &ModelRegistry,
        permissions: &Permissions,
        base: &RouteSpec,
        model_overrides: &HashMap<String, RouteSpec>,
    ) -> Result<Self, ConfigError> {
        permissions.validate(registry)?;
        let mut specs = HashMap::new();
        for model in registry.iter() {
            let Some(methods) = permissions.methods_for(&model.name) else {
                continue;
            };
            let base = model_overrides.get(&model.name).unwrap_or(base);
            for method in methods {
                let spec = compose_for_method(method, model, base);
                specs.insert((model.name.clone(), method), Arc::new(spec));
            }
            tracing::debug!(model = %model.name, "composed route specs");
        }
        Ok(SpecIndex { specs })
    }

    pub fn get(&self, model: &str, method: Method) -> Option<&Arc<RouteSpec>> {
        self.specs.get(&(model.to_string(), method))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{resolve_registry, AssociationConfig, AssociationKindConfig, ModelConfig};

    fn registry() -> ModelRegistry {
        resolve_registry(&[
            ModelConfig {
                name: "Player".into(),
                singular: None,
                plural: None,
                primary_key: None,
                attributes: vec!["id".into(), "name".into(), "teamId".into()],
                scopes: vec!["returnsOne".into(), "returnsNone".into()],
                associations: vec![AssociationConfig {
                    name: None,
                    target: "Team".into(),
                    kind: AssociationKindConfig::OneToOne,
                }],
            },
            ModelConfig {
                name: "Team".into(),
                singular: None,
                plural: None,
                primary_key: None,
                attributes: vec!["id".into(), "name".into()],
                scopes: vec![],
                associations: vec![],
            },
        ])
        .unwrap()
    }

    fn player(registry: &ModelRegistry) -> Arc<ModelDescriptor> {
        registry.get("Player").unwrap().clone()
    }

    #[test]
    fn where_capable_methods_accept_attributes_and_all_operators() {
        let registry = registry();
        let spec = compose_for_method(Method::List, &player(&registry), &RouteSpec::default());
        assert!(spec.query.keys.contains_key("name"));
        assert!(spec.query.keys.contains_key("teamId"));
        for token in OPERATOR_TOKENS {
            assert!(spec.query.keys.contains_key(token), "missing {token}");
        }
    }

    #[test]
    fn include_rule_carries_association_name_forms() {
        let registry = registry();
        let spec = compose_for_method(Method::Get, &player(&registry), &RouteSpec::default());
        let Some(ValueRule::IncludeNames(names)) = spec.query.keys.get("include") else {
            panic!("expected include rule");
        };
        for form in ["team", "teams", "Team", "Teams"] {
            assert!(names.iter().any(|n| n == form), "missing {form}");
        }
    }

    #[test]
    fn pagination_only_on_list_and_scope() {
        let registry = registry();
        let model = player(&registry);
        for method in [Method::List, Method::Scope] {
            let spec = compose_for_method(method, &model, &RouteSpec::default());
            assert_eq!(spec.query.keys.get("limit"), Some(&ValueRule::NonNegativeInt));
            assert_eq!(spec.query.keys.get("order"), Some(&ValueRule::StringOrArray));
        }
        for method in [Method::Get, Method::Destroy, Method::DestroyAll] {
            let spec = compose_for_method(method, &model, &RouteSpec::default());
            assert!(!spec.query.keys.contains_key("limit"));
            assert!(!spec.query.keys.contains_key("order"));
        }
    }

    #[test]
    fn payload_methods_accept_each_attribute() {
        let registry = registry();
        let model = player(&registry);
        for method in [Method::Create, Method::Update] {
            let spec = compose_for_method(method, &model, &RouteSpec::default());
            assert!(spec.payload.keys.contains_key("name"));
            // payload methods take no query filters at all
            assert!(spec.query.is_empty());
        }
    }

    #[test]
    fn scope_param_rule_lists_declared_scopes() {
        let registry = registry();
        let spec = compose_for_method(Method::Scope, &player(&registry), &RouteSpec::default());
        let Some(ValueRule::OneOf(scopes)) = spec.params.keys.get("scope") else {
            panic!("expected scope rule");
        };
        assert_eq!(scopes, &vec!["returnsOne".to_string(), "returnsNone".to_string()]);
    }

    #[test]
    fn id_param_rule_accepts_any() {
        let registry = registry();
        for method in [Method::Get, Method::Update] {
            let spec = compose_for_method(method, &player(&registry), &RouteSpec::default());
            assert_eq!(spec.params.keys.get("id"), Some(&ValueRule::Any));
        }
    }

    #[test]
    fn composition_never_mutates_the_base() {
        let registry = registry();
        let model = player(&registry);
        let base = RouteSpec {
            query: SchemaRules::default().with("custom", ValueRule::NonNegativeInt),
            payload: SchemaRules::default(),
            params: SchemaRules::default(),
        };
        let snapshot = base.clone();
        for _ in 0..3 {
            for method in Method::ALL {
                let _ = compose_for_method(method, &model, &base);
            }
        }
        assert_eq!(base, snapshot);
    }

    #[test]
    fn caller_rule_wins_on_key_collision_and_keys_union() {
        let registry = registry();
        let base = RouteSpec {
            query: SchemaRules::default()
                .with("name", ValueRule::NonNegativeInt)
                .with("custom", ValueRule::Any),
            payload: SchemaRules::default(),
            params: SchemaRules::default(),
        };
        let spec = compose_for_method(Method::List, &player(&registry), &base);
        // collision: the caller's rule for `name` survives
        assert_eq!(spec.query.keys.get("name"), Some(&ValueRule::NonNegativeInt));
        // union: caller-only and category-only keys coexist
        assert!(spec.query.keys.contains_key("custom"));
        assert!(spec.query.keys.contains_key("teamId"));
    }

    #[test]
    fn spec_index_honors_permissions() {
        let registry = registry();
        let perms = Permissions::ModelList(vec!["Player".into()]);
        let index =
            SpecIndex::build(&registry, &perms, &RouteSpec::default(), &HashMap::new()).unwrap();
        assert!(index.get("Player", Method::List).is_some());
        assert!(index.get("Team", Method::List).is_none());
        assert_eq!(index.len(), Method::ALL.len());
    }

    #[test]
    fn spec_index_rejects_unknown_permission_names() {
        let registry = registry();
        let perms = Permissions::ModelList(vec!["Ghost".into()]);
        let err = SpecIndex::build(&registry, &perms, &RouteSpec::default(), &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Permissions(_)));
    }
}
