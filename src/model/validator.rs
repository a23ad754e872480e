//! Declaration resolution: referential integrity and permission checks,
//! fail-fast at startup.

use crate::error::ConfigError;
use crate::model::resolved::{
    AssociationDescriptor, AssociationKind, ModelDescriptor, ModelRegistry, NameForms,
};
use crate::model::types::{
    AssociationConfig, AssociationKindConfig, MethodAccess, ModelConfig, Permissions,
};
use crate::service::Method;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolve raw declarations into an immutable registry. Errors on duplicate
/// model names and associations whose target is not declared.
pub fn resolve_registry(configs: &[ModelConfig]) -> Result<ModelRegistry, ConfigError> {
    let mut forms_by_name: HashMap<&str, NameForms> = HashMap::new();
    for config in configs {
        let forms = name_forms(config);
        if forms_by_name.insert(config.name.as_str(), forms).is_some() {
            return Err(ConfigError::DuplicateModel(config.name.clone()));
        }
    }

    let mut models = HashMap::new();
    for config in configs {
        let associations = config
            .associations
            .iter()
            .map(|assoc| resolve_association(assoc, &forms_by_name))
            .collect::<Result<Vec<_>, _>>()?;

        let descriptor = ModelDescriptor {
            name: config.name.clone(),
            names: forms_by_name[config.name.as_str()].clone(),
            primary_key: config.primary_key.clone().unwrap_or_else(|| "id".into()),
            attributes: config.attributes.clone(),
            scopes: config.scopes.clone(),
            associations,
        };
        models.insert(config.name.clone(), Arc::new(descriptor));
    }

    Ok(ModelRegistry::from_map(models))
}

fn name_forms(config: &ModelConfig) -> NameForms {
    let singular = config
        .singular
        .clone()
        .unwrap_or_else(|| config.name.to_lowercase());
    let plural = config.plural.clone().unwrap_or_else(|| format!("{singular}s"));
    NameForms::new(&singular, &plural)
}

fn resolve_association(
    assoc: &AssociationConfig,
    forms_by_name: &HashMap<&str, NameForms>,
) -> Result<AssociationDescriptor, ConfigError> {
    let target_names = forms_by_name
        .get(assoc.target.as_str())
        .cloned()
        .ok_or_else(|| ConfigError::MissingReference {
            kind: "model",
            id: assoc.target.clone(),
        })?;
    let kind = match assoc.kind {
        AssociationKindConfig::OneToOne => AssociationKind::OneToOne,
        AssociationKindConfig::OneToMany => AssociationKind::OneToMany,
    };
    let name = assoc.name.clone().unwrap_or_else(|| match kind {
        AssociationKind::OneToOne => target_names.singular.clone(),
        AssociationKind::OneToMany => target_names.plural.clone(),
    });
    Ok(AssociationDescriptor {
        name,
        kind,
        target: assoc.target.clone(),
        target_names,
    })
}

impl Permissions {
    /// Check every referenced name against the registry. Run once at route
    /// registration; a typo'd model name is a startup error, not a 404.
    pub fn validate(&self, registry: &ModelRegistry) -> Result<(), ConfigError> {
        let names: Vec<&String> = match self {
            Permissions::AllModels => return Ok(()),
            Permissions::ModelList(names) => names.iter().collect(),
            Permissions::PerModel(map) => map.keys().collect(),
        };
        for name in names {
            if registry.get(name).is_none() {
                return Err(ConfigError::Permissions(format!(
                    "unknown model '{name}' in permissions"
                )));
            }
        }
        Ok(())
    }

    /// The methods granted to `model`, or `None` when the model gets no
    /// routes at all. Exhaustive over the permission shapes.
    pub fn methods_for(&self, model: &str) -> Option<Vec<Method>> {
        match self {
            Permissions::AllModels => Some(Method::ALL.to_vec()),
            Permissions::ModelList(names) => names
                .iter()
                .any(|n| n == model)
                .then(|| Method::ALL.to_vec()),
            Permissions::PerModel(map) => match map.get(model) {
                Some(MethodAccess::All(true)) => Some(Method::ALL.to_vec()),
                Some(MethodAccess::All(false)) | None => None,
                Some(MethodAccess::Methods(methods)) => Some(methods.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_config() -> ModelConfig {
        ModelConfig {
            name: "Player".into(),
            singular: None,
            plural: None,
            primary_key: None,
            attributes: vec!["id".into(), "name".into(), "teamId".into()],
            scopes: vec!["returnsOne".into()],
            associations: vec![AssociationConfig {
                name: None,
                target: "Team".into(),
                kind: AssociationKindConfig::OneToOne,
            }],
        }
    }

    fn team_config() -> ModelConfig {
        ModelConfig {
            name: "Team".into(),
            singular: None,
            plural: None,
            primary_key: None,
            attributes: vec!["id".into(), "name".into()],
            scopes: vec![],
            associations: vec![AssociationConfig {
                name: None,
                target: "Player".into(),
                kind: AssociationKindConfig::OneToMany,
            }],
        }
    }

    #[test]
    fn resolves_defaults_and_associations() {
        let registry = resolve_registry(&[player_config(), team_config()]).unwrap();
        let player = registry.get("Player").unwrap();
        assert_eq!(player.names.plural, "players");
        assert_eq!(player.primary_key, "id");
        assert_eq!(player.associations[0].name, "team");
        assert_eq!(player.associations[0].target, "Team");

        let team = registry.get("Team").unwrap();
        assert_eq!(team.associations[0].name, "players");
        assert_eq!(team.associations[0].kind, AssociationKind::OneToMany);
    }

    #[test]
    fn unknown_association_target_fails_fast() {
        let mut config = player_config();
        config.associations[0].target = "Ghost".into();
        let err = resolve_registry(&[config]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { .. }));
    }

    #[test]
    fn duplicate_model_name_fails_fast() {
        let err = resolve_registry(&[team_config(), team_config()]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateModel(_)));
    }

    #[test]
    fn permissions_validate_names() {
        let registry = resolve_registry(&[player_config(), team_config()]).unwrap();
        let perms = Permissions::ModelList(vec!["Player".into()]);
        assert!(perms.validate(&registry).is_ok());

        let perms = Permissions::ModelList(vec!["Ghost".into()]);
        assert!(matches!(
            perms.validate(&registry).unwrap_err(),
            ConfigError::Permissions(_)
        ));
    }

    #[test]
    fn methods_for_is_exhaustive_over_shapes() {
        assert_eq!(
            Permissions::AllModels.methods_for("Player").unwrap().len(),
            Method::ALL.len()
        );

        let list = Permissions::ModelList(vec!["Player".into()]);
        assert!(list.methods_for("Player").is_some());
        assert!(list.methods_for("Team").is_none());

        let mut map = HashMap::new();
        map.insert(
            "Player".to_string(),
            MethodAccess::Methods(vec![Method::List, Method::Get]),
        );
        map.insert("Team".to_string(), MethodAccess::All(true));
        let per_model = Permissions::PerModel(map);
        assert_eq!(
            per_model.methods_for("Player").unwrap(),
            vec![Method::List, Method::Get]
        );
        assert_eq!(
            per_model.methods_for("Team").unwrap().len(),
            Method::ALL.len()
        );
        assert!(per_model.methods_for("City").is_none());
    }
}
