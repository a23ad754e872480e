//! Raw model declarations as supplied by the consumer (JSON or built in code).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssociationKindConfig {
    OneToOne,
    OneToMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationConfig {
    /// Association name; defaults to the target's singular (one-to-one) or
    /// plural (one-to-many) form.
    #[serde(default)]
    pub name: Option<String>,
    /// Canonical name of the target model.
    pub target: String,
    pub kind: AssociationKindConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Canonical registration name, e.g. "Player".
    pub name: String,
    #[serde(default)]
    pub singular: Option<String>,
    #[serde(default)]
    pub plural: Option<String>,
    /// Primary-key attribute; defaults to "id".
    #[serde(default)]
    pub primary_key: Option<String>,
    pub attributes: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub associations: Vec<AssociationConfig>,
}

/// Per-model method allow-list, the per-model leg of [`Permissions`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodAccess {
    /// `true` grants every method; `false` grants none.
    All(bool),
    /// Explicit method names, e.g. `["list", "get"]`.
    Methods(Vec<crate::service::Method>),
}

/// Route-registration allow-list, resolved once at startup. Any shape
/// outside these variants is a startup error, surfaced by serde at load
/// time or by the registry validator.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Permissions {
    /// Every registered model gets every method (also the meaning of an
    /// absent permissions section, serialized as `null`).
    #[default]
    AllModels,
    /// `["cat", "dog"]`: listed models get every method.
    ModelList(Vec<String>),
    /// `{"cat": ["list", "get"], "dog": true}`.
    PerModel(HashMap<String, MethodAccess>),
}
