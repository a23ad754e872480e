//! Resolved model descriptors: declarations validated and flattened for
//! runtime use. Immutable after registration.

use std::collections::HashMap;
use std::sync::Arc;

/// Singular/plural naming forms of a model, plus capitalized variants.
/// Include-name matching and route-segment resolution use these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameForms {
    pub singular: String,
    pub plural: String,
    pub singular_cap: String,
    pub plural_cap: String,
}

impl NameForms {
    pub fn new(singular: &str, plural: &str) -> Self {
        NameForms {
            singular: singular.to_string(),
            plural: plural.to_string(),
            singular_cap: capitalize(singular),
            plural_cap: capitalize(plural),
        }
    }

    pub fn all(&self) -> [&str; 4] {
        [
            &self.singular,
            &self.plural,
            &self.singular_cap,
            &self.plural_cap,
        ]
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssociationKind {
    OneToOne,
    OneToMany,
}

/// A declared relationship from one model to another. Targets are carried
/// by name plus copied name forms, not by reference, so descriptors stay
/// acyclic; resolve the target through the registry when needed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssociationDescriptor {
    pub name: String,
    pub kind: AssociationKind,
    pub target: String,
    pub target_names: NameForms,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelDescriptor {
    /// Canonical registration name, e.g. "Player".
    pub name: String,
    pub names: NameForms,
    pub primary_key: String,
    pub attributes: Vec<String>,
    pub scopes: Vec<String>,
    pub associations: Vec<AssociationDescriptor>,
}

/// Which naming form a route segment matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentForm {
    Singular,
    Plural,
}

impl ModelDescriptor {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }

    /// Resolve a path segment against this model's associations by the
    /// target's singular or plural form, or by the association name itself.
    pub fn association_for(&self, segment: &str) -> Option<(&AssociationDescriptor, SegmentForm)> {
        for assoc in &self.associations {
            if assoc.target_names.singular == segment {
                return Some((assoc, SegmentForm::Singular));
            }
            if assoc.target_names.plural == segment {
                return Some((assoc, SegmentForm::Plural));
            }
            if assoc.name == segment {
                let form = match assoc.kind {
                    AssociationKind::OneToOne => SegmentForm::Singular,
                    AssociationKind::OneToMany => SegmentForm::Plural,
                };
                return Some((assoc, form));
            }
        }
        None
    }

    /// Every name an `include` entry may use for this model's associations:
    /// the declared association names plus all four name forms of each
    /// target model.
    pub fn include_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for assoc in &self.associations {
            names.push(assoc.name.clone());
            for form in assoc.target_names.all() {
                names.push(form.to_string());
            }
        }
        names.dedup();
        names
    }
}

/// The registered set of model descriptors, keyed by canonical name.
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<ModelDescriptor>>,
}

impl ModelRegistry {
    pub(crate) fn from_map(models: HashMap<String, Arc<ModelDescriptor>>) -> Self {
        ModelRegistry { models }
    }

    /// Lookup by canonical registration name.
    pub fn get(&self, name: &str) -> Option<&Arc<ModelDescriptor>> {
        self.models.get(name)
    }

    /// Lookup by singular or plural form (case-sensitive exact match),
    /// falling back to the canonical name. Mirrors include-entry
    /// resolution: `"players"`, `"player"`, and `"Player"` all resolve.
    pub fn resolve(&self, name: &str) -> Option<&Arc<ModelDescriptor>> {
        self.models
            .values()
            .find(|m| m.names.singular == name || m.names.plural == name)
            .or_else(|| self.models.get(name))
    }

    /// Resolve a route segment to (model, matched form). Only singular and
    /// plural forms participate; canonical names are not route segments.
    pub fn resolve_segment(&self, segment: &str) -> Option<(&Arc<ModelDescriptor>, SegmentForm)> {
        for model in self.models.values() {
            if model.names.singular == segment {
                return Some((model, SegmentForm::Singular));
            }
            if model.names.plural == segment {
                return Some((model, SegmentForm::Plural));
            }
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModelDescriptor>> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
