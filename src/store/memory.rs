//! In-memory reference store. Fixture-grade: enough filter semantics to
//! exercise the generated routes in demos and tests, explicitly not a query
//! engine. Includes are accepted and ignored.

use crate::model::{AssociationDescriptor, AssociationKind, ModelDescriptor, ModelRegistry};
use crate::query::{JsonMap, OrderAtom, ParsedQuery};
use crate::store::{AssociationOps, AttachVerb, ModelStore, Record, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type ScopePredicate = Arc<dyn Fn(&JsonMap) -> bool + Send + Sync>;

struct Inner {
    registry: Arc<ModelRegistry>,
    tables: RwLock<HashMap<String, Vec<JsonMap>>>,
    scopes: RwLock<HashMap<String, HashMap<String, ScopePredicate>>>,
}

#[derive(Clone)]
pub struct MemStore {
    inner: Arc<Inner>,
}

impl MemStore {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        MemStore {
            inner: Arc::new(Inner {
                registry,
                tables: RwLock::new(HashMap::new()),
                scopes: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a named scope predicate for a model.
    pub fn register_scope(
        &self,
        model: &str,
        scope: &str,
        predicate: impl Fn(&JsonMap) -> bool + Send + Sync + 'static,
    ) {
        self.inner
            .scopes
            .write()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .insert(scope.to_string(), Arc::new(predicate));
    }

    /// Seed rows directly, bypassing create-time stamping.
    pub fn seed(&self, model: &str, rows: Vec<JsonMap>) {
        self.inner
            .tables
            .write()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn row_count(&self, model: &str) -> usize {
        self.inner
            .tables
            .read()
            .unwrap()
            .get(model)
            .map_or(0, Vec::len)
    }
}

impl Inner {
    fn select(
        &self,
        model: &ModelDescriptor,
        scope: Option<&str>,
        query: &ParsedQuery,
    ) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().unwrap();
        let rows = tables.get(&model.name).map(Vec::as_slice).unwrap_or(&[]);

        let predicate = match scope {
            None => None,
            Some(name) => Some(
                self.scopes
                    .read()
                    .unwrap()
                    .get(&model.name)
                    .and_then(|scopes| scopes.get(name))
                    .cloned()
                    .ok_or_else(|| {
                        StoreError::Other(format!("scope `{name}` is not registered"))
                    })?,
            ),
        };

        let mut matched = Vec::new();
        for row in rows {
            if let Some(predicate) = &predicate {
                if !predicate(row) {
                    continue;
                }
            }
            if matches_where(row, &query.where_clause)? {
                matched.push(row.clone());
            }
        }

        if let Some(terms) = &query.order {
            apply_order(&mut matched, terms);
        }
        let offset = query.offset.unwrap_or(0) as usize;
        let matched: Vec<JsonMap> = match query.limit {
            Some(limit) => matched.into_iter().skip(offset).take(limit as usize).collect(),
            None => matched.into_iter().skip(offset).collect(),
        };

        Ok(matched
            .into_iter()
            .map(|row| Record::new(&model.name, row))
            .collect())
    }

    fn next_id(&self, model: &ModelDescriptor, rows: &[JsonMap]) -> Value {
        let max = rows
            .iter()
            .filter_map(|row| row.get(&model.primary_key))
            .filter_map(Value::as_i64)
            .max()
            .unwrap_or(0);
        Value::from(max + 1)
    }

    fn insert(
        &self,
        model: &ModelDescriptor,
        payload: &JsonMap,
    ) -> Result<Record, StoreError> {
        let mut tables = self.tables.write().unwrap();
        let rows = tables.entry(model.name.clone()).or_default();

        let mut row = payload.clone();
        match row.get(&model.primary_key) {
            Some(id) => {
                if rows
                    .iter()
                    .any(|existing| existing.get(&model.primary_key) == Some(id))
                {
                    return Err(StoreError::UniqueViolation(format!(
                        "{} {id} already exists",
                        model.names.singular
                    )));
                }
            }
            None => {
                let id = self.next_id(model, rows);
                row.insert(model.primary_key.clone(), id);
            }
        }
        let now = Value::String(Utc::now().to_rfc3339());
        row.insert("createdAt".into(), now.clone());
        row.insert("updatedAt".into(), now);
        rows.push(row.clone());
        Ok(Record::new(&model.name, row))
    }
}

#[async_trait]
impl ModelStore for MemStore {
    async fn find_one(
        &self,
        model: &ModelDescriptor,
        query: &ParsedQuery,
    ) -> Result<Option<Record>, StoreError> {
        Ok(self.inner.select(model, None, query)?.into_iter().next())
    }

    async fn find_all(
        &self,
        model: &ModelDescriptor,
        query: &ParsedQuery,
    ) -> Result<Vec<Record>, StoreError> {
        self.inner.select(model, None, query)
    }

    async fn find_all_scoped(
        &self,
        model: &ModelDescriptor,
        scope: &str,
        query: &ParsedQuery,
    ) -> Result<Vec<Record>, StoreError> {
        self.inner.select(model, Some(scope), query)
    }

    async fn create(
        &self,
        model: &ModelDescriptor,
        payload: &JsonMap,
    ) -> Result<Record, StoreError> {
        self.inner.insert(model, payload)
    }

    async fn update(
        &self,
        model: &ModelDescriptor,
        record: &Record,
        payload: &JsonMap,
    ) -> Result<Record, StoreError> {
        let id = record
            .primary_key(model)
            .cloned()
            .ok_or_else(|| StoreError::Other("record has no primary key".into()))?;
        let mut tables = self.inner.tables.write().unwrap();
        let rows = tables.entry(model.name.clone()).or_default();
        let row = rows
            .iter_mut()
            .find(|row| row.get(&model.primary_key) == Some(&id))
            .ok_or_else(|| {
                StoreError::Other(format!("{} {id} no longer exists", model.names.singular))
            })?;
        for (key, value) in payload {
            row.insert(key.clone(), value.clone());
        }
        row.insert("updatedAt".into(), Value::String(Utc::now().to_rfc3339()));
        Ok(Record::new(&model.name, row.clone()))
    }

    async fn destroy(
        &self,
        model: &ModelDescriptor,
        record: &Record,
    ) -> Result<(), StoreError> {
        let Some(id) = record.primary_key(model) else {
            return Err(StoreError::Other("record has no primary key".into()));
        };
        let mut tables = self.inner.tables.write().unwrap();
        if let Some(rows) = tables.get_mut(&model.name) {
            rows.retain(|row| row.get(&model.primary_key) != Some(id));
        }
        Ok(())
    }

    fn association(
        &self,
        model: &ModelDescriptor,
        association: &AssociationDescriptor,
    ) -> Option<Arc<dyn AssociationOps>> {
        let target = self.inner.registry.get(&association.target)?.clone();
        Some(Arc::new(MemAssociation {
            inner: self.inner.clone(),
            owner_singular: model.names.singular.clone(),
            owner_pk: model.primary_key.clone(),
            kind: association.kind,
            target,
        }))
    }
}

/// Association capability over foreign-key conventions: a one-to-many link
/// lives on the target as `{ownerSingular}Id`; a one-to-one link lives on
/// the owner as `{targetSingular}Id`.
struct MemAssociation {
    inner: Arc<Inner>,
    owner_singular: String,
    owner_pk: String,
    kind: AssociationKind,
    target: Arc<ModelDescriptor>,
}

impl MemAssociation {
    fn owner_fk(&self) -> String {
        format!("{}Id", self.target.names.singular)
    }

    fn target_fk(&self) -> String {
        format!("{}Id", self.owner_singular)
    }
}

#[async_trait]
impl AssociationOps for MemAssociation {
    fn attach_verbs(&self) -> &[AttachVerb] {
        match self.kind {
            AssociationKind::OneToMany => &[AttachVerb::Add],
            AssociationKind::OneToOne => &[AttachVerb::Set],
        }
    }

    async fn attach(
        &self,
        verb: AttachVerb,
        owner: &Record,
        target: &Record,
    ) -> Result<(), StoreError> {
        if !self.attach_verbs().contains(&verb) {
            return Err(StoreError::Other(format!(
                "association does not support {verb:?}"
            )));
        }
        let owner_id = owner
            .values
            .get(&self.owner_pk)
            .cloned()
            .ok_or_else(|| StoreError::Other("owner has no primary key".into()))?;
        let target_id = target
            .primary_key(&self.target)
            .cloned()
            .ok_or_else(|| StoreError::Other("target has no primary key".into()))?;

        let mut tables = self.inner.tables.write().unwrap();
        match self.kind {
            AssociationKind::OneToMany => {
                let rows = tables.entry(self.target.name.clone()).or_default();
                let row = rows
                    .iter_mut()
                    .find(|row| row.get(&self.target.primary_key) == Some(&target_id))
                    .ok_or_else(|| StoreError::Other("target row vanished".into()))?;
                row.insert(self.target_fk(), owner_id);
            }
            AssociationKind::OneToOne => {
                let rows = tables.entry(owner.model.clone()).or_default();
                let row = rows
                    .iter_mut()
                    .find(|row| row.get(&self.owner_pk) == Some(&owner_id))
                    .ok_or_else(|| StoreError::Other("owner row vanished".into()))?;
                row.insert(self.owner_fk(), target_id);
            }
        }
        Ok(())
    }

    async fn fetch(
        &self,
        owner: &Record,
        scope: Option<&str>,
        query: &ParsedQuery,
    ) -> Result<Vec<Record>, StoreError> {
        let mut query = query.clone();
        match self.kind {
            AssociationKind::OneToMany => {
                let owner_id = owner
                    .values
                    .get(&self.owner_pk)
                    .cloned()
                    .ok_or_else(|| StoreError::Other("owner has no primary key".into()))?;
                query
                    .where_clause
                    .insert(self.target_fk(), owner_id);
            }
            AssociationKind::OneToOne => {
                let Some(fk) = owner.values.get(&self.owner_fk()).cloned() else {
                    return Ok(Vec::new());
                };
                query
                    .where_clause
                    .insert(self.target.primary_key.clone(), fk);
            }
        }
        self.inner.select(&self.target, scope, &query)
    }

    async fn create(&self, owner: &Record, payload: &JsonMap) -> Result<Record, StoreError> {
        let owner_id = owner
            .values
            .get(&self.owner_pk)
            .cloned()
            .ok_or_else(|| StoreError::Other("owner has no primary key".into()))?;
        match self.kind {
            AssociationKind::OneToMany => {
                let mut payload = payload.clone();
                payload.insert(self.target_fk(), owner_id);
                self.inner.insert(&self.target, &payload)
            }
            AssociationKind::OneToOne => {
                let created = self.inner.insert(&self.target, payload)?;
                let target_id = created
                    .primary_key(&self.target)
                    .cloned()
                    .ok_or_else(|| StoreError::Other("created row has no primary key".into()))?;
                let mut tables = self.inner.tables.write().unwrap();
                if let Some(rows) = tables.get_mut(&owner.model) {
                    if let Some(row) = rows
                        .iter_mut()
                        .find(|row| row.get(&self.owner_pk) == owner.values.get(&self.owner_pk))
                    {
                        row.insert(self.owner_fk(), target_id);
                    }
                }
                Ok(created)
            }
        }
    }
}

fn matches_where(row: &JsonMap, where_clause: &JsonMap) -> Result<bool, StoreError> {
    for (key, expected) in where_clause {
        if let Some(token) = key.strip_prefix('$') {
            if !apply_logical(row, token, expected)? {
                return Ok(false);
            }
            continue;
        }
        let actual = row.get(key).unwrap_or(&Value::Null);
        if !value_matches(actual, expected)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn apply_logical(row: &JsonMap, token: &str, operand: &Value) -> Result<bool, StoreError> {
    let branches = operand
        .as_array()
        .ok_or_else(|| StoreError::Other(format!("${token} expects an array of conditions")))?;
    let mut results = Vec::with_capacity(branches.len());
    for branch in branches {
        let condition = branch
            .as_object()
            .ok_or_else(|| StoreError::Other(format!("${token} conditions must be objects")))?;
        results.push(matches_where(row, condition)?);
    }
    match token {
        "and" => Ok(results.iter().all(|r| *r)),
        "or" => Ok(results.iter().any(|r| *r)),
        other => Err(StoreError::Other(format!(
            "operator ${other} is not supported by the memory store"
        ))),
    }
}

/// Either a nested operator fragment (`{"$ne": "x"}`) or a literal to
/// compare for loose equality.
fn value_matches(actual: &Value, expected: &Value) -> Result<bool, StoreError> {
    if let Some(object) = expected.as_object() {
        let operator_keys: Vec<&String> =
            object.keys().filter(|k| k.starts_with('$')).collect();
        if !operator_keys.is_empty() {
            for key in operator_keys {
                if !apply_operator(actual, &key[1..], &object[key.as_str()])? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
    }
    Ok(value_eq(actual, expected))
}

fn apply_operator(actual: &Value, op: &str, operand: &Value) -> Result<bool, StoreError> {
    match op {
        "eq" => Ok(value_eq(actual, operand)),
        "ne" => Ok(!value_eq(actual, operand)),
        "gt" | "gte" | "lt" | "lte" => {
            let Some(ordering) = value_cmp(actual, operand) else {
                return Ok(false);
            };
            Ok(match op {
                "gt" => ordering.is_gt(),
                "gte" => ordering.is_ge(),
                "lt" => ordering.is_lt(),
                _ => ordering.is_le(),
            })
        }
        "in" | "notIn" => {
            let candidates = operand
                .as_array()
                .ok_or_else(|| StoreError::Other(format!("${op} expects an array")))?;
            let found = candidates.iter().any(|c| value_eq(actual, c));
            Ok(if op == "in" { found } else { !found })
        }
        "like" | "notLike" | "iLike" | "notILike" => {
            let pattern = operand
                .as_str()
                .ok_or_else(|| StoreError::Other(format!("${op} expects a string pattern")))?;
            let subject = actual.as_str().unwrap_or_default();
            let matched = like_match(subject, pattern, op == "iLike" || op == "notILike")?;
            Ok(if op.starts_with("not") { !matched } else { matched })
        }
        other => Err(StoreError::Other(format!(
            "operator ${other} is not supported by the memory store"
        ))),
    }
}

fn like_match(subject: &str, pattern: &str, case_insensitive: bool) -> Result<bool, StoreError> {
    let escaped: Vec<String> = pattern.split('%').map(|p| regex::escape(p)).collect();
    let mut source = String::new();
    if case_insensitive {
        source.push_str("(?i)");
    }
    source.push('^');
    source.push_str(&escaped.join(".*"));
    source.push('$');
    let re = regex::Regex::new(&source)
        .map_err(|e| StoreError::Other(format!("bad like pattern: {e}")))?;
    Ok(re.is_match(subject))
}

fn numeric(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Loose equality: exact JSON equality, or numeric equality across
/// string/number representations (path-supplied ids arrive as strings).
fn value_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn value_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return x.partial_cmp(&y);
    }
    match (a.as_str(), b.as_str()) {
        (Some(x), Some(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sort by the first order term's leading column name, honoring a trailing
/// ASC/DESC atom. Model references and deeper nesting are beyond the
/// fixture store and are ignored.
fn apply_order(rows: &mut [JsonMap], terms: &[crate::query::OrderTerm]) {
    let Some(term) = terms.first() else {
        return;
    };
    let mut atoms = term.0.iter();
    let Some(OrderAtom::Name(column)) = atoms.next() else {
        return;
    };
    let descending = matches!(
        atoms.next(),
        Some(OrderAtom::Name(direction)) if direction.eq_ignore_ascii_case("desc")
    );
    rows.sort_by(|a, b| {
        let left = a.get(column).unwrap_or(&Value::Null);
        let right = b.get(column).unwrap_or(&Value::Null);
        let ordering = value_cmp(left, right).unwrap_or(std::cmp::Ordering::Equal);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{resolve_registry, ModelConfig};
    use crate::query::{ParsedQuery, RawParams};
    use serde_json::json;

    fn setup() -> (Arc<ModelRegistry>, MemStore, Arc<ModelDescriptor>) {
        let registry = Arc::new(
            resolve_registry(&[ModelConfig {
                name: "Player".into(),
                singular: None,
                plural: None,
                primary_key: None,
                attributes: vec!["id".into(), "name".into(), "active".into()],
                scopes: vec!["returnsOne".into()],
                associations: vec![],
            }])
            .unwrap(),
        );
        let store = MemStore::new(registry.clone());
        store.seed(
            "Player",
            vec![
                json!({"id": 1, "name": "baseball", "active": true})
                    .as_object()
                    .unwrap()
                    .clone(),
                json!({"id": 2, "name": "chess", "active": false})
                    .as_object()
                    .unwrap()
                    .clone(),
            ],
        );
        let model = registry.get("Player").unwrap().clone();
        (registry, store, model)
    }

    fn query(qs: &str, registry: &ModelRegistry) -> ParsedQuery {
        ParsedQuery::parse(&RawParams::parse(qs), Some(registry)).unwrap()
    }

    #[tokio::test]
    async fn equality_filter_matches_loosely() {
        let (registry, store, model) = setup();
        let found = store
            .find_all(&model, &query("id=1", &registry))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].values.get("name"), Some(&json!("baseball")));
    }

    #[tokio::test]
    async fn nested_operator_fragments_apply() {
        let (registry, store, model) = setup();
        // name={"$ne":"chess"}
        let q = query("name=%7B%22%24ne%22%3A%22chess%22%7D", &registry);
        let found = store.find_all(&model, &q).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].values.get("name"), Some(&json!("baseball")));
    }

    #[tokio::test]
    async fn scoped_select_applies_predicate_before_filters() {
        let (registry, store, model) = setup();
        store.register_scope("Player", "returnsOne", |row| {
            row.get("active") == Some(&json!(true))
        });
        let found = store
            .find_all_scoped(&model, "returnsOne", &query("", &registry))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].values.get("id"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn create_assigns_incrementing_ids_and_stamps() {
        let (_registry, store, model) = setup();
        let payload = json!({"name": "curling"}).as_object().unwrap().clone();
        let record = store.create(&model, &payload).await.unwrap();
        assert_eq!(record.values.get("id"), Some(&json!(3)));
        assert!(record.values.contains_key("createdAt"));
        assert!(record.values.contains_key("updatedAt"));
    }

    #[tokio::test]
    async fn create_with_existing_id_is_unique_violation() {
        let (_registry, store, model) = setup();
        let payload = json!({"id": 1, "name": "dup"}).as_object().unwrap().clone();
        let err = store.create(&model, &payload).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn order_limit_offset_apply_in_sequence() {
        let (registry, store, model) = setup();
        let q = query("order=name%20DESC&limit=1", &registry);
        let found = store.find_all(&model, &q).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].values.get("name"), Some(&json!("chess")));
    }
}
