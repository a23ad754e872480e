//! Request-time enforcement of composed route specs. Rejects at the
//! boundary, before any handler logic or storage call runs.

use crate::error::AppError;
use crate::query::{JsonMap, QueryValue, RawParams};
use crate::service::spec::SchemaRules;
use regex::Regex;
use serde_json::Value;

/// The rule a declared key's value must satisfy.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueRule {
    Any,
    NonNegativeInt,
    /// A plain string or an array (the `order` parameter shape).
    StringOrArray,
    /// A single name from the set (path params such as `scope`).
    OneOf(Vec<String>),
    /// A single association name or an array of association names.
    IncludeNames(Vec<String>),
    /// Caller-supplied: value must match the regex.
    Pattern(String),
    /// Caller-supplied: value must be a well-formed instance of the format.
    Format(ValueFormat),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueFormat {
    Email,
    Uuid,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Every query key must be declared and its value must satisfy the
    /// declared rule. Unknown keys reject.
    pub fn validate_query(params: &RawParams, rules: &SchemaRules) -> Result<(), AppError> {
        for (key, value) in params.iter() {
            let rule = rules
                .keys
                .get(key)
                .ok_or_else(|| AppError::Validation(format!("`{key}` is not allowed")))?;
            check_query_value(key, value, rule)?;
        }
        Ok(())
    }

    /// Payload keys must be a subset of the declared keys; each present
    /// value must satisfy its rule.
    pub fn validate_payload(body: &JsonMap, rules: &SchemaRules) -> Result<(), AppError> {
        for (key, value) in body {
            let rule = rules
                .keys
                .get(key)
                .ok_or_else(|| AppError::Validation(format!("`{key}` is not allowed")))?;
            check_json_value(key, value, rule)?;
        }
        Ok(())
    }

    /// Check one path parameter against its declared rule, if any.
    pub fn validate_param(name: &str, value: &str, rules: &SchemaRules) -> Result<(), AppError> {
        match rules.keys.get(name) {
            Some(rule) => check_scalar(name, value, rule),
            None => Ok(()),
        }
    }
}

fn check_query_value(key: &str, value: &QueryValue, rule: &ValueRule) -> Result<(), AppError> {
    match rule {
        ValueRule::Any => Ok(()),
        ValueRule::StringOrArray => match value {
            QueryValue::Scalar(_) | QueryValue::List(_) => Ok(()),
            QueryValue::Map(_) => Err(AppError::Validation(format!(
                "`{key}` must be a string or an array"
            ))),
        },
        ValueRule::IncludeNames(names) => match value {
            QueryValue::Scalar(s) => check_include_name(key, s, names),
            QueryValue::List(items) => {
                for item in items {
                    let Some(s) = item.as_scalar() else {
                        return Err(AppError::Validation(format!(
                            "`{key}` entries must be association names"
                        )));
                    };
                    check_include_name(key, s, names)?;
                }
                Ok(())
            }
            QueryValue::Map(_) => Err(AppError::Validation(format!(
                "`{key}` must be an association name or an array of association names"
            ))),
        },
        _ => match value.as_scalar() {
            Some(s) => check_scalar(key, s, rule),
            None => Err(AppError::Validation(format!("`{key}` must be a scalar"))),
        },
    }
}

fn check_include_name(key: &str, name: &str, names: &[String]) -> Result<(), AppError> {
    if names.iter().any(|n| n == name) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "`{name}` is not a known association for `{key}`"
        )))
    }
}

fn check_scalar(key: &str, value: &str, rule: &ValueRule) -> Result<(), AppError> {
    match rule {
        ValueRule::Any | ValueRule::StringOrArray => Ok(()),
        ValueRule::NonNegativeInt => value
            .parse::<u64>()
            .map(|_| ())
            .map_err(|_| AppError::Validation(format!("`{key}` must be a non-negative integer"))),
        ValueRule::OneOf(allowed) => {
            if allowed.iter().any(|a| a == value) {
                Ok(())
            } else {
                Err(AppError::Validation(format!(
                    "`{key}` must be one of: {}",
                    allowed.join(", ")
                )))
            }
        }
        ValueRule::IncludeNames(names) => check_include_name(key, value, names),
        ValueRule::Pattern(pattern) => {
            let re = Regex::new(pattern)
                .map_err(|_| AppError::Validation(format!("invalid pattern for `{key}`")))?;
            if re.is_match(value) {
                Ok(())
            } else {
                Err(AppError::Validation(format!(
                    "`{key}` does not match required pattern"
                )))
            }
        }
        ValueRule::Format(format) => check_format(key, value, *format),
    }
}

fn check_json_value(key: &str, value: &Value, rule: &ValueRule) -> Result<(), AppError> {
    match rule {
        ValueRule::Any => Ok(()),
        ValueRule::NonNegativeInt => {
            if value.as_u64().is_some() {
                Ok(())
            } else {
                Err(AppError::Validation(format!(
                    "`{key}` must be a non-negative integer"
                )))
            }
        }
        ValueRule::StringOrArray => {
            if value.is_string() || value.is_array() {
                Ok(())
            } else {
                Err(AppError::Validation(format!(
                    "`{key}` must be a string or an array"
                )))
            }
        }
        _ => match value.as_str() {
            Some(s) => check_scalar(key, s, rule),
            None => Err(AppError::Validation(format!("`{key}` must be a string"))),
        },
    }
}

fn check_format(key: &str, value: &str, format: ValueFormat) -> Result<(), AppError> {
    match format {
        ValueFormat::Email => {
            if value.contains('@') && value.len() >= 3 {
                Ok(())
            } else {
                Err(AppError::Validation(format!("`{key}` must be a valid email")))
            }
        }
        ValueFormat::Uuid => uuid::Uuid::parse_str(value)
            .map(|_| ())
            .map_err(|_| AppError::Validation(format!("`{key}` must be a valid UUID"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{resolve_registry, AssociationConfig, AssociationKindConfig, ModelConfig};
    use crate::service::spec::{compose_for_method, Method, RouteSpec, OPERATOR_TOKENS};
    use serde_json::json;

    fn player_spec(method: Method) -> RouteSpec {
        let registry = resolve_registry(&[
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
        .unwrap();
        let model = registry.get("Player").unwrap().clone();
        compose_for_method(method, &model, &RouteSpec::default())
    }

    #[test]
    fn every_operator_token_validates_as_a_query_key() {
        let spec = player_spec(Method::List);
        for token in OPERATOR_TOKENS {
            let params = RawParams::parse(&format!("{token}=anything"));
            RequestValidator::validate_query(&params, &spec.query)
                .unwrap_or_else(|e| panic!("{token} rejected: {e}"));
        }
    }

    #[test]
    fn unrecognized_query_key_is_rejected() {
        let spec = player_spec(Method::List);
        let params = RawParams::parse("nickname=zeke");
        let err = RequestValidator::validate_query(&params, &spec.query).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn pagination_rules_enforce_integers() {
        let spec = player_spec(Method::List);
        let ok = RawParams::parse("limit=3&offset=0");
        assert!(RequestValidator::validate_query(&ok, &spec.query).is_ok());
        let bad = RawParams::parse("limit=three");
        assert!(RequestValidator::validate_query(&bad, &spec.query).is_err());
    }

    #[test]
    fn get_rejects_pagination_keys() {
        let spec = player_spec(Method::Get);
        let params = RawParams::parse("limit=3");
        assert!(RequestValidator::validate_query(&params, &spec.query).is_err());
    }

    #[test]
    fn include_accepts_single_name_or_array_from_set() {
        let spec = player_spec(Method::List);
        for qs in ["include=team", "include=Teams", "include=team&include=teams"] {
            let params = RawParams::parse(qs);
            assert!(
                RequestValidator::validate_query(&params, &spec.query).is_ok(),
                "{qs} rejected"
            );
        }
        let params = RawParams::parse("include=cities");
        assert!(RequestValidator::validate_query(&params, &spec.query).is_err());
    }

    #[test]
    fn payload_rejects_undeclared_keys() {
        let spec = player_spec(Method::Create);
        let mut body = JsonMap::new();
        body.insert("name".into(), json!("bennie"));
        assert!(RequestValidator::validate_payload(&body, &spec.payload).is_ok());

        body.insert("nickname".into(), json!("z"));
        assert!(RequestValidator::validate_payload(&body, &spec.payload).is_err());
    }

    #[test]
    fn scope_param_checks_declared_set() {
        let spec = player_spec(Method::Scope);
        assert!(RequestValidator::validate_param("scope", "returnsOne", &spec.params).is_ok());
        assert!(RequestValidator::validate_param("scope", "invalid", &spec.params).is_err());
        // id is unconstrained on methods that declare it
        let spec = player_spec(Method::Get);
        assert!(RequestValidator::validate_param("id", "anything", &spec.params).is_ok());
    }

    #[test]
    fn caller_pattern_and_format_rules_check_scalars() {
        let rules = SchemaRules::default()
            .with("code", ValueRule::Pattern("^[A-Z]{3}$".into()))
            .with("contact", ValueRule::Format(ValueFormat::Email))
            .with("token", ValueRule::Format(ValueFormat::Uuid));

        let ok = RawParams::parse(
            "code=ABC&contact=a%40b.se&token=0bdf95bc-8d42-4f36-acb5-02e7de1b0a53",
        );
        assert!(RequestValidator::validate_query(&ok, &rules).is_ok());

        let bad = RawParams::parse("code=abcd");
        assert!(RequestValidator::validate_query(&bad, &rules).is_err());
        let bad = RawParams::parse("contact=nope");
        assert!(RequestValidator::validate_query(&bad, &rules).is_err());
        let bad = RawParams::parse("token=not-a-uuid");
        assert!(RequestValidator::validate_query(&bad, &rules).is_err());
    }
}
