//! Bucket access-policy documents.
//!
//! Policy JSON is permissive: `Principal` may be a bare string or a map of
//! principal types, and `Action` and condition values may be a string or an
//! array. These are decoded in two explicit phases (scalar shape first, then
//! the collection shape) into one normalized in-memory form.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Where in a document a decode error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Document,
    Statement(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Document => f.write_str("policy document"),
            Location::Statement(i) => write!(f, "statement {i}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("policy is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("policy document must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("{location}: missing required field `{field}`")]
    MissingField { location: Location, field: &'static str },
    #[error("{location}: field `{field}` expected {expected}, found {found}")]
    InvalidField {
        location: Location,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("statement {index}: {source}")]
    Statement {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl PolicyError {
    /// Name of the offending field, if the error is tied to one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            PolicyError::MissingField { field, .. } | PolicyError::InvalidField { field, .. } => Some(*field),
            _ => None,
        }
    }
}

/// A value inside a `Principal` or `Condition` map that was skipped instead
/// of failing the decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub statement: usize,
    /// `Principal`, `NotPrincipal` or `Condition`.
    pub field: &'static str,
    /// Principal type, or `operator/key` for conditions.
    pub key: String,
    pub found: &'static str,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "statement {}: skipped {} under {} `{}`",
            self.statement, self.found, self.field, self.key
        )
    }
}

/// `operator -> (condition key -> values)`. A scalar value is stored as a
/// one-element list.
pub type Condition = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Statement")]
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_principal: Option<Principal>,
    #[serde(rename = "Action", skip_serializing_if = "Actions::is_empty")]
    pub actions: Actions,
    #[serde(rename = "NotAction", skip_serializing_if = "Actions::is_empty")]
    pub not_actions: Actions,
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

/// Who a statement applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A bare string, normally `"*"`.
    Wildcard(String),
    /// Principal type (`AWS`, `Service`, `Federated`, ...) to its identities.
    /// Every entry holds at least one value.
    Typed(BTreeMap<String, Vec<String>>),
}

impl Principal {
    fn decode(
        value: &Json,
        field: &'static str,
        statement: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Self, PolicyError> {
        if let Some(s) = value.as_str() {
            return Ok(Principal::Wildcard(s.to_owned()));
        }
        let Some(map) = value.as_object() else {
            return Err(PolicyError::InvalidField {
                location: Location::Statement(statement),
                field,
                expected: "a string or an object",
                found: json_kind(value),
            });
        };

        let mut typed = BTreeMap::new();
        for (principal_type, entry) in map {
            let mut skip = |found| {
                diagnostics.push(Diagnostic { statement, field, key: principal_type.clone(), found })
            };
            let values: Vec<String> = match entry {
                Json::String(s) => vec![s.clone()],
                Json::Array(items) => items
                    .iter()
                    .filter_map(|item| match item.as_str() {
                        Some(s) => Some(s.to_owned()),
                        None => {
                            skip(json_kind(item));
                            None
                        }
                    })
                    .collect(),
                other => {
                    skip(json_kind(other));
                    continue;
                }
            };
            if values.is_empty() {
                skip("an entry with no string values");
                continue;
            }
            typed.insert(principal_type.clone(), values);
        }
        Ok(Principal::Typed(typed))
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Principal::Wildcard(s) if s == "*")
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Principal::Wildcard(s) => serializer.serialize_str(s),
            Principal::Typed(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Ordered action names. Never empty when the `Action` (or `NotAction`)
/// field was present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Actions(Vec<String>);

impl Actions {
    fn decode(value: Option<&Json>, field: &'static str, statement: usize) -> Result<Self, PolicyError> {
        let Some(value) = value else {
            return Ok(Actions::default());
        };
        let invalid = |found| PolicyError::InvalidField {
            location: Location::Statement(statement),
            field,
            expected: "a string or a non-empty array of strings",
            found,
        };
        if let Some(s) = value.as_str() {
            return Ok(Actions(vec![s.to_owned()]));
        }
        let Some(items) = value.as_array() else {
            return Err(invalid(json_kind(value)));
        };
        if items.is_empty() {
            return Err(invalid("an empty array"));
        }
        items
            .iter()
            .map(|item| item.as_str().map(str::to_owned).ok_or_else(|| invalid(json_kind(item))))
            .collect::<Result<Vec<_>, _>>()
            .map(Actions)
    }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn iter(&self) -> std::slice::Iter<'_, String> { self.0.iter() }
    pub fn as_slice(&self) -> &[String] { &self.0 }
}

impl<'a> IntoIterator for &'a Actions {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;
    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

/// A decoded document plus the soft diagnostics collected on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPolicy {
    pub document: PolicyDocument,
    pub diagnostics: Vec<Diagnostic>,
}

impl PolicyDocument {
    pub fn parse(text: &str) -> Result<ParsedPolicy, PolicyError> {
        parse_policy(text)
    }
}

// Wire shapes. Plain string fields go through serde; the polymorphic ones
// stay as raw JSON for the two-phase decode below. Null reads as absent.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDocument {
    version: Option<String>,
    id: Option<String>,
    statement: Option<Json>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStatement {
    sid: Option<String>,
    effect: Option<String>,
    principal: Option<Json>,
    not_principal: Option<Json>,
    action: Option<Json>,
    not_action: Option<Json>,
    resource: Option<String>,
    condition: Option<Json>,
}

/// Decode raw policy JSON as returned by the storage API.
pub fn parse_policy(text: &str) -> Result<ParsedPolicy, PolicyError> {
    let root: Json = serde_json::from_str(text)?;
    if !root.is_object() {
        return Err(PolicyError::NotAnObject { found: json_kind(&root) });
    }
    let raw: RawDocument = serde_json::from_value(root)?;

    let raw_statements = match raw.statement {
        None => Vec::new(),
        Some(Json::Array(items)) => items,
        Some(single @ Json::Object(_)) => vec![single],
        Some(other) => {
            return Err(PolicyError::InvalidField {
                location: Location::Document,
                field: "Statement",
                expected: "an object or an array of objects",
                found: json_kind(&other),
            })
        }
    };

    let mut diagnostics = Vec::new();
    let statements = raw_statements
        .into_iter()
        .enumerate()
        .map(|(i, raw)| decode_statement(raw, i, &mut diagnostics))
        .collect::<Result<Vec<_>, _>>()?;

    let document = PolicyDocument { version: raw.version.unwrap_or_default(), id: raw.id, statements };
    Ok(ParsedPolicy { document, diagnostics })
}

fn decode_statement(raw: Json, index: usize, diagnostics: &mut Vec<Diagnostic>) -> Result<Statement, PolicyError> {
    let location = Location::Statement(index);
    if !raw.is_object() {
        return Err(PolicyError::InvalidField {
            location,
            field: "Statement",
            expected: "an object",
            found: json_kind(&raw),
        });
    }
    let raw: RawStatement =
        serde_json::from_value(raw).map_err(|source| PolicyError::Statement { index, source })?;

    let effect = raw.effect.ok_or(PolicyError::MissingField { location, field: "Effect" })?;
    let principal = raw
        .principal
        .as_ref()
        .map(|v| Principal::decode(v, "Principal", index, diagnostics))
        .transpose()?;
    let not_principal = raw
        .not_principal
        .as_ref()
        .map(|v| Principal::decode(v, "NotPrincipal", index, diagnostics))
        .transpose()?;
    let condition = raw.condition.as_ref().map(|v| decode_condition(v, index, diagnostics)).transpose()?;

    Ok(Statement {
        sid: raw.sid,
        effect,
        principal,
        not_principal,
        actions: Actions::decode(raw.action.as_ref(), "Action", index)?,
        not_actions: Actions::decode(raw.not_action.as_ref(), "NotAction", index)?,
        resource: raw.resource.unwrap_or_default(),
        condition,
    })
}

fn decode_condition(value: &Json, statement: usize, diagnostics: &mut Vec<Diagnostic>) -> Result<Condition, PolicyError> {
    let invalid = |found| PolicyError::InvalidField {
        location: Location::Statement(statement),
        field: "Condition",
        expected: "an object of operator to key/value objects",
        found,
    };
    let operators = value.as_object().ok_or_else(|| invalid(json_kind(value)))?;
    let mut condition = Condition::new();
    for (operator, keys) in operators {
        let keys = keys.as_object().ok_or_else(|| invalid(json_kind(keys)))?;
        let mut entries = BTreeMap::new();
        for (key, entry) in keys {
            let mut skip = |found| {
                diagnostics.push(Diagnostic {
                    statement,
                    field: "Condition",
                    key: format!("{operator}/{key}"),
                    found,
                })
            };
            let values: Vec<String> = match (condition_scalar(entry), entry) {
                (Some(s), _) => vec![s],
                (None, Json::Array(items)) => items
                    .iter()
                    .filter_map(|item| {
                        let scalar = condition_scalar(item);
                        if scalar.is_none() {
                            skip(json_kind(item));
                        }
                        scalar
                    })
                    .collect(),
                (None, other) => {
                    skip(json_kind(other));
                    continue;
                }
            };
            if values.is_empty() {
                skip("an entry with no scalar values");
                continue;
            }
            entries.insert(key.clone(), values);
        }
        if !entries.is_empty() {
            condition.insert(operator.clone(), entries);
        }
    }
    Ok(condition)
}

/// Condition values are compared as strings; booleans and numbers keep
/// their JSON spelling.
fn condition_scalar(v: &Json) -> Option<String> {
    match v {
        Json::String(s) => Some(s.clone()),
        Json::Bool(b) => Some(b.to_string()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_kind(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn statement_with(field: &str, value: Json) -> String {
        let mut stmt = json!({
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": "arn:aws:s3:::bucket/*"
        });
        stmt[field] = value;
        json!({ "Version": "2012-10-17", "Statement": [stmt] }).to_string()
    }

    fn first_statement(text: &str) -> Statement {
        parse_policy(text).expect("policy should parse").document.statements.remove(0)
    }

    #[test]
    fn test_should_normalize_scalar_and_array_actions_identically() {
        let scalar = first_statement(&statement_with("Action", json!("s3:GetObject")));
        let array = first_statement(&statement_with("Action", json!(["s3:GetObject"])));
        assert_eq!(scalar.actions, array.actions);
        assert_eq!(scalar.actions.as_slice(), ["s3:GetObject".to_owned()]);
    }

    #[test]
    fn test_should_keep_action_order() {
        let stmt = first_statement(&statement_with("Action", json!(["s3:PutObject", "s3:GetObject"])));
        let actions: Vec<&str> = stmt.actions.iter().map(String::as_str).collect();
        assert_eq!(actions, ["s3:PutObject", "s3:GetObject"]);
    }

    #[test]
    fn test_should_reject_empty_action_array() {
        let err = parse_policy(&statement_with("Action", json!([]))).unwrap_err();
        assert_eq!(err.field(), Some("Action"));
    }

    #[test]
    fn test_should_decode_wildcard_principal() {
        let stmt = first_statement(&statement_with("Principal", json!("*")));
        assert_eq!(stmt.principal, Some(Principal::Wildcard("*".to_owned())));
        assert!(stmt.principal.is_some_and(|p| p.is_wildcard()));
    }

    #[test]
    fn test_should_normalize_single_principal_value_into_list() {
        let stmt = first_statement(&statement_with("Principal", json!({ "AWS": "arn:aws:iam::123456789012:root" })));
        let Some(Principal::Typed(map)) = stmt.principal else { panic!("expected typed principal") };
        assert_eq!(map.len(), 1);
        assert_eq!(map["AWS"], vec!["arn:aws:iam::123456789012:root".to_owned()]);
    }

    #[test]
    fn test_should_decode_principal_value_list() {
        let stmt = first_statement(&statement_with("Principal", json!({ "AWS": ["arn:a", "arn:b"] })));
        let Some(Principal::Typed(map)) = stmt.principal else { panic!("expected typed principal") };
        assert_eq!(map["AWS"], vec!["arn:a".to_owned(), "arn:b".to_owned()]);
    }

    #[test]
    fn test_should_reject_numeric_principal() {
        let err = parse_policy(&statement_with("Principal", json!(42))).unwrap_err();
        assert_eq!(err.field(), Some("Principal"));
        assert!(err.to_string().contains("Principal"), "{err}");
    }

    #[test]
    fn test_should_skip_unexpected_principal_values_with_diagnostics() {
        let parsed = parse_policy(&statement_with(
            "Principal",
            json!({ "AWS": ["arn:a", 7], "Service": { "nested": true }, "Federated": "cognito" }),
        ))
        .unwrap();
        let Some(Principal::Typed(map)) = &parsed.document.statements[0].principal else {
            panic!("expected typed principal")
        };
        assert_eq!(map["AWS"], vec!["arn:a".to_owned()]);
        assert_eq!(map["Federated"], vec!["cognito".to_owned()]);
        assert!(!map.contains_key("Service"));
        assert_eq!(parsed.diagnostics.len(), 2);
        assert!(parsed.diagnostics.iter().any(|d| d.key == "AWS" && d.found == "a number"));
        assert!(parsed.diagnostics.iter().any(|d| d.key == "Service" && d.found == "an object"));
    }

    #[test]
    fn test_should_preserve_statement_order_and_document_fields() {
        let text = json!({
            "Version": "2012-10-17",
            "Id": "Policy1",
            "Statement": [
                { "Sid": "first", "Effect": "Deny", "Principal": "*", "Action": "s3:*", "Resource": "a" },
                { "Sid": "second", "Effect": "Allow", "Principal": "*", "Action": "s3:GetObject", "Resource": "b" }
            ]
        })
        .to_string();
        let doc = parse_policy(&text).unwrap().document;
        assert_eq!(doc.version, "2012-10-17");
        assert_eq!(doc.id.as_deref(), Some("Policy1"));
        let sids: Vec<_> = doc.statements.iter().map(|s| s.sid.as_deref()).collect();
        assert_eq!(sids, [Some("first"), Some("second")]);
        assert_eq!(doc.statements[0].effect, "Deny");
    }

    #[test]
    fn test_should_accept_single_statement_object() {
        let text = json!({
            "Version": "2012-10-17",
            "Statement": { "Effect": "Allow", "Principal": "*", "Action": "s3:GetObject", "Resource": "r" }
        })
        .to_string();
        assert_eq!(parse_policy(&text).unwrap().document.statements.len(), 1);
    }

    #[test]
    fn test_should_decode_condition_map() {
        let stmt = first_statement(&statement_with(
            "Condition",
            json!({ "Bool": { "aws:SecureTransport": "false" }, "NumericLessThan": { "s3:TlsVersion": 1.2 } }),
        ));
        let condition = stmt.condition.unwrap();
        assert_eq!(condition["Bool"]["aws:SecureTransport"], ["false"]);
        assert_eq!(condition["NumericLessThan"]["s3:TlsVersion"], ["1.2"]);
    }

    #[test]
    fn test_should_decode_array_condition_values() {
        let stmt = first_statement(&statement_with(
            "Condition",
            json!({
                "NotIpAddress": { "aws:SourceIp": ["192.0.2.0/24", "203.0.113.0/24"] },
                "StringEquals": { "aws:PrincipalOrgID": "o-abc123", "s3:x-amz-acl": ["private"] }
            }),
        ));
        let condition = stmt.condition.unwrap();
        assert_eq!(condition["NotIpAddress"]["aws:SourceIp"], ["192.0.2.0/24", "203.0.113.0/24"]);
        assert_eq!(condition["StringEquals"]["aws:PrincipalOrgID"], ["o-abc123"]);
        assert_eq!(condition["StringEquals"]["s3:x-amz-acl"], ["private"]);
    }

    #[test]
    fn test_should_skip_nested_condition_values_with_diagnostics() {
        let parsed = parse_policy(&statement_with(
            "Condition",
            json!({ "Bool": { "k": { "x": 1 } }, "StringLike": { "s3:prefix": ["home/", { "x": 1 }] } }),
        ))
        .unwrap();
        let condition = parsed.document.statements[0].condition.as_ref().unwrap();
        assert!(!condition.contains_key("Bool"));
        assert_eq!(condition["StringLike"]["s3:prefix"], ["home/"]);
        assert_eq!(parsed.diagnostics.len(), 2);
        assert!(parsed.diagnostics.iter().all(|d| d.field == "Condition"));
        assert!(parsed.diagnostics.iter().any(|d| d.key == "Bool/k" && d.found == "an object"));
    }

    #[test]
    fn test_should_reject_condition_that_is_not_an_operator_map() {
        let err = parse_policy(&statement_with("Condition", json!({ "Bool": "true" }))).unwrap_err();
        assert_eq!(err.field(), Some("Condition"));
    }

    #[test]
    fn test_should_accept_not_principal_statement() {
        let text = json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Deny",
                "NotPrincipal": { "AWS": "arn:aws:iam::123456789012:root" },
                "NotAction": ["s3:GetObject", "s3:ListBucket"],
                "Resource": "arn:aws:s3:::bucket/*"
            }]
        })
        .to_string();
        let stmt = first_statement(&text);
        assert!(stmt.principal.is_none());
        let Some(Principal::Typed(map)) = &stmt.not_principal else { panic!("expected typed not-principal") };
        assert_eq!(map["AWS"], vec!["arn:aws:iam::123456789012:root".to_owned()]);
        assert!(stmt.actions.is_empty());
        assert_eq!(stmt.not_actions.len(), 2);

        let out = serde_json::to_value(&stmt).unwrap();
        assert!(out.get("Principal").is_none());
        assert_eq!(out["NotAction"], json!(["s3:GetObject", "s3:ListBucket"]));
    }

    #[test]
    fn test_should_treat_null_principal_as_absent() {
        let stmt = first_statement(&statement_with("Principal", Json::Null));
        assert!(stmt.principal.is_none());
    }

    #[test]
    fn test_should_reject_mistyped_plain_field_with_statement_index() {
        let err = parse_policy(&statement_with("Resource", json!(["a", "b"]))).unwrap_err();
        assert!(matches!(err, PolicyError::Statement { index: 0, .. }), "{err}");
    }

    #[test]
    fn test_should_require_effect() {
        let text = json!({ "Statement": [{ "Principal": "*", "Action": "s3:GetObject" }] }).to_string();
        let err = parse_policy(&text).unwrap_err();
        assert!(matches!(err, PolicyError::MissingField { field: "Effect", location: Location::Statement(0) }));
    }

    #[test]
    fn test_should_reject_invalid_json_and_non_objects() {
        assert!(matches!(parse_policy("{not json"), Err(PolicyError::Json(_))));
        assert!(matches!(parse_policy("[]"), Err(PolicyError::NotAnObject { found: "an array" })));
    }

    #[test]
    fn test_should_serialize_in_stable_shape() {
        let stmt = first_statement(&statement_with("Principal", json!({ "AWS": "arn:a" })));
        let out = serde_json::to_value(&stmt).unwrap();
        assert_eq!(out["Principal"], json!({ "AWS": ["arn:a"] }));
        assert_eq!(out["Action"], json!(["s3:GetObject"]));
        assert!(out.get("Condition").is_none());
    }
}
