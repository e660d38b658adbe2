//! Field validation for create/update payloads.
//!
//! # Responsibility
//! - Turn a raw JSON object into a normalized `EntityDraft` before any
//!   store access.
//! - Report every missing required field at once.
//!
//! # Invariants
//! - Check order: presence (aggregated), JSON type, name length, format.
//! - Free text is trimmed; blank optional values become `FieldValue::Null`.
//! - Unknown payload keys are ignored; only catalogue fields are written.
//!
//! # See also
//! - `model::entity` for the per-kind field tables.

use crate::model::entity::{EntityKind, FieldRule, FieldSpec, NAME_MAX_CHARS};
use crate::model::record::RecordId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://[^\s/?#]+([/?#]\S*)?$").expect("valid url regex"));

/// Validation failures, surfaced to callers as bad requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required fields absent or blank, in catalogue order.
    MissingFields(Vec<&'static str>),
    /// Field present with the wrong JSON type.
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },
    /// Name longer than the cap after trimming.
    NameTooLong { field: &'static str, max: usize },
    /// Malformed email address.
    InvalidEmail(&'static str),
    /// Malformed or non-http(s) URL.
    InvalidUrl(&'static str),
    /// Foreign key points at a row that does not exist.
    InvalidReference(EntityKind),
    /// Identifier segment is not a positive integer.
    InvalidId(String),
    /// Body is not a JSON object.
    InvalidBody(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFields(fields) => {
                write!(f, "Missing required fields: {}", fields.join(", "))
            }
            Self::InvalidType { field, expected } => {
                write!(f, "Field `{field}` must be {expected}")
            }
            Self::NameTooLong { field, max } => {
                write!(f, "Name length cannot exceed {max} characters: {field}")
            }
            Self::InvalidEmail(field) => write!(f, "Invalid email address: {field}"),
            Self::InvalidUrl(field) => write!(f, "Invalid URL: {field}"),
            Self::InvalidReference(kind) => write!(f, "Invalid {kind} selected"),
            Self::InvalidId(raw) => write!(f, "Invalid ID: `{raw}`"),
            Self::InvalidBody(details) => write!(f, "Invalid request body: {details}"),
        }
    }
}

impl Error for ValidationError {}

/// Normalized value of one writable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Id(RecordId),
    Null,
}

/// Validated, normalized write payload for one entity kind.
///
/// Holds one value for every catalogue field, in catalogue order, so an
/// update is always a full replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDraft {
    kind: EntityKind,
    values: Vec<(&'static FieldSpec, FieldValue)>,
}

impl EntityDraft {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Field/value pairs in catalogue order.
    pub fn values(&self) -> &[(&'static FieldSpec, FieldValue)] {
        &self.values
    }

    /// Looks up one value by JSON key.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(field, _)| field.key == key)
            .map(|(_, value)| value)
    }

    /// Foreign keys as `(target kind, id)` in declaration order.
    pub fn references(&self) -> impl Iterator<Item = (EntityKind, RecordId)> + '_ {
        self.values
            .iter()
            .filter_map(|(field, value)| match (field.rule, value) {
                (FieldRule::Reference(target), FieldValue::Id(id)) => Some((target, *id)),
                _ => None,
            })
    }
}

/// Validates a JSON payload against the catalogue entry for `kind`.
///
/// # Errors
/// - `InvalidBody` when `payload` is not an object.
/// - `MissingFields` listing every absent required field.
/// - `InvalidType`, `NameTooLong`, `InvalidEmail`, `InvalidUrl` for the
///   first offending field of each later stage.
pub fn validate_payload(kind: EntityKind, payload: &Value) -> Result<EntityDraft, ValidationError> {
    let object = payload
        .as_object()
        .ok_or_else(|| ValidationError::InvalidBody("expected a JSON object".to_string()))?;
    let fields = kind.spec().fields;

    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|field| field.rule.is_required() && is_missing(field.rule, object.get(field.key)))
        .map(|field| field.key)
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    let mut values = Vec::with_capacity(fields.len());
    for field in fields {
        values.push((field, normalize_field(field, object)?));
    }

    for (field, value) in &values {
        if let (FieldRule::Name, FieldValue::Text(text)) = (field.rule, value) {
            if text.chars().count() > NAME_MAX_CHARS {
                return Err(ValidationError::NameTooLong {
                    field: field.key,
                    max: NAME_MAX_CHARS,
                });
            }
        }
    }

    for (field, value) in &values {
        let FieldValue::Text(text) = value else {
            continue;
        };
        match field.rule {
            FieldRule::Email if !EMAIL_RE.is_match(text) => {
                return Err(ValidationError::InvalidEmail(field.key));
            }
            FieldRule::Url if !URL_RE.is_match(text) => {
                return Err(ValidationError::InvalidUrl(field.key));
            }
            _ => {}
        }
    }

    Ok(EntityDraft { kind, values })
}

/// Parses an identifier taken from a URL path segment.
pub fn parse_record_id(raw: &str) -> Result<RecordId, ValidationError> {
    match raw.trim().parse::<RecordId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationError::InvalidId(raw.to_string())),
    }
}

fn is_missing(rule: FieldRule, raw: Option<&Value>) -> bool {
    match raw {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(Value::Number(number)) => {
            matches!(rule, FieldRule::Reference(_)) && number.as_i64() == Some(0)
        }
        Some(_) => false,
    }
}

fn normalize_field(
    field: &'static FieldSpec,
    object: &Map<String, Value>,
) -> Result<FieldValue, ValidationError> {
    let raw = object.get(field.key);
    match field.rule {
        FieldRule::Reference(_) => parse_reference(field, raw),
        FieldRule::Name | FieldRule::Text | FieldRule::Email | FieldRule::Url => match raw {
            None | Some(Value::Null) => Ok(FieldValue::Null),
            Some(Value::String(text)) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Ok(FieldValue::Null)
                } else {
                    Ok(FieldValue::Text(trimmed.to_string()))
                }
            }
            Some(_) => Err(ValidationError::InvalidType {
                field: field.key,
                expected: "a string",
            }),
        },
    }
}

fn parse_reference(
    field: &'static FieldSpec,
    raw: Option<&Value>,
) -> Result<FieldValue, ValidationError> {
    let invalid = || ValidationError::InvalidType {
        field: field.key,
        expected: "a positive integer id",
    };
    let id = match raw {
        Some(Value::Number(number)) => number.as_i64().ok_or_else(invalid)?,
        Some(Value::String(text)) => text.trim().parse::<RecordId>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    if id <= 0 {
        return Err(invalid());
    }
    Ok(FieldValue::Id(id))
}

#[cfg(test)]
mod tests {
    use super::{parse_record_id, validate_payload, FieldValue, ValidationError};
    use crate::model::entity::EntityKind;
    use serde_json::json;

    #[test]
    fn missing_fields_are_aggregated_in_catalogue_order() {
        let err = validate_payload(EntityKind::Illam, &json!({ "nameMl": "x", "gramamId": 2 }))
            .expect_err("missing fields must fail");
        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["nameEn", "gothramId", "vedamId"])
        );
        assert_eq!(
            err.to_string(),
            "Missing required fields: nameEn, gothramId, vedamId"
        );
    }

    #[test]
    fn blank_names_and_zero_ids_count_as_missing() {
        let err = validate_payload(
            EntityKind::Namboodiri,
            &json!({
                "nameEn": "   ",
                "nameMl": "ml",
                "gothramId": 0,
                "illamId": "",
                "professionId": null
            }),
        )
        .expect_err("blank values must fail");
        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["nameEn", "gothramId", "illamId", "professionId"])
        );
    }

    #[test]
    fn text_is_trimmed_and_blank_optionals_become_null() {
        let draft = validate_payload(
            EntityKind::Illam,
            &json!({
                "nameEn": "  Kidangazhi ",
                "nameMl": "കിടങ്ങഴി",
                "gothramId": 1,
                "gramamId": "2",
                "vedamId": 3,
                "phone": "   ",
                "district": " Thrissur "
            }),
        )
        .expect("valid illam");

        assert_eq!(
            draft.get("nameEn"),
            Some(&FieldValue::Text("Kidangazhi".to_string()))
        );
        assert_eq!(draft.get("gramamId"), Some(&FieldValue::Id(2)));
        assert_eq!(draft.get("phone"), Some(&FieldValue::Null));
        assert_eq!(draft.get("mapsUrl"), Some(&FieldValue::Null));
        assert_eq!(
            draft.get("district"),
            Some(&FieldValue::Text("Thrissur".to_string()))
        );
        let refs: Vec<_> = draft.references().collect();
        assert_eq!(
            refs,
            vec![
                (EntityKind::Gothram, 1),
                (EntityKind::Gramam, 2),
                (EntityKind::Vedam, 3)
            ]
        );
    }

    #[test]
    fn name_cap_is_inclusive_at_two_hundred_characters() {
        let exact = "അ".repeat(200);
        validate_payload(
            EntityKind::Gothram,
            &json!({ "nameEn": "a".repeat(200), "nameMl": exact }),
        )
        .expect("200 characters is accepted");

        let err = validate_payload(
            EntityKind::Gothram,
            &json!({ "nameEn": "a".repeat(201), "nameMl": "ml" }),
        )
        .expect_err("201 characters is rejected");
        assert_eq!(
            err,
            ValidationError::NameTooLong {
                field: "nameEn",
                max: 200
            }
        );
    }

    #[test]
    fn wrong_json_types_are_rejected() {
        let err = validate_payload(EntityKind::Gramam, &json!({ "nameEn": 5, "nameMl": "ml" }))
            .expect_err("numeric name must fail");
        assert!(matches!(
            err,
            ValidationError::InvalidType { field: "nameEn", .. }
        ));

        let err = validate_payload(
            EntityKind::Illam,
            &json!({ "nameEn": "a", "nameMl": "b", "gothramId": "abc", "gramamId": 1, "vedamId": 1 }),
        )
        .expect_err("non-numeric id must fail");
        assert!(matches!(
            err,
            ValidationError::InvalidType {
                field: "gothramId",
                ..
            }
        ));

        let err = validate_payload(EntityKind::Vedam, &json!(["nameEn"]))
            .expect_err("array body must fail");
        assert!(matches!(err, ValidationError::InvalidBody(_)));
    }

    #[test]
    fn email_and_url_formats_are_enforced() {
        let base = json!({
            "nameEn": "a",
            "nameMl": "b",
            "gothramId": 1,
            "illamId": 1,
            "professionId": 1,
            "email": "not-an-email"
        });
        let err = validate_payload(EntityKind::Namboodiri, &base).expect_err("bad email");
        assert_eq!(err, ValidationError::InvalidEmail("email"));

        let err = validate_payload(
            EntityKind::Illam,
            &json!({
                "nameEn": "a",
                "nameMl": "b",
                "gothramId": 1,
                "gramamId": 1,
                "vedamId": 1,
                "mapsUrl": "ftp://maps.example.com/x"
            }),
        )
        .expect_err("non-http url");
        assert_eq!(err, ValidationError::InvalidUrl("mapsUrl"));

        validate_payload(
            EntityKind::Illam,
            &json!({
                "nameEn": "a",
                "nameMl": "b",
                "gothramId": 1,
                "gramamId": 1,
                "vedamId": 1,
                "mapsUrl": "https://maps.app.goo.gl/abc123"
            }),
        )
        .expect("https maps url is accepted");
    }

    #[test]
    fn parse_record_id_rejects_malformed_segments() {
        assert_eq!(parse_record_id("42"), Ok(42));
        assert!(parse_record_id("abc").is_err());
        assert!(parse_record_id("0").is_err());
        assert!(parse_record_id("-3").is_err());
        assert!(parse_record_id("1.5").is_err());
    }
}
