//! Raw meta-model, exactly as it appears in the JSON document.
//!
//! Nothing here is resolved: names are verbatim, references are plain
//! strings, and `base` type names / message directions are kept as free
//! strings so the resolver can report them with full context.
use std::fmt;

use serde::de::{self, DeserializeOwned, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

// ————————————————————————————————————————————————————————————————————————————
// MODEL
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaModel {
    #[serde(default)]
    pub meta_data: MetaData,
    #[serde(default)]
    pub requests: Vec<Request>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub structures: Vec<Structure>,
    #[serde(default)]
    pub enumerations: Vec<Enumeration>,
    #[serde(default)]
    pub type_aliases: Vec<TypeAlias>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetaData {
    /// protocol version
    #[serde(default)]
    pub version: String,
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE GRAMMAR
// ————————————————————————————————————————————————————————————————————————————

/// One type expression, discriminated by its `kind` field.
///
/// Decoded by hand (see DECODING below) so that errors inside nested type
/// expressions keep their full JSON path.
#[derive(Debug, Clone)]
pub enum Type {
    /// `string`, `integer`, `DocumentUri`, ...
    Base { name: String },
    Reference { name: String },
    Array { element: Box<Type> },
    Map { key: Box<Type>, value: Box<Type> },
    And { items: Vec<Type> },
    Or { items: Vec<Type> },
    Tuple { items: Vec<Type> },
    /// inline anonymous object, e.g. `{ start: uinteger; end: uinteger }`
    Literal { value: StructureLiteral },
    StringLiteral { value: String },
    IntegerLiteral { value: i64 },
    BooleanLiteral { value: bool },
}

/// The `kind` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Kind {
    Base,
    Reference,
    Array,
    Map,
    And,
    Or,
    Tuple,
    Literal,
    StringLiteral,
    IntegerLiteral,
    BooleanLiteral,
}

/// Message parameters are either a single type or a list of them.
#[derive(Debug, Clone)]
pub enum Params {
    One(Type),
    Many(Vec<Type>),
}

impl Params {
    pub fn as_slice(&self) -> &[Type] {
        match self {
            Params::One(ty) => std::slice::from_ref(ty),
            Params::Many(tys) => tys,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    pub name: String,
    #[serde(default)]
    pub extends: Vec<Type>,
    #[serde(default)]
    pub mixins: Vec<Type>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub proposed: bool,
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureLiteral {
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub proposed: bool,
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub proposed: bool,
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enumeration {
    pub name: String,
    /// element type the values conform to
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub values: Vec<EnumerationEntry>,
    #[serde(default)]
    pub supports_custom_values: bool,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub proposed: bool,
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumerationEntry {
    pub name: String,
    pub value: EnumerationValue,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub proposed: bool,
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EnumerationValue {
    String(String),
    Number(serde_json::Number),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeAlias {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub proposed: bool,
    #[serde(default)]
    pub since: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// MESSAGES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub params: Option<Params>,
    pub result: Type,
    #[serde(default)]
    pub partial_result: Option<Type>,
    #[serde(default)]
    pub error_data: Option<Type>,
    /// `clientToServer`, `serverToClient` or `both`
    pub message_direction: String,
    #[serde(default)]
    pub registration_method: Option<String>,
    #[serde(default)]
    pub registration_options: Option<Type>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub proposed: bool,
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub method: String,
    #[serde(default)]
    pub params: Option<Params>,
    pub message_direction: String,
    #[serde(default)]
    pub registration_method: Option<String>,
    #[serde(default)]
    pub registration_options: Option<Type>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub proposed: bool,
    #[serde(default)]
    pub since: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// DECODING
// ————————————————————————————————————————————————————————————————————————————

impl<'de> Deserialize<'de> for Type {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TypeVisitor)
    }
}

impl<'de> Deserialize<'de> for Params {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ParamsVisitor)
    }
}

/// `value` of a type node. Its shape depends on `kind`; when `kind` has not
/// been seen yet the raw JSON is held until it has.
enum ValueField {
    Literal(StructureLiteral),
    String(String),
    Integer(i64),
    Boolean(bool),
    Type(Box<Type>),
    Pending(serde_json::Value),
}

impl ValueField {
    fn take<T: DeserializeOwned, E: de::Error>(
        field: Option<Self>,
        pick: impl FnOnce(Self) -> Option<T>,
    ) -> Result<T, E> {
        match field {
            None => Err(E::missing_field("value")),
            Some(ValueField::Pending(json)) => T::deserialize(json).map_err(E::custom),
            Some(field) => pick(field).ok_or_else(|| E::custom("`value` does not match `kind`")),
        }
    }
}

struct TypeVisitor;

impl<'de> Visitor<'de> for TypeVisitor {
    type Value = Type;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a type expression object with a `kind` field")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Type, A::Error> {
        let mut kind: Option<Kind> = None;
        let mut name: Option<String> = None;
        let mut element: Option<Box<Type>> = None;
        let mut key: Option<Box<Type>> = None;
        let mut items: Option<Vec<Type>> = None;
        let mut value: Option<ValueField> = None;

        while let Some(field) = map.next_key::<String>()? {
            match field.as_str() {
                "kind" => kind = Some(map.next_value()?),
                "name" => name = Some(map.next_value()?),
                "element" => element = Some(map.next_value()?),
                "key" => key = Some(map.next_value()?),
                "items" => items = Some(map.next_value()?),
                "value" => {
                    value = Some(match kind {
                        Some(Kind::Literal) => ValueField::Literal(map.next_value()?),
                        Some(Kind::StringLiteral) => ValueField::String(map.next_value()?),
                        Some(Kind::IntegerLiteral) => ValueField::Integer(map.next_value()?),
                        Some(Kind::BooleanLiteral) => ValueField::Boolean(map.next_value()?),
                        Some(Kind::Map) => ValueField::Type(map.next_value()?),
                        Some(_) => {
                            map.next_value::<IgnoredAny>()?;
                            continue;
                        }
                        None => ValueField::Pending(map.next_value()?),
                    })
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let missing = |field: &'static str| <A::Error as de::Error>::missing_field(field);
        let kind = kind.ok_or_else(|| missing("kind"))?;
        Ok(match kind {
            Kind::Base => Type::Base { name: name.ok_or_else(|| missing("name"))? },
            Kind::Reference => Type::Reference { name: name.ok_or_else(|| missing("name"))? },
            Kind::Array => Type::Array { element: element.ok_or_else(|| missing("element"))? },
            Kind::Map => Type::Map {
                key: key.ok_or_else(|| missing("key"))?,
                value: ValueField::take::<_, A::Error>(value, |v| match v {
                    ValueField::Type(ty) => Some(ty),
                    _ => None,
                })?,
            },
            Kind::And => Type::And { items: items.ok_or_else(|| missing("items"))? },
            Kind::Or => Type::Or { items: items.ok_or_else(|| missing("items"))? },
            Kind::Tuple => Type::Tuple { items: items.ok_or_else(|| missing("items"))? },
            Kind::Literal => Type::Literal {
                value: ValueField::take::<_, A::Error>(value, |v| match v {
                    ValueField::Literal(literal) => Some(literal),
                    _ => None,
                })?,
            },
            Kind::StringLiteral => Type::StringLiteral {
                value: ValueField::take::<_, A::Error>(value, |v| match v {
                    ValueField::String(s) => Some(s),
                    _ => None,
                })?,
            },
            Kind::IntegerLiteral => Type::IntegerLiteral {
                value: ValueField::take::<_, A::Error>(value, |v| match v {
                    ValueField::Integer(n) => Some(n),
                    _ => None,
                })?,
            },
            Kind::BooleanLiteral => Type::BooleanLiteral {
                value: ValueField::take::<_, A::Error>(value, |v| match v {
                    ValueField::Boolean(b) => Some(b),
                    _ => None,
                })?,
            },
        })
    }
}

struct ParamsVisitor;

impl<'de> Visitor<'de> for ParamsVisitor {
    type Value = Params;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a type expression or an array of them")
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Params, A::Error> {
        TypeVisitor.visit_map(map).map(Params::One)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Params, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(ty) = seq.next_element::<Type>()? {
            items.push(ty);
        }
        Ok(Params::Many(items))
    }
}

impl std::str::FromStr for MetaModel {
    type Err = crate::error::Error;

    fn from_str(src: &str) -> crate::error::Result<Self> {
        crate::path_de::from_str_with_path(src)
    }
}

impl MetaModel {
    pub fn from_slice(bytes: &[u8]) -> crate::error::Result<Self> {
        crate::path_de::from_slice_with_path(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> crate::error::Result<MetaModel> {
        value.to_string().parse()
    }

    #[test]
    fn decodes_every_type_kind() {
        let model = decode(json!({
            "typeAliases": [{
                "name": "Everything",
                "type": { "kind": "tuple", "items": [
                    { "kind": "base", "name": "string" },
                    { "kind": "reference", "name": "Other" },
                    { "kind": "array", "element": { "kind": "base", "name": "integer" } },
                    { "kind": "map",
                      "key": { "kind": "base", "name": "string" },
                      "value": { "kind": "base", "name": "boolean" } },
                    { "kind": "and", "items": [] },
                    { "kind": "or", "items": [] },
                    { "kind": "literal", "value": { "properties": [] } },
                    { "kind": "stringLiteral", "value": "x" },
                    { "kind": "integerLiteral", "value": 7 },
                    { "kind": "booleanLiteral", "value": true }
                ]}
            }]
        }))
        .unwrap();

        let Type::Tuple { items } = &model.type_aliases[0].ty else {
            panic!("expected tuple, got {:?}", model.type_aliases[0].ty);
        };
        assert_eq!(items.len(), 10);
        assert!(matches!(&items[1], Type::Reference { name } if name == "Other"));
        assert!(matches!(&items[8], Type::IntegerLiteral { value: 7 }));
        assert!(matches!(&items[9], Type::BooleanLiteral { value: true }));
    }

    #[test]
    fn unknown_kind_is_a_decode_error_with_path() {
        let err = decode(json!({
            "typeAliases": [{ "name": "Bad", "type": { "kind": "wat" } }]
        }))
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("typeAliases[0]"), "{message}");
        assert!(message.contains("wat"), "{message}");
    }

    #[test]
    fn nested_bad_kind_reports_the_innermost_path() {
        let err = decode(json!({
            "structures": [{
                "name": "Outer",
                "properties": [{
                    "name": "field",
                    "type": { "kind": "array", "element": {
                        "kind": "or",
                        "items": [{ "kind": "wat" }]
                    } }
                }]
            }]
        }))
        .unwrap_err();
        let message = err.to_string();
        assert!(
            message.contains("structures[0].properties[0].type.element.items[0]"),
            "{message}"
        );
        assert!(message.contains("wat"), "{message}");
    }

    #[test]
    fn bad_kind_in_params_keeps_its_message() {
        let single = decode(json!({
            "requests": [{
                "method": "a", "messageDirection": "both",
                "result": { "kind": "base", "name": "null" },
                "params": { "kind": "wat" }
            }]
        }))
        .unwrap_err()
        .to_string();
        assert!(single.contains("requests[0].params"), "{single}");
        assert!(single.contains("wat"), "{single}");
        assert!(!single.contains("untagged"), "{single}");

        let listed = decode(json!({
            "notifications": [{
                "method": "b", "messageDirection": "both",
                "params": [{ "kind": "base", "name": "string" }, { "kind": "wat" }]
            }]
        }))
        .unwrap_err()
        .to_string();
        assert!(listed.contains("notifications[0].params[1]"), "{listed}");
        assert!(listed.contains("wat"), "{listed}");
    }

    #[test]
    fn value_may_precede_kind() {
        let model = decode(json!({
            "typeAliases": [
                { "name": "A", "type": { "value": "x", "kind": "stringLiteral" } },
                { "name": "B", "type": {
                    "value": { "kind": "base", "name": "integer" },
                    "key": { "kind": "base", "name": "string" },
                    "kind": "map"
                } }
            ]
        }))
        .unwrap();
        assert!(matches!(&model.type_aliases[0].ty, Type::StringLiteral { value } if value == "x"));
        assert!(matches!(
            &model.type_aliases[1].ty,
            Type::Map { value, .. } if matches!(value.as_ref(), Type::Base { name } if name == "integer")
        ));
    }

    #[test]
    fn missing_field_names_the_field() {
        let err = decode(json!({
            "typeAliases": [{ "name": "A", "type": { "kind": "array" } }]
        }))
        .unwrap_err()
        .to_string();
        assert!(err.contains("typeAliases[0].type"), "{err}");
        assert!(err.contains("element"), "{err}");
    }

    #[test]
    fn params_accept_one_or_many() {
        let model = decode(json!({
            "notifications": [
                { "method": "a", "messageDirection": "both",
                  "params": { "kind": "base", "name": "null" } },
                { "method": "b", "messageDirection": "both",
                  "params": [
                      { "kind": "base", "name": "string" },
                      { "kind": "base", "name": "integer" }
                  ] },
                { "method": "c", "messageDirection": "both" }
            ]
        }))
        .unwrap();
        let lens: Vec<usize> = model
            .notifications
            .iter()
            .map(|n| n.params.as_ref().map_or(0, |p| p.as_slice().len()))
            .collect();
        assert_eq!(lens, vec![1, 2, 0]);
    }

    #[test]
    fn enumeration_values_are_strings_or_numbers() {
        let model = decode(json!({
            "enumerations": [{
                "name": "Mixed",
                "type": { "kind": "base", "name": "string" },
                "values": [
                    { "name": "a", "value": "alpha" },
                    { "name": "b", "value": 2 }
                ]
            }]
        }))
        .unwrap();
        let values = &model.enumerations[0].values;
        assert_eq!(values[0].value, EnumerationValue::String("alpha".into()));
        assert!(matches!(&values[1].value, EnumerationValue::Number(n) if n.as_i64() == Some(2)));
    }
}
