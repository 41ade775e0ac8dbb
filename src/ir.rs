//! Resolved IR handed to the emission stage. Read-only once `resolve` returns.
use std::fmt;

use serde::Serialize;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Type {
    Uri,
    DocumentUri,
    Integer,
    Uinteger,
    Decimal,
    RegExp,
    String,
    Boolean,
    Null,
    Array { element: Box<Type> },
    Map { key: Box<Type>, value: Box<Type> },
    And { items: Vec<Type> },
    Or { items: Vec<Type> },
    Tuple { items: Vec<Type> },
    StringLiteral { value: String },
    IntegerLiteral { value: i64 },
    BooleanLiteral { value: bool },
    Reference(Reference),
}

/// A named link to a declaration. `declaration` is filled in once every
/// declaration (synthesized ones included) is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration: Option<Declaration>,
}

/// Handle to a declaration in the `Protocol`, by qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeclKind {
    Structure,
    Enumeration,
    TypeAlias,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeclKind::Structure => "structure",
            DeclKind::Enumeration => "enumeration",
            DeclKind::TypeAlias => "type alias",
        })
    }
}

impl Type {
    pub fn reference(name: impl Into<String>) -> Self {
        Type::Reference(Reference { name: name.into(), declaration: None })
    }

    /// Direct children, in declaration order.
    pub fn subtypes(&self) -> Vec<&Type> {
        match self {
            Type::Array { element } => vec![element.as_ref()],
            Type::Map { key, value } => vec![key.as_ref(), value.as_ref()],
            Type::And { items } | Type::Or { items } | Type::Tuple { items } => items.iter().collect(),
            Type::Uri
            | Type::DocumentUri
            | Type::Integer
            | Type::Uinteger
            | Type::Decimal
            | Type::RegExp
            | Type::String
            | Type::Boolean
            | Type::Null
            | Type::StringLiteral { .. }
            | Type::IntegerLiteral { .. }
            | Type::BooleanLiteral { .. }
            | Type::Reference(_) => Vec::new(),
        }
    }

    /// Pre-order walk over this type and everything below it.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Type)) {
        f(self);
        for child in self.subtypes() {
            child.walk(f);
        }
    }

    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Type)) {
        f(self);
        match self {
            Type::Array { element } => element.walk_mut(f),
            Type::Map { key, value } => {
                key.walk_mut(f);
                value.walk_mut(f);
            }
            Type::And { items } | Type::Or { items } | Type::Tuple { items } => {
                for item in items {
                    item.walk_mut(f);
                }
            }
            Type::Uri
            | Type::DocumentUri
            | Type::Integer
            | Type::Uinteger
            | Type::Decimal
            | Type::RegExp
            | Type::String
            | Type::Boolean
            | Type::Null
            | Type::StringLiteral { .. }
            | Type::IntegerLiteral { .. }
            | Type::BooleanLiteral { .. }
            | Type::Reference(_) => {}
        }
    }

    /// Every reference reachable from this type, pre-order.
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.walk(&mut |ty| {
            if let Type::Reference(reference) = ty {
                out.push(reference);
            }
        });
        out
    }

    /// Variant name, for emitters that branch on the node kind by name.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Type::Uri => "Uri",
            Type::DocumentUri => "DocumentUri",
            Type::Integer => "Integer",
            Type::Uinteger => "Uinteger",
            Type::Decimal => "Decimal",
            Type::RegExp => "RegExp",
            Type::String => "String",
            Type::Boolean => "Boolean",
            Type::Null => "Null",
            Type::Array { .. } => "Array",
            Type::Map { .. } => "Map",
            Type::And { .. } => "And",
            Type::Or { .. } => "Or",
            Type::Tuple { .. } => "Tuple",
            Type::StringLiteral { .. } => "StringLiteral",
            Type::IntegerLiteral { .. } => "IntegerLiteral",
            Type::BooleanLiteral { .. } => "BooleanLiteral",
            Type::Reference(_) => "Reference",
        }
    }

    pub fn is(&self, variant: &str) -> bool {
        self.variant_name() == variant
    }

    /// Base types that may key a map: string-like or integer-like.
    pub fn is_map_key_base(&self) -> bool {
        matches!(
            self,
            Type::Uri | Type::DocumentUri | Type::String | Type::Integer | Type::Uinteger
        )
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

/// Documentation and lifecycle annotations shared by every declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Docs {
    pub documentation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    pub proposed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    /// unqualified; see `qualified_name`
    pub name: String,
    pub extends: Vec<Type>,
    /// properties of these are copied in, not inherited
    pub mixins: Vec<Type>,
    pub properties: Vec<Property>,
    /// value of a string-literal `kind` property, lifted out of `properties`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub nested_structures: Vec<Structure>,
    /// enclosing structure names, outermost first, ending with this one
    pub nested_names: Vec<String>,
    #[serde(flatten)]
    pub docs: Docs,
}

impl Structure {
    pub fn qualified_name(&self) -> String {
        self.nested_names.join("::")
    }

    pub fn nested(&self, name: &str) -> Option<&Structure> {
        self.nested_structures.iter().find(|s| s.name == name)
    }

    pub fn property(&self, json_name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.json_name == json_name)
    }

    /// Root type expressions of this structure and its nested structures.
    pub fn types(&self) -> Vec<&Type> {
        let mut out: Vec<&Type> = self.extends.iter().chain(&self.mixins).collect();
        out.extend(self.properties.iter().map(|p| &p.ty));
        for nested in &self.nested_structures {
            out.extend(nested.types());
        }
        out
    }

    fn types_mut(&mut self) -> Vec<&mut Type> {
        let mut out: Vec<&mut Type> = self.extends.iter_mut().chain(self.mixins.iter_mut()).collect();
        out.extend(self.properties.iter_mut().map(|p| &mut p.ty));
        for nested in &mut self.nested_structures {
            out.extend(nested.types_mut());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// name on the wire, verbatim
    pub json_name: String,
    /// snake_case member name for emitted code
    pub member_name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub optional: bool,
    #[serde(flatten)]
    pub docs: Docs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enumeration {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub values: Vec<EnumerationEntry>,
    pub supports_custom_values: bool,
    #[serde(flatten)]
    pub docs: Docs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumerationEntry {
    pub name: String,
    pub value: EnumerationValue,
    #[serde(flatten)]
    pub docs: Docs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnumerationValue {
    String(String),
    Number(serde_json::Number),
}

impl EnumerationValue {
    /// Source-literal rendering: strings quoted, numbers as-is.
    pub fn literal(&self) -> String {
        match self {
            EnumerationValue::String(s) => format!("\"{s}\""),
            EnumerationValue::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeAlias {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(flatten)]
    pub docs: Docs,
}

/// Borrowed view of any named declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeDecl<'a> {
    Structure(&'a Structure),
    Enumeration(&'a Enumeration),
    TypeAlias(&'a TypeAlias),
}

impl TypeDecl<'_> {
    pub fn kind(&self) -> DeclKind {
        match self {
            TypeDecl::Structure(_) => DeclKind::Structure,
            TypeDecl::Enumeration(_) => DeclKind::Enumeration,
            TypeDecl::TypeAlias(_) => DeclKind::TypeAlias,
        }
    }

    /// Qualified name (`Outer::Inner` for nested structures).
    pub fn name(&self) -> String {
        match self {
            TypeDecl::Structure(s) => s.qualified_name(),
            TypeDecl::Enumeration(e) => e.name.clone(),
            TypeDecl::TypeAlias(a) => a.name.clone(),
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            TypeDecl::Structure(_) => "Structure",
            TypeDecl::Enumeration(_) => "Enumeration",
            TypeDecl::TypeAlias(_) => "TypeAlias",
        }
    }

    pub fn is(&self, variant: &str) -> bool {
        self.variant_name() == variant
    }
}

// ————————————————————————————————————————————————————————————————————————————
// MESSAGES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageDirection {
    ClientToServer,
    ServerToClient,
    Bidirectional,
}

impl MessageDirection {
    /// `clientToServer`, `serverToClient` or `both`.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "clientToServer" => Some(MessageDirection::ClientToServer),
            "serverToClient" => Some(MessageDirection::ServerToClient),
            "both" => Some(MessageDirection::Bidirectional),
            _ => None,
        }
    }

    pub fn client_to_server(self) -> bool {
        matches!(self, MessageDirection::ClientToServer | MessageDirection::Bidirectional)
    }

    pub fn server_to_client(self) -> bool {
        matches!(self, MessageDirection::ServerToClient | MessageDirection::Bidirectional)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// declaration-style name derived from `method`
    pub name: String,
    pub method: String,
    pub params: Vec<Type>,
    pub result: Type,
    pub partial_result: Option<Type>,
    pub error_data: Option<Type>,
    pub message_direction: MessageDirection,
    pub registration_method: Option<String>,
    pub registration_options: Option<Type>,
    #[serde(flatten)]
    pub docs: Docs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub name: String,
    pub method: String,
    pub params: Vec<Type>,
    pub message_direction: MessageDirection,
    pub registration_method: Option<String>,
    pub registration_options: Option<Type>,
    #[serde(flatten)]
    pub docs: Docs,
}

// ————————————————————————————————————————————————————————————————————————————
// PROTOCOL
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetaData {
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub meta_data: MetaData,
    pub enumerations: Vec<Enumeration>,
    /// emission order: dependencies first
    pub structures: Vec<Structure>,
    /// emission order: dependencies first
    pub type_aliases: Vec<TypeAlias>,
    pub requests: Vec<Request>,
    pub notifications: Vec<Notification>,
    // direction views, as indices into `requests` / `notifications`
    pub(crate) client_to_server_requests: Vec<usize>,
    pub(crate) server_to_client_requests: Vec<usize>,
    pub(crate) client_to_server_notifications: Vec<usize>,
    pub(crate) server_to_client_notifications: Vec<usize>,
}

impl Protocol {
    /// Requests the server handles. Bidirectional requests appear in both views.
    pub fn client_to_server_requests(&self) -> impl Iterator<Item = &Request> + '_ {
        self.client_to_server_requests.iter().map(|&i| &self.requests[i])
    }

    /// Requests the client handles.
    pub fn server_to_client_requests(&self) -> impl Iterator<Item = &Request> + '_ {
        self.server_to_client_requests.iter().map(|&i| &self.requests[i])
    }

    pub fn client_to_server_notifications(&self) -> impl Iterator<Item = &Notification> + '_ {
        self.client_to_server_notifications.iter().map(|&i| &self.notifications[i])
    }

    pub fn server_to_client_notifications(&self) -> impl Iterator<Item = &Notification> + '_ {
        self.server_to_client_notifications.iter().map(|&i| &self.notifications[i])
    }

    /// Rebuild the direction views from `requests` and `notifications`.
    pub(crate) fn index_directions(&mut self) {
        let split = |directions: Vec<MessageDirection>| -> (Vec<usize>, Vec<usize>) {
            let c2s = (0..directions.len()).filter(|&i| directions[i].client_to_server()).collect();
            let s2c = (0..directions.len()).filter(|&i| directions[i].server_to_client()).collect();
            (c2s, s2c)
        };
        (self.client_to_server_requests, self.server_to_client_requests) =
            split(self.requests.iter().map(|r| r.message_direction).collect());
        (self.client_to_server_notifications, self.server_to_client_notifications) =
            split(self.notifications.iter().map(|n| n.message_direction).collect());
    }

    /// Look up a declaration by qualified name. `Outer::Inner` finds the
    /// nested structure `Inner` of `Outer`.
    pub fn declaration(&self, name: &str) -> Option<TypeDecl<'_>> {
        let mut segments = name.split("::");
        let first = segments.next()?;
        if let Some(mut current) = self.structures.iter().find(|s| s.name == first) {
            for segment in segments {
                current = current.nested(segment)?;
            }
            return Some(TypeDecl::Structure(current));
        }
        if name.contains("::") {
            return None;
        }
        if let Some(e) = self.enumerations.iter().find(|e| e.name == name) {
            return Some(TypeDecl::Enumeration(e));
        }
        self.type_aliases.iter().find(|a| a.name == name).map(TypeDecl::TypeAlias)
    }

    /// The declaration a bound reference points at.
    pub fn target(&self, reference: &Reference) -> Option<TypeDecl<'_>> {
        reference.declaration.as_ref().and_then(|d| self.declaration(&d.name))
    }

    pub fn structure(&self, name: &str) -> Option<&Structure> {
        match self.declaration(name)? {
            TypeDecl::Structure(s) => Some(s),
            _ => None,
        }
    }

    /// Every root type expression in the protocol.
    pub fn types(&self) -> Vec<&Type> {
        let mut out: Vec<&Type> = self.enumerations.iter().map(|e| &e.ty).collect();
        for s in &self.structures {
            out.extend(s.types());
        }
        out.extend(self.type_aliases.iter().map(|a| &a.ty));
        for r in &self.requests {
            out.extend(&r.params);
            out.push(&r.result);
            out.extend(r.partial_result.iter().chain(&r.error_data).chain(&r.registration_options));
        }
        for n in &self.notifications {
            out.extend(&n.params);
            out.extend(n.registration_options.iter());
        }
        out
    }

    /// Every root type expression in the protocol, mutably.
    pub(crate) fn types_mut(&mut self) -> Vec<&mut Type> {
        let mut out: Vec<&mut Type> = self.enumerations.iter_mut().map(|e| &mut e.ty).collect();
        for s in &mut self.structures {
            out.extend(s.types_mut());
        }
        out.extend(self.type_aliases.iter_mut().map(|a| &mut a.ty));
        for r in &mut self.requests {
            out.extend(r.params.iter_mut());
            out.push(&mut r.result);
            out.extend(
                r.partial_result
                    .iter_mut()
                    .chain(r.error_data.iter_mut())
                    .chain(r.registration_options.iter_mut()),
            );
        }
        for n in &mut self.notifications {
            out.extend(n.params.iter_mut());
            out.extend(n.registration_options.iter_mut());
        }
        out
    }

    /// Every reference in the protocol, pre-order within each root type.
    pub fn references(&self) -> Vec<&Reference> {
        self.types().into_iter().flat_map(Type::references).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn structure(path: &[&str], nested: Vec<Structure>) -> Structure {
        Structure {
            name: path.last().map(|s| s.to_string()).unwrap_or_default(),
            extends: Vec::new(),
            mixins: Vec::new(),
            properties: Vec::new(),
            kind: None,
            nested_structures: nested,
            nested_names: path.iter().map(|s| s.to_string()).collect(),
            docs: Docs::default(),
        }
    }

    #[test]
    fn walk_is_pre_order() {
        let ty = Type::Or {
            items: vec![
                Type::Array { element: Box::new(Type::reference("A")) },
                Type::Map { key: Box::new(Type::String), value: Box::new(Type::reference("B")) },
            ],
        };
        let mut seen = Vec::new();
        ty.walk(&mut |t| seen.push(t.variant_name()));
        assert_eq!(seen, vec!["Or", "Array", "Reference", "Map", "String", "Reference"]);
        let names: Vec<&str> = ty.references().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn walk_mut_reaches_every_reference() {
        let mut ty = Type::Tuple { items: vec![Type::reference("A"), Type::reference("B")] };
        ty.walk_mut(&mut |t| {
            if let Type::Reference(r) = t {
                r.name.push('!');
            }
        });
        let names: Vec<&str> = ty.references().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A!", "B!"]);
    }

    #[test]
    fn qualified_lookup_descends_into_nested_structures() {
        let protocol = Protocol {
            structures: vec![structure(
                &["Outer"],
                vec![structure(&["Outer", "Inner"], vec![structure(&["Outer", "Inner", "Deep"], vec![])])],
            )],
            ..Protocol::default()
        };
        let decl = protocol.declaration("Outer::Inner::Deep").unwrap();
        assert_eq!(decl.name(), "Outer::Inner::Deep");
        assert!(decl.is("Structure"));
        assert_eq!(protocol.declaration("Outer").unwrap().name(), "Outer");
        assert!(protocol.declaration("Outer::Missing").is_none());
        assert!(protocol.declaration("Inner").is_none());
    }

    #[test]
    fn enumeration_literals() {
        assert_eq!(EnumerationValue::String("abc".into()).literal(), "\"abc\"");
        assert_eq!(EnumerationValue::Number(3.into()).literal(), "3");
    }

    #[test]
    fn direction_views_include_bidirectional_in_both() {
        assert!(MessageDirection::Bidirectional.client_to_server());
        assert!(MessageDirection::Bidirectional.server_to_client());
        assert!(!MessageDirection::ClientToServer.server_to_client());
        assert_eq!(MessageDirection::from_wire("both"), Some(MessageDirection::Bidirectional));
        assert_eq!(MessageDirection::from_wire("sideways"), None);
    }
}
