//! Raw meta-model → resolved `Protocol`.
//!
//! Resolution runs in phases over one `MetaModel`:
//!
//! 1. every declaration body is converted to IR, anonymous structure literals
//!    are synthesized into nested structures, and every reference created on
//!    the way is recorded with the scope it was created in;
//! 2. the symbol table is built from all declarations (nested ones under
//!    their qualified names) and every recorded reference is looked up, then
//!    bound;
//! 3. map key types are checked now that aliases can be followed;
//!
//! after which the direction views are indexed and the type aliases and
//! structures are put into emission order. The first failure aborts the run.
pub mod order;
pub mod symbols;

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::diagnostics::{ErrorKind, Frame, ResolveError, ScopeStack};
use crate::docs;
use crate::ir::{
    Docs, Enumeration, EnumerationEntry, EnumerationValue, MessageDirection, MetaData, Notification,
    Property, Protocol, Request, Structure, Type, TypeAlias, TypeDecl,
};
use crate::meta;
use crate::text;

use self::symbols::SymbolTable;

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINT
// ————————————————————————————————————————————————————————————————————————————

/// Resolve `model` into an ordered `Protocol`, or the first failure with the
/// scope it happened in. Every call runs on fresh state.
pub fn resolve(model: &meta::MetaModel) -> Result<Protocol, ResolveError> {
    Resolver::default().model(model)
}

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default)]
struct Resolver {
    scopes: ScopeStack,
    /// every reference created in phase 1
    references: Vec<Pending>,
    /// map keys that are references, checked in phase 3
    map_keys: Vec<Pending>,
}

/// A name used somewhere in phase 1, with the frames active at that point.
#[derive(Debug)]
struct Pending {
    name: String,
    context: Vec<Frame>,
}

impl Pending {
    fn error(&self, kind: ErrorKind) -> ResolveError {
        ResolveError::new(kind, self.context.clone())
    }
}

/// The structure that takes ownership of any anonymous literal met while
/// resolving one of its properties.
struct LiteralOwner<'a> {
    /// owner's `nested_names`
    path: &'a [String],
    property: &'a str,
    nested: &'a mut Vec<Structure>,
}

/// Resolved property list of a structure or structure literal.
#[derive(Default)]
struct Members {
    properties: Vec<Property>,
    kind: Option<String>,
    nested_structures: Vec<Structure>,
}

// ————————————————————————————————————————————————————————————————————————————
// PHASE 1: DECLARATION BODIES
// ————————————————————————————————————————————————————————————————————————————

impl Resolver {
    /// Run `f` with `frame` pushed. The frame is popped on every exit.
    fn scoped<T>(
        &mut self,
        frame: Frame,
        f: impl FnOnce(&mut Self) -> Result<T, ResolveError>,
    ) -> Result<T, ResolveError> {
        self.scopes.push(frame);
        let out = f(self);
        self.scopes.pop();
        out
    }

    fn each<I, O>(
        &mut self,
        items: &[I],
        f: impl Fn(&mut Self, &I) -> Result<O, ResolveError>,
    ) -> Result<Vec<O>, ResolveError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(f(self, item)?);
        }
        Ok(out)
    }

    fn model(&mut self, model: &meta::MetaModel) -> Result<Protocol, ResolveError> {
        self.scoped(Frame::Model, |r| {
            let mut protocol = Protocol {
                enumerations: r.each(&model.enumerations, Self::enumeration)?,
                meta_data: r.meta_data(&model.meta_data)?,
                notifications: r.each(&model.notifications, Self::notification)?,
                requests: r.each(&model.requests, Self::request)?,
                structures: r.each(&model.structures, Self::structure)?,
                type_aliases: r.each(&model.type_aliases, Self::type_alias)?,
                ..Protocol::default()
            };
            debug!(
                enumerations = protocol.enumerations.len(),
                structures = protocol.structures.len(),
                type_aliases = protocol.type_aliases.len(),
                requests = protocol.requests.len(),
                notifications = protocol.notifications.len(),
                references = r.references.len(),
                "resolved declaration bodies",
            );

            let symbols = r.bind(&mut protocol)?;
            debug!(symbols = symbols.len(), "bound references");

            r.check_map_keys(&protocol)?;
            debug!(map_keys = r.map_keys.len(), "checked map keys");

            protocol.index_directions();
            order::sort_type_aliases(&mut protocol.type_aliases);
            order::sort_structures(&mut protocol.structures);
            Ok(protocol)
        })
    }

    fn meta_data(&mut self, raw: &meta::MetaData) -> Result<MetaData, ResolveError> {
        self.scoped(Frame::MetaData, |_| Ok(MetaData { version: raw.version.clone() }))
    }

    fn enumeration(&mut self, raw: &meta::Enumeration) -> Result<Enumeration, ResolveError> {
        self.scoped(Frame::Enumeration(raw.name.clone()), |r| {
            Ok(Enumeration {
                name: text::class_name(&raw.name),
                ty: r.ty(&raw.ty, None)?,
                values: r.each(&raw.values, Self::enumeration_entry)?,
                supports_custom_values: raw.supports_custom_values,
                docs: raw.docs(),
            })
        })
    }

    fn enumeration_entry(&mut self, raw: &meta::EnumerationEntry) -> Result<EnumerationEntry, ResolveError> {
        self.scoped(Frame::EnumerationEntry(raw.name.clone()), |_| {
            let value = match &raw.value {
                meta::EnumerationValue::String(s) => EnumerationValue::String(s.clone()),
                meta::EnumerationValue::Number(n) => EnumerationValue::Number(n.clone()),
            };
            Ok(EnumerationEntry {
                name: text::class_name(&raw.name),
                value,
                docs: raw.docs(),
            })
        })
    }

    fn notification(&mut self, raw: &meta::Notification) -> Result<Notification, ResolveError> {
        self.scoped(Frame::Notification(raw.method.clone()), |r| {
            Ok(Notification {
                name: text::class_name(&raw.method),
                method: raw.method.clone(),
                params: r.params(raw.params.as_ref())?,
                message_direction: r.message_direction(&raw.message_direction)?,
                registration_method: raw.registration_method.clone(),
                registration_options: r.opt_ty(raw.registration_options.as_ref())?,
                docs: raw.docs(),
            })
        })
    }

    fn request(&mut self, raw: &meta::Request) -> Result<Request, ResolveError> {
        self.scoped(Frame::Request(raw.method.clone()), |r| {
            Ok(Request {
                name: text::class_name(&raw.method),
                method: raw.method.clone(),
                params: r.params(raw.params.as_ref())?,
                result: r.ty(&raw.result, None)?,
                partial_result: r.opt_ty(raw.partial_result.as_ref())?,
                error_data: r.opt_ty(raw.error_data.as_ref())?,
                message_direction: r.message_direction(&raw.message_direction)?,
                registration_method: raw.registration_method.clone(),
                registration_options: r.opt_ty(raw.registration_options.as_ref())?,
                docs: raw.docs(),
            })
        })
    }

    fn structure(&mut self, raw: &meta::Structure) -> Result<Structure, ResolveError> {
        self.scoped(Frame::Structure(raw.name.clone()), |r| {
            let name = text::class_name(&raw.name);
            let nested_names = vec![name.clone()];
            let extends = r.types(&raw.extends, None)?;
            let mixins = r.types(&raw.mixins, None)?;
            let members = r.members(&nested_names, &raw.properties)?;
            Ok(Structure {
                name,
                extends,
                mixins,
                properties: members.properties,
                kind: members.kind,
                nested_structures: members.nested_structures,
                nested_names,
                docs: raw.docs(),
            })
        })
    }

    /// Properties of the structure at `path`. Literals in property types
    /// become nested structures of it; a `kind` property typed as a string
    /// literal becomes its discriminator.
    fn members(&mut self, path: &[String], raw: &[meta::Property]) -> Result<Members, ResolveError> {
        let mut members = Members::default();
        for raw_property in raw {
            let mut owner = LiteralOwner {
                path,
                property: &raw_property.name,
                nested: &mut members.nested_structures,
            };
            let property = self.property(raw_property, Some(&mut owner))?;
            if property.json_name == "kind" {
                if let Type::StringLiteral { value } = &property.ty {
                    members.kind = Some(value.clone());
                    continue;
                }
            }
            members.properties.push(property);
        }
        Ok(members)
    }

    fn property(
        &mut self,
        raw: &meta::Property,
        owner: Option<&mut LiteralOwner<'_>>,
    ) -> Result<Property, ResolveError> {
        self.scoped(Frame::Property(raw.name.clone()), |r| {
            Ok(Property {
                json_name: raw.name.clone(),
                member_name: text::snake_case(&raw.name),
                ty: r.ty(&raw.ty, owner)?,
                optional: raw.optional,
                docs: raw.docs(),
            })
        })
    }

    fn type_alias(&mut self, raw: &meta::TypeAlias) -> Result<TypeAlias, ResolveError> {
        self.scoped(Frame::TypeAlias(raw.name.clone()), |r| {
            Ok(TypeAlias {
                name: text::class_name(&raw.name),
                ty: r.ty(&raw.ty, None)?,
                docs: raw.docs(),
            })
        })
    }

    fn message_direction(&self, raw: &str) -> Result<MessageDirection, ResolveError> {
        MessageDirection::from_wire(raw)
            .ok_or_else(|| self.scopes.error(ErrorKind::InvalidMessageDirection(raw.to_string())))
    }

    // ————————————————————————————————————————————————————————————————————————
    // TYPE EXPRESSIONS
    // ————————————————————————————————————————————————————————————————————————

    fn params(&mut self, raw: Option<&meta::Params>) -> Result<Vec<Type>, ResolveError> {
        match raw {
            Some(params) => self.types(params.as_slice(), None),
            None => Ok(Vec::new()),
        }
    }

    fn opt_ty(&mut self, raw: Option<&meta::Type>) -> Result<Option<Type>, ResolveError> {
        raw.map(|ty| self.ty(ty, None)).transpose()
    }

    fn types(
        &mut self,
        raw: &[meta::Type],
        mut owner: Option<&mut LiteralOwner<'_>>,
    ) -> Result<Vec<Type>, ResolveError> {
        let mut out = Vec::with_capacity(raw.len());
        for ty in raw {
            out.push(self.ty(ty, owner.as_deref_mut())?);
        }
        Ok(out)
    }

    /// Resolve one type expression. `owner` is the structure that adopts
    /// literals found in it; without one a literal is an error.
    fn ty(&mut self, raw: &meta::Type, mut owner: Option<&mut LiteralOwner<'_>>) -> Result<Type, ResolveError> {
        Ok(match raw {
            meta::Type::Base { name } => self.base(name)?,
            meta::Type::Reference { name } => self.reference(text::class_name(name)),
            meta::Type::Array { element } => Type::Array { element: Box::new(self.ty(element, owner)?) },
            meta::Type::Map { key, value } => {
                let key = self.ty(key, owner.as_deref_mut())?;
                self.map_key(&key)?;
                Type::Map { key: Box::new(key), value: Box::new(self.ty(value, owner)?) }
            }
            meta::Type::And { items } => Type::And { items: self.types(items, owner)? },
            meta::Type::Or { items } => Type::Or { items: self.types(items, owner)? },
            meta::Type::Tuple { items } => Type::Tuple { items: self.types(items, owner)? },
            meta::Type::Literal { value } => match owner {
                Some(owner) => self.structure_literal(value, owner)?,
                None => return Err(self.scopes.error(ErrorKind::OrphanStructureLiteral)),
            },
            meta::Type::StringLiteral { value } => Type::StringLiteral { value: value.clone() },
            meta::Type::IntegerLiteral { value } => Type::IntegerLiteral { value: *value },
            meta::Type::BooleanLiteral { value } => Type::BooleanLiteral { value: *value },
        })
    }

    fn base(&self, name: &str) -> Result<Type, ResolveError> {
        Ok(match name {
            "URI" => Type::Uri,
            "DocumentUri" => Type::DocumentUri,
            "integer" => Type::Integer,
            "uinteger" => Type::Uinteger,
            "decimal" => Type::Decimal,
            "RegExp" => Type::RegExp,
            "string" => Type::String,
            "boolean" => Type::Boolean,
            "null" => Type::Null,
            _ => return Err(self.scopes.error(ErrorKind::InvalidBaseType(name.to_string()))),
        })
    }

    /// An unbound reference, recorded for phase 2.
    fn reference(&mut self, name: String) -> Type {
        self.references.push(Pending { name: name.clone(), context: self.scopes.frames().to_vec() });
        Type::reference(name)
    }

    /// Base keys are checked here; reference keys once aliases can be followed.
    fn map_key(&mut self, key: &Type) -> Result<(), ResolveError> {
        match key {
            Type::Reference(reference) => {
                self.map_keys.push(Pending { name: reference.name.clone(), context: self.scopes.frames().to_vec() });
                Ok(())
            }
            key if key.is_map_key_base() => Ok(()),
            key => Err(self.scopes.error(ErrorKind::InvalidMapKey { found: key.variant_name().to_string() })),
        }
    }

    /// Synthesize a nested structure of `owner` for an anonymous literal and
    /// return a reference to it.
    fn structure_literal(
        &mut self,
        raw: &meta::StructureLiteral,
        owner: &mut LiteralOwner<'_>,
    ) -> Result<Type, ResolveError> {
        let name = child_name(&text::pascal_case(owner.property), owner.nested.as_slice());
        let mut nested_names = owner.path.to_vec();
        nested_names.push(name.clone());
        let qualified = nested_names.join("::");

        let structure = self.scoped(Frame::StructureLiteral(qualified.clone()), move |r| {
            let members = r.members(&nested_names, &raw.properties)?;
            Ok(Structure {
                name,
                extends: Vec::new(),
                mixins: Vec::new(),
                properties: members.properties,
                kind: members.kind,
                nested_structures: members.nested_structures,
                nested_names,
                docs: raw.docs(),
            })
        })?;
        trace!(structure = %qualified, properties = structure.properties.len(), "synthesized nested structure");
        owner.nested.push(structure);
        Ok(self.reference(qualified))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PHASE 2: BINDING
// ————————————————————————————————————————————————————————————————————————————

impl Resolver {
    fn bind(&mut self, protocol: &mut Protocol) -> Result<SymbolTable, ResolveError> {
        self.scoped(Frame::References, |r| {
            let symbols = SymbolTable::build(protocol).map_err(|kind| r.scopes.error(kind))?;
            for pending in &r.references {
                symbols.lookup(&pending.name).map_err(|kind| pending.error(kind))?;
            }
            for ty in protocol.types_mut() {
                ty.walk_mut(&mut |node| {
                    if let Type::Reference(reference) = node {
                        reference.declaration = symbols.lookup(&reference.name).ok();
                    }
                });
            }
            Ok(symbols)
        })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PHASE 3: MAP KEYS
// ————————————————————————————————————————————————————————————————————————————

impl Resolver {
    fn check_map_keys(&self, protocol: &Protocol) -> Result<(), ResolveError> {
        for pending in &self.map_keys {
            if let Err(found) = map_key_target(protocol, &pending.name) {
                let mut context = pending.context.clone();
                context.push(Frame::MapKeys);
                return Err(ResolveError::new(ErrorKind::InvalidMapKey { found }, context));
            }
        }
        Ok(())
    }
}

/// Follow `name` through type aliases until it reaches something that can
/// key a map. On failure, describes what it reached instead.
fn map_key_target(protocol: &Protocol, name: &str) -> Result<(), String> {
    let mut seen = HashSet::new();
    let mut name = name.to_string();
    loop {
        if !seen.insert(name.clone()) {
            return Err(format!("'{name}' (type alias cycle)"));
        }
        match protocol.declaration(&name) {
            Some(TypeDecl::TypeAlias(alias)) => match &alias.ty {
                Type::Reference(next) => name = next.name.clone(),
                ty if ty.is_map_key_base() => return Ok(()),
                ty => return Err(format!("{} via type alias '{}'", ty.variant_name(), alias.name)),
            },
            Some(TypeDecl::Enumeration(enumeration)) if enumeration.ty.is_map_key_base() => return Ok(()),
            Some(TypeDecl::Enumeration(enumeration)) => {
                return Err(format!(
                    "enumeration '{}' of {}",
                    enumeration.name,
                    enumeration.ty.variant_name()
                ));
            }
            Some(TypeDecl::Structure(structure)) => {
                return Err(format!("structure '{}'", structure.qualified_name()));
            }
            None => return Err(format!("'{name}'")),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// `base`, or `base2`, `base3`, ... if an earlier literal of the same owner
/// already took it.
fn child_name(base: &str, siblings: &[Structure]) -> String {
    let taken = |candidate: &str| siblings.iter().any(|s| s.name == candidate);
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Documentation block shared by every raw declaration.
trait RawDocs {
    fn docs(&self) -> Docs;
}

macro_rules! impl_raw_docs {
    ($($raw:ty),* $(,)?) => {$(
        impl RawDocs for $raw {
            fn docs(&self) -> Docs {
                Docs {
                    documentation: docs::normalize_opt(self.documentation.as_deref()),
                    deprecated: self.deprecated.clone(),
                    proposed: self.proposed,
                    since: self.since.clone(),
                }
            }
        }
    )*};
}

impl_raw_docs!(
    meta::Enumeration,
    meta::EnumerationEntry,
    meta::Notification,
    meta::Request,
    meta::Structure,
    meta::StructureLiteral,
    meta::Property,
    meta::TypeAlias,
);
