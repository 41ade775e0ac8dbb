//! Global table of declaration names, built once per resolution run.
use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::diagnostics::ErrorKind;
use crate::ir::{DeclKind, Declaration, Protocol, Structure};

#[derive(Debug, Default)]
pub struct SymbolTable {
    decls: IndexMap<String, DeclKind>,
}

impl SymbolTable {
    /// Register every declaration of `protocol`: type aliases, enumerations,
    /// then structures with their nested structures under qualified names.
    pub fn build(protocol: &Protocol) -> Result<Self, ErrorKind> {
        let mut table = Self::default();
        for alias in &protocol.type_aliases {
            table.register(alias.name.as_str(), DeclKind::TypeAlias)?;
        }
        for enumeration in &protocol.enumerations {
            table.register(enumeration.name.as_str(), DeclKind::Enumeration)?;
        }
        for structure in &protocol.structures {
            table.register_structure(structure)?;
        }
        Ok(table)
    }

    fn register_structure(&mut self, structure: &Structure) -> Result<(), ErrorKind> {
        self.register(structure.qualified_name(), DeclKind::Structure)?;
        for nested in &structure.nested_structures {
            self.register_structure(nested)?;
        }
        Ok(())
    }

    /// Bind `name`. A name may be bound once.
    pub fn register(&mut self, name: impl Into<String>, kind: DeclKind) -> Result<(), ErrorKind> {
        match self.decls.entry(name.into()) {
            Entry::Occupied(existing) => Err(ErrorKind::DuplicateDefinition {
                name: existing.key().clone(),
                duplicate: kind,
                existing: *existing.get(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(kind);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Declaration, ErrorKind> {
        self.decls
            .get_key_value(name)
            .map(|(name, &kind)| Declaration { kind, name: name.clone() })
            .ok_or_else(|| ErrorKind::UnresolvedReference { name: name.to_string() })
    }

    pub(crate) fn len(&self) -> usize {
        self.decls.len()
    }

    /// Registration order.
    #[cfg(test)]
    fn iter(&self) -> impl Iterator<Item = (&str, DeclKind)> + '_ {
        self.decls.iter().map(|(name, &kind)| (name.as_str(), kind))
    }
}
