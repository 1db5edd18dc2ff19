//! Dynamic namespace that feature properties are resolved against
//!
//! A scope starts with a single builtin, `$import`, which pulls the exports of
//! a registered [`Package`] into the specification. Extension sets add more
//! `$`-prefixed functions. Assignments made by features land here too and
//! stay visible to every later feature of the same specification.

use crate::error::{PackspecError, Result};
use crate::types::{Function, Mapping, Value};
use indexmap::IndexMap;
use std::rc::Rc;

/// Name of the builtin import function
pub const IMPORT: &str = "$import";

/// Prefix that makes builtins and extension functions addressable
pub const HOOK_PREFIX: &str = "$";

/// Library surface that specifications can import
pub trait Package {
    /// Namespace name; `$import` matches it case-insensitively
    fn name(&self) -> &str;

    /// Top-level constants, functions and classes
    fn exports(&self) -> Mapping;
}

/// Packages known to the process
#[derive(Clone, Default)]
pub struct PackageRegistry {
    packages: Vec<Rc<dyn Package>>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: Package + 'static>(&mut self, package: P) -> &mut Self {
        self.packages.push(Rc::new(package));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Flat mapping of the exports of every package named `identifier`
    pub fn import(&self, identifier: &str) -> Result<Mapping> {
        let mut exports = Mapping::new();
        let mut found = false;
        for package in &self.packages {
            if package.name().to_lowercase() == identifier {
                found = true;
                exports.extend(package.exports());
            }
        }
        if !found {
            return Err(PackspecError::ImportFailed(identifier.to_string()));
        }
        tracing::debug!("Imported {} names from {}", exports.len(), identifier);
        Ok(exports)
    }
}

/// Closed set of named functions supplied by the environment
pub trait Extension {
    fn functions(&self) -> Vec<Function>;
}

/// Extension sets a specification may ask for by name
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    extensions: IndexMap<String, Rc<dyn Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E: Extension + 'static>(
        &mut self,
        name: impl Into<String>,
        extension: E,
    ) -> &mut Self {
        self.extensions.insert(name.into(), Rc::new(extension));
        self
    }

    pub fn get(&self, name: &str) -> Result<Rc<dyn Extension>> {
        self.extensions
            .get(name)
            .cloned()
            .ok_or_else(|| PackspecError::UnknownExtension(name.to_string()))
    }
}

/// Namespace of one specification run
#[derive(Debug, Clone)]
pub struct Scope {
    entries: Mapping,
}

impl Scope {
    /// Create a scope seeded with `$import` over `packages`
    pub fn new(packages: &PackageRegistry) -> Self {
        let packages = packages.clone();
        let import = Function::new(IMPORT, move |args| {
            let identifier = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| PackspecError::raise("$import expects a package name"))?;
            packages.import(identifier).map(Value::Object)
        });
        let mut entries = Mapping::new();
        entries.insert(IMPORT.to_string(), Value::Function(import));
        Self { entries }
    }

    /// Merge an extension's functions under the hook prefix
    pub fn register_extension(&mut self, extension: &dyn Extension) {
        for function in extension.functions() {
            let name = format!("{}{}", HOOK_PREFIX, function.name());
            tracing::debug!("Registering hook {}", name);
            self.entries.insert(name, Value::Function(function));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), value);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolve a dotted path one segment at a time
    pub fn lookup(&self, path: &str) -> Result<Value> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = self.entries.get(first).cloned().unwrap_or_default();
        for segment in segments {
            current = get_property(&current, segment)?;
        }
        Ok(current)
    }

    /// Bind the last segment of `path` on the owner the other segments name
    pub fn assign(&mut self, path: &str, value: Value) -> Result<()> {
        let names: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = names.split_last() else {
            return Err(assignment_error(path, "empty path"));
        };
        tracing::debug!("Assigning {}", path);
        let Some((first, rest)) = parents.split_first() else {
            self.entries.insert(last.to_string(), value);
            return Ok(());
        };
        let owner = self
            .entries
            .get_mut(*first)
            .ok_or_else(|| assignment_error(path, &format!("'{}' is not defined", first)))?;
        assign_into(owner, rest, last, value).map_err(|e| assignment_error(path, &e.to_string()))
    }
}

fn assignment_error(path: &str, message: &str) -> PackspecError {
    PackspecError::Assignment {
        path: path.to_string(),
        message: message.to_string(),
    }
}

/// Look up one path segment on `owner`
///
/// A function owner is invoked without arguments first. Mappings index by
/// key and sequences by integer; missing entries read as null. Classes and
/// instances resolve members and raise when there is none.
pub fn get_property(owner: &Value, name: &str) -> Result<Value> {
    if let Value::Function(function) = owner {
        return get_property(&function.call(&[])?, name);
    }
    match owner {
        Value::Object(mapping) => Ok(mapping.get(name).cloned().unwrap_or_default()),
        Value::Array(items) => Ok(sequence_index(name, items.len())?
            .and_then(|index| items.get(index))
            .cloned()
            .unwrap_or_default()),
        Value::Class(class) => class
            .member(name)
            .ok_or_else(|| undefined_member(name, owner)),
        Value::Instance(instance) => instance
            .member(name)
            .ok_or_else(|| undefined_member(name, owner)),
        other => Err(undefined_member(name, other)),
    }
}

fn undefined_member(name: &str, owner: &Value) -> PackspecError {
    PackspecError::raise(format!(
        "undefined member '{}' for {}",
        name,
        owner.type_name()
    ))
}

/// Integer index into a sequence of `len`; negative counts from the end
fn sequence_index(name: &str, len: usize) -> Result<Option<usize>> {
    let index: i64 = name
        .trim()
        .parse()
        .map_err(|_| PackspecError::raise(format!("invalid sequence index '{}'", name)))?;
    if index >= 0 {
        Ok(Some(index as usize))
    } else {
        Ok(len.checked_sub(index.unsigned_abs() as usize))
    }
}

/// Walk `parents` below `owner` and bind `name` on the last one
///
/// Data taken out of a class or instance member is written back after the
/// change. A function owner only accepts writes when it hands out a shared
/// class or instance; anything else it returns is a fresh copy.
fn assign_into(owner: &mut Value, parents: &[&str], name: &str, value: Value) -> Result<()> {
    if let Value::Function(function) = owner {
        let mut resolved = function.call(&[])?;
        if !matches!(resolved, Value::Class(_) | Value::Instance(_)) {
            return Err(PackspecError::raise(format!(
                "'{}' returns a {}, the write would be lost",
                function.name(),
                resolved.type_name()
            )));
        }
        return assign_into(&mut resolved, parents, name, value);
    }
    let Some((next, rest)) = parents.split_first() else {
        return set_property(owner, name, value);
    };
    match owner {
        Value::Object(mapping) => {
            let child = mapping
                .get_mut(*next)
                .ok_or_else(|| PackspecError::raise(format!("'{}' is not defined", next)))?;
            assign_into(child, rest, name, value)
        }
        Value::Array(items) => {
            let len = items.len();
            let child = sequence_index(next, len)?
                .and_then(|index| items.get_mut(index))
                .ok_or_else(|| PackspecError::raise(format!("index {} out of range", next)))?;
            assign_into(child, rest, name, value)
        }
        other => {
            let mut child = get_property(other, next)?;
            assign_into(&mut child, rest, name, value)?;
            match child {
                Value::Class(_) | Value::Instance(_) | Value::Function(_) => Ok(()),
                data => set_property(other, next, data),
            }
        }
    }
}

fn set_property(owner: &mut Value, name: &str, value: Value) -> Result<()> {
    match owner {
        Value::Object(mapping) => {
            mapping.insert(name.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = sequence_index(name, items.len())?
                .ok_or_else(|| PackspecError::raise(format!("index {} out of range", name)))?;
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            items[index] = value;
            Ok(())
        }
        Value::Class(class) => {
            class.set_member(name, value);
            Ok(())
        }
        Value::Instance(instance) => instance.set_member(name, value),
        other => Err(PackspecError::raise(format!(
            "cannot set '{}' on {}",
            name,
            other.type_name()
        ))),
    }
}
