use serde_yaml::{Mapping, Value};
use std::path::Path;

use crate::errors::*;
use crate::service::IgnoreSet;
use crate::services_scope::*;

/// All scopes of one merge run, kept in registration order.
#[derive(Default)]
pub struct ScopesContainer {
    scopes: Vec<ServicesScope>,
    ignored_services: IgnoreSet,
}

impl ScopesContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.scopes.clear();
        self.ignored_services.clear();
    }

    pub fn set_ignored<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.ignored_services = names.into_iter().collect();
    }

    pub fn ignored_services(&self) -> &IgnoreSet {
        &self.ignored_services
    }

    /// Registers `scope` under its prefix; a scope with the same prefix is replaced in place.
    pub fn add_scope(&mut self, scope: ServicesScope) {
        match self.scopes.iter_mut().find(|s| s.name == scope.name) {
            Some(existing) => {
                warn!("Scope '{}' registered twice, keeping the last one", scope.name);
                *existing = scope;
            }
            None => self.scopes.push(scope),
        }
    }

    pub fn scopes(&self) -> &[ServicesScope] {
        &self.scopes
    }

    pub fn resolve_names(&mut self) -> Result<(), Error> {
        for scope in self.scopes.iter_mut() {
            scope.rename(&self.ignored_services)?;
            debug!("Names of scope '{}': {:?}", scope.name, scope.name_map());
        }
        Ok(())
    }

    pub fn resolve_paths(&mut self, output_dir: &Path) {
        for scope in self.scopes.iter_mut() {
            scope.rebase_paths(output_dir);
        }
    }

    /// Threads one busy-port list through every scope in registration order.
    ///
    /// `reserved` ports are taken before the first scope is visited.
    pub fn resolve_ports(&mut self, reserved: Vec<u16>) -> Result<ScopeRedefinitions, Error> {
        let mut busy_ports = reserved;
        let mut redefinitions = ScopeRedefinitions::new();

        for scope in self.scopes.iter_mut() {
            let (busy, scope_redefinitions) = scope.resolve_ports(busy_ports)?;
            busy_ports = busy;
            redefinitions.extend(scope_redefinitions);
        }

        Ok(redefinitions)
    }

    /// `overrides` is keyed by final service name.
    pub fn apply_overrides(&mut self, overrides: &Mapping) {
        let mut applied = vec![];
        for scope in self.scopes.iter_mut() {
            applied.extend(scope.apply_overrides(overrides));
        }

        for name in overrides.keys() {
            match name {
                Value::String(name) if applied.contains(name) => {}
                Value::String(name) => warn!("Overrides given for unknown service '{}'", name),
                other => warn!("Overrides given for unknown service {:?}", other),
            }
        }
    }

    pub fn get_result_scope(&self) -> Mapping {
        let mut services_definitions = Mapping::new();
        for scope in self.scopes.iter() {
            services_definitions.extend(scope.exported_definitions());
        }
        services_definitions
    }
}
