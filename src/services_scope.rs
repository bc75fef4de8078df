use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::errors::*;
use crate::service::*;
use crate::utils::{absolute_path, relative_path};

/// Port redefinitions of every service, keyed by final service name.
pub type ScopeRedefinitions = BTreeMap<String, PortRedefinitions>;

/// Services loaded from one file, namespaced by `name`.
pub struct ServicesScope {
    pub name: String,
    pub services: Vec<Service>,
    pub source_path: PathBuf,

    name_map: Option<NameMap>,
}

pub fn exported_name(prefix: &str, service: &str) -> String {
    format!("{}{}", prefix, service)
}

impl ServicesScope {
    pub fn new(name: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        ServicesScope {
            name: name.into(),
            services: vec![],
            source_path: source_path.into(),
            name_map: None,
        }
    }

    pub async fn load(name: &str, source: &Path) -> Result<Self, Error> {
        let source_path = absolute_path(source)?;

        debug!("Loading services file: {}", source_path.display());
        if !source_path.exists() {
            return Err(Error::SourceNotFound(source_path));
        }

        let contents = fs::read_to_string(&source_path)
            .await
            .map_err(|err| Error::io(&source_path, err))?;

        Self::parse(name, source_path, &contents)
    }

    pub fn parse(name: &str, source_path: PathBuf, contents: &str) -> Result<Self, Error> {
        let document: Value =
            serde_yaml::from_str(contents).map_err(|err| Error::parse(&source_path, err))?;

        match document {
            Value::Null => Ok(Self::new(name, source_path)),
            Value::Mapping(services) => Self::from_mapping(name, source_path, services),
            _ => Err(Error::parse(
                &source_path,
                "expected a mapping of service names to definitions",
            )),
        }
    }

    pub fn from_mapping(
        name: &str,
        source_path: PathBuf,
        services: Mapping,
    ) -> Result<Self, Error> {
        let mut scope = Self::new(name, source_path);

        for (service_name, definition) in services {
            let service_name = match service_name {
                Value::String(s) => s,
                other => {
                    return Err(Error::InvalidService {
                        scope: name.to_string(),
                        service: format!("{:?}", other),
                    })
                }
            };

            let definition = match definition {
                Value::Null => Mapping::new(),
                Value::Mapping(definition) => definition,
                _ => {
                    return Err(Error::InvalidService {
                        scope: name.to_string(),
                        service: service_name,
                    })
                }
            };

            scope.services.push(Service::new(service_name, definition));
        }

        Ok(scope)
    }

    pub fn source_dir(&self) -> &Path {
        self.source_path.parent().unwrap_or_else(|| Path::new("/"))
    }

    pub fn name_map(&self) -> Option<&NameMap> {
        self.name_map.as_ref()
    }

    /// Prefixes every service and rewrites intra-scope references.
    ///
    /// All new names are collected before any reference is rewritten, so
    /// forward references within the file resolve. A second call is a no-op.
    pub fn rename(&mut self, ignored: &IgnoreSet) -> Result<(), Error> {
        if self.name_map.is_some() {
            return Ok(());
        }

        let mut names = NameMap::new();
        for service in self.services.iter_mut() {
            let new_name = exported_name(&self.name, &service.name);
            if ignored.contains(&new_name) {
                debug!("Ignoring service {}", new_name);
                service.ignored = true;
            }
            names.insert(service.name.clone(), new_name);
        }

        // One hop: only extending a globally ignored service cascades.
        let mut excluded = ignored.clone();
        for service in self.services.iter_mut() {
            let cascades = match service.extends_service().and_then(|t| names.get(t)) {
                Some(target) => ignored.contains(target),
                None => false,
            };
            if cascades {
                let new_name = exported_name(&self.name, &service.name);
                debug!("Ignoring service {} through extends", new_name);
                service.ignored = true;
                excluded.insert(new_name);
            }
        }

        for service in self.services.iter_mut() {
            let new_name = exported_name(&self.name, &service.name);
            let ctx = RenameContext {
                scope: &self.name,
                new_name: &new_name,
                names: &names,
                ignored,
                excluded: &excluded,
            };
            service.resolve_references(&ctx)?;
        }

        self.name_map = Some(names);
        Ok(())
    }

    pub fn rebase_paths(&mut self, output_dir: &Path) {
        let offset = relative_path(output_dir, self.source_dir());
        debug!(
            "Rebasing paths of scope '{}' by {}",
            self.name,
            offset.display()
        );

        for service in self.services.iter_mut() {
            service.rebase_paths(&offset);
        }
    }

    /// Host ports published by the services that reach the result.
    pub fn host_ports(&self) -> Result<Vec<u16>, Error> {
        let mut host_ports = vec![];
        for service in self.services.iter().filter(|s| !s.ignored) {
            host_ports.extend(service.host_ports()?);
        }
        Ok(host_ports)
    }

    pub fn resolve_ports(
        &mut self,
        busy_ports: Vec<u16>,
    ) -> Result<(Vec<u16>, ScopeRedefinitions), Error> {
        let mut busy_ports = busy_ports;
        let mut redefinitions = ScopeRedefinitions::new();

        for service in self.services.iter_mut().filter(|s| !s.ignored) {
            let service_redefinitions = service.resolve_ports(&mut busy_ports)?;
            if !service_redefinitions.is_empty() {
                redefinitions.insert(
                    exported_name(&self.name, &service.name),
                    service_redefinitions,
                );
            }
        }

        Ok((busy_ports, redefinitions))
    }

    /// Returns the final names of the services that received overrides.
    pub fn apply_overrides(&mut self, overrides: &Mapping) -> Vec<String> {
        let mut applied = vec![];

        for service in self.services.iter_mut() {
            let name = exported_name(&self.name, &service.name);
            if let Some(Value::Mapping(fields)) = overrides.get(name.as_str()) {
                debug!("Applying overrides to {}", name);
                service.apply_overrides(fields);
                applied.push(name);
            }
        }

        applied
    }

    pub fn exported_definitions(&self) -> Mapping {
        self.services
            .iter()
            .filter(|s| !s.ignored)
            .map(|s| {
                (
                    Value::String(exported_name(&self.name, &s.name)),
                    Value::Mapping(s.get_definition().clone()),
                )
            })
            .collect()
    }
}
