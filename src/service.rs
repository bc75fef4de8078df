use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::binding_from_str::{PortBinding, VolumeBinding};
use crate::errors::*;
use crate::utils::{is_relative_path, rebase_path};

/// Original service name -> prefixed service name, local to one scope.
pub type NameMap = BTreeMap<String, String>;

/// Requested host port -> host port actually assigned.
pub type PortRedefinitions = BTreeMap<u16, u16>;

pub type IgnoreSet = BTreeSet<String>;

/// Everything a service needs to rewrite its references to siblings.
pub struct RenameContext<'a> {
    pub scope: &'a str,
    pub new_name: &'a str,
    pub names: &'a NameMap,
    /// Globally ignored names; the `extends` cascade is checked against these.
    pub ignored: &'a IgnoreSet,
    /// Names that will be absent from the result: the global set plus this scope's cascade.
    pub excluded: &'a IgnoreSet,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub definition: Mapping,
    pub ignored: bool,
}

/// YAML truthiness: null, false, zero and empty values are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(_) => true,
    }
}

fn claim_port(requested: u16, busy_ports: &mut Vec<u16>) -> Result<u16, Error> {
    let mut port = requested;
    while busy_ports.contains(&port) {
        port = port
            .checked_add(1)
            .ok_or(Error::PortsExhausted(requested))?;
    }
    busy_ports.push(port);
    Ok(port)
}

/// Bind sources stay recognisable as paths: `./` is kept unless the result climbs out.
fn rebase_bind_source(offset: &Path, source: &str) -> String {
    let rebased = rebase_path(offset, source);
    if rebased.starts_with("..") || rebased == "." {
        rebased
    } else {
        format!("./{}", rebased)
    }
}

fn invalid_port(err: anyhow::Error) -> Error {
    Error::InvalidPort(err.to_string())
}

fn published_port(value: &Value) -> Result<Option<u16>, Error> {
    let port = match value {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) if s.is_empty() => return Ok(None),
        Value::String(s) => s.parse::<u16>().ok(),
        _ => None,
    };

    port.map(Some)
        .ok_or_else(|| Error::InvalidPort(format!("published: {:?}", value)))
}

impl Service {
    pub fn new(name: impl Into<String>, definition: Mapping) -> Self {
        Service {
            name: name.into(),
            definition,
            ignored: false,
        }
    }

    pub fn get_definition(&self) -> &Mapping {
        &self.definition
    }

    /// Returns the field when it holds a truthy value; a falsy field is dropped.
    fn take_truthy(&mut self, key: &str) -> Option<Value> {
        let value = self.definition.get(key)?;
        if is_truthy(value) {
            return Some(value.clone());
        }
        self.definition.shift_remove(key);
        None
    }

    fn set(&mut self, key: &str, value: Value) {
        self.definition.insert(Value::from(key), value);
    }

    fn lookup<'n>(
        &self,
        ctx: &RenameContext<'n>,
        field: &'static str,
        reference: &str,
    ) -> Result<&'n String, Error> {
        ctx.names
            .get(reference)
            .ok_or_else(|| Error::UnresolvedReference {
                scope: ctx.scope.to_string(),
                service: self.name.clone(),
                field,
                reference: reference.to_string(),
            })
    }

    /// Rewrites every reference this service makes to services of its own scope.
    pub fn resolve_references(&mut self, ctx: &RenameContext) -> Result<(), Error> {
        self.rename_container(ctx.new_name);
        self.rename_volumes_from(ctx)?;
        self.rename_links(ctx)?;
        self.rename_extends(ctx)?;
        Ok(())
    }

    pub fn rename_container(&mut self, new_name: &str) {
        if self.take_truthy("container_name").is_some() {
            self.set("container_name", Value::from(new_name));
        }
    }

    pub fn rename_volumes_from(&mut self, ctx: &RenameContext) -> Result<(), Error> {
        let entries = match self.take_truthy("volumes_from") {
            Some(Value::Sequence(entries)) => entries,
            _ => return Ok(()),
        };

        let mut renamed = Vec::with_capacity(entries.len());
        for entry in entries {
            let raw = match entry.as_str() {
                Some(raw) if !raw.starts_with("container:") => raw,
                _ => {
                    renamed.push(entry);
                    continue;
                }
            };

            let (source, mode) = match raw.split_once(':') {
                Some((source, mode)) => (source, Some(mode)),
                None => (raw, None),
            };

            let new_source = self.lookup(ctx, "volumes_from", source)?;
            if ctx.excluded.contains(new_source) {
                debug!("{}: dropping volumes_from {}", self.name, new_source);
                continue;
            }

            renamed.push(Value::String(match mode {
                Some(mode) => format!("{}:{}", new_source, mode),
                None => new_source.clone(),
            }));
        }

        if renamed.is_empty() {
            self.definition.shift_remove("volumes_from");
        } else {
            self.set("volumes_from", Value::Sequence(renamed));
        }

        Ok(())
    }

    pub fn rename_links(&mut self, ctx: &RenameContext) -> Result<(), Error> {
        let entries = match self.take_truthy("links") {
            Some(Value::Sequence(entries)) => entries,
            _ => return Ok(()),
        };

        let mut renamed = Vec::with_capacity(entries.len());
        for entry in entries {
            let raw = match entry.as_str() {
                Some(raw) => raw,
                None => {
                    renamed.push(entry);
                    continue;
                }
            };

            let (target, alias) = raw.split_once(':').unwrap_or((raw, raw));

            let new_target = self.lookup(ctx, "links", target)?;
            if ctx.excluded.contains(new_target) {
                debug!("{}: dropping link to {}", self.name, new_target);
                continue;
            }

            renamed.push(Value::String(format!("{}:{}", new_target, alias)));
        }

        if renamed.is_empty() {
            self.definition.shift_remove("links");
        } else {
            self.set("links", Value::Sequence(renamed));
        }

        Ok(())
    }

    /// Same-file `extends` target, if any.
    pub fn extends_service(&self) -> Option<&str> {
        let extends = match self.definition.get("extends") {
            Some(Value::Mapping(extends)) => extends,
            _ => return None,
        };

        if extends.get("file").map(is_truthy).unwrap_or(false) {
            return None;
        }

        extends.get("service").and_then(Value::as_str)
    }

    /// Extending an ignored service ignores this one too (one hop only).
    pub fn rename_extends(&mut self, ctx: &RenameContext) -> Result<(), Error> {
        let mut extends = match self.take_truthy("extends") {
            Some(Value::Mapping(extends)) => extends,
            _ => return Ok(()),
        };

        if extends.get("file").map(is_truthy).unwrap_or(false) {
            return Ok(());
        }

        let target = match extends.get("service").and_then(Value::as_str) {
            Some(target) => target.to_string(),
            None => return Ok(()),
        };

        let new_target = self.lookup(ctx, "extends", &target)?.clone();
        if ctx.ignored.contains(&new_target) {
            debug!("{}: extends ignored service {}", self.name, new_target);
            self.definition.shift_remove("extends");
            self.ignored = true;
            return Ok(());
        }

        extends.insert(Value::from("service"), Value::String(new_target));
        self.set("extends", Value::Mapping(extends));
        Ok(())
    }

    /// Rebases every relative filesystem path by `offset`.
    pub fn rebase_paths(&mut self, offset: &Path) {
        self.rebase_build(offset);
        self.rebase_volumes(offset);
        self.rebase_env_file(offset);
        self.rebase_extends_file(offset);
    }

    pub fn rebase_build(&mut self, offset: &Path) {
        match self.take_truthy("build") {
            Some(Value::String(path)) if is_relative_path(&path) => {
                self.set("build", Value::String(rebase_path(offset, &path)));
            }
            Some(Value::Mapping(mut build)) => {
                let rebased = match build.get("context") {
                    Some(Value::String(context)) if is_relative_path(context) => {
                        rebase_path(offset, context)
                    }
                    _ => return,
                };
                build.insert(Value::from("context"), Value::String(rebased));
                self.set("build", Value::Mapping(build));
            }
            _ => {}
        }
    }

    pub fn rebase_volumes(&mut self, offset: &Path) {
        let mut volumes = match self.take_truthy("volumes") {
            Some(Value::Sequence(volumes)) => volumes,
            _ => return,
        };

        for entry in volumes.iter_mut() {
            match entry {
                Value::String(raw) => {
                    let mut binding: VolumeBinding = match raw.parse() {
                        Ok(binding) => binding,
                        Err(err) => {
                            warn!("{}: leaving volume untouched: {}", self.name, err);
                            continue;
                        }
                    };

                    let host = match binding.host.as_deref() {
                        Some(host) if is_relative_path(host) && !binding.is_named() => host,
                        _ => continue,
                    };

                    let rebased = rebase_bind_source(offset, host);
                    binding.host = Some(rebased);
                    *raw = binding.to_string();
                }
                Value::Mapping(long) => {
                    if long.get("type").and_then(Value::as_str) != Some("bind") {
                        continue;
                    }

                    let rebased = match long.get("source") {
                        Some(Value::String(source)) if is_relative_path(source) => {
                            rebase_bind_source(offset, source)
                        }
                        _ => continue,
                    };
                    long.insert(Value::from("source"), Value::String(rebased));
                }
                _ => {}
            }
        }

        self.set("volumes", Value::Sequence(volumes));
    }

    pub fn rebase_env_file(&mut self, offset: &Path) {
        let files = match self.take_truthy("env_file") {
            Some(Value::Sequence(files)) => files,
            Some(file) => vec![file],
            None => return,
        };

        let rebased = files
            .into_iter()
            .map(|file| match file {
                Value::String(path) if is_relative_path(&path) => {
                    Value::String(rebase_path(offset, &path))
                }
                other => other,
            })
            .collect();

        self.set("env_file", Value::Sequence(rebased));
    }

    pub fn rebase_extends_file(&mut self, offset: &Path) {
        let extends = match self.definition.get_mut("extends") {
            Some(Value::Mapping(extends)) => extends,
            _ => return,
        };

        if let Some(Value::String(file)) = extends.get_mut("file") {
            if !file.is_empty() && is_relative_path(file) {
                *file = rebase_path(offset, file);
            }
        }
    }

    /// Host ports this service publishes, as written.
    pub fn host_ports(&self) -> Result<Vec<u16>, Error> {
        let ports = match self.definition.get("ports") {
            Some(Value::Sequence(ports)) => ports,
            _ => return Ok(vec![]),
        };

        let mut host_ports = vec![];
        for entry in ports {
            let port = match entry {
                Value::String(raw) => raw.parse::<PortBinding>().map_err(invalid_port)?.host_port,
                Value::Mapping(long) => match long.get("published") {
                    Some(published) => published_port(published)?,
                    None => None,
                },
                _ => None,
            };
            host_ports.extend(port);
        }

        Ok(host_ports)
    }

    /// Claims a host port for every published binding, bumping the ones already taken.
    pub fn resolve_ports(&mut self, busy_ports: &mut Vec<u16>) -> Result<PortRedefinitions, Error> {
        let mut redefinitions = PortRedefinitions::new();

        let ports = match self.definition.get_mut("ports") {
            Some(Value::Sequence(ports)) => ports,
            _ => return Ok(redefinitions),
        };

        for entry in ports.iter_mut() {
            match entry {
                Value::String(raw) => {
                    let mut binding: PortBinding = raw.parse().map_err(invalid_port)?;
                    let requested = match binding.host_port {
                        Some(port) => port,
                        None => continue,
                    };

                    let port = claim_port(requested, busy_ports)?;
                    if port != requested {
                        redefinitions.insert(requested, port);
                        binding.host_port = Some(port);
                        *raw = binding.to_string();
                    }
                }
                Value::Mapping(long) => {
                    let published = match long.get("published") {
                        Some(value) => value,
                        None => continue,
                    };
                    let requested = match published_port(published)? {
                        Some(port) => port,
                        None => continue,
                    };

                    let port = claim_port(requested, busy_ports)?;
                    if port != requested {
                        redefinitions.insert(requested, port);
                        let value = match published {
                            Value::String(_) => Value::String(port.to_string()),
                            _ => Value::from(port),
                        };
                        long.insert(Value::from("published"), value);
                    }
                }
                _ => {}
            }
        }

        Ok(redefinitions)
    }

    /// Shallow merge: each top-level field is replaced as a whole.
    pub fn apply_overrides(&mut self, overrides: &Mapping) {
        for (key, value) in overrides {
            self.definition.insert(key.clone(), value.clone());
        }
    }
}
