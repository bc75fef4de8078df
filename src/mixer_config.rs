use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::*;

/// The `docker-compose-mixer.yml` manifest.
#[derive(Deserialize, Default, Debug)]
pub struct MixerConfig {
    pub includes: Option<Includes>,

    pub ignores: Option<Vec<String>>,

    pub master_services: Option<Mapping>,

    pub overrides: Option<Mapping>,
}

/// Prefix -> services file, in the order written in the manifest.
#[derive(Debug, Default, PartialEq)]
pub struct Includes(pub Vec<(String, PathBuf)>);

struct IncludesVisitor;

impl<'de> Visitor<'de> for IncludesVisitor {
    type Value = Includes;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping of prefixes to services files")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = vec![];
        while let Some((prefix, file)) = map.next_entry::<String, String>()? {
            entries.push((prefix, PathBuf::from(file)));
        }
        Ok(Includes(entries))
    }
}

impl<'de> Deserialize<'de> for Includes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(IncludesVisitor)
    }
}

impl MixerConfig {
    pub fn parse(path: &Path, contents: &str) -> Result<Self, Error> {
        let document: Value = serde_yaml::from_str(contents).map_err(|err| Error::parse(path, err))?;

        if document.is_null() {
            return Ok(MixerConfig::default());
        }

        serde_yaml::from_value(document).map_err(|err| Error::parse(path, err))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if let Some(includes) = self.includes.as_ref() {
            for (prefix, file) in includes.0.iter() {
                if file.as_os_str().is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "Empty services file for prefix '{}'",
                        prefix
                    )));
                }
            }
        }

        if let Some(services) = self.master_services.as_ref() {
            for (name, definition) in services {
                if !name.is_string() || !(definition.is_mapping() || definition.is_null()) {
                    return Err(Error::InvalidConfig(format!(
                        "Invalid master service: {:?}",
                        name
                    )));
                }
            }
        }

        if let Some(overrides) = self.overrides.as_ref() {
            for (name, fields) in overrides {
                if !fields.is_mapping() {
                    return Err(Error::InvalidConfig(format!(
                        "Overrides for {:?} must be a mapping of fields",
                        name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Include entries with relative files resolved against `base_dir`.
    pub fn get_includes(&self, base_dir: &Path) -> Vec<(String, PathBuf)> {
        self.includes
            .iter()
            .flat_map(|includes| includes.0.iter())
            .map(|(prefix, file)| {
                let file = if file.is_absolute() {
                    file.clone()
                } else {
                    base_dir.join(file)
                };
                (prefix.clone(), file)
            })
            .collect()
    }

    pub fn get_ignores(&self) -> Vec<String> {
        self.ignores.clone().unwrap_or_default()
    }
}
