use serde_yaml::Mapping;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::*;
use crate::mixer_config::*;
use crate::scopes_container::ScopesContainer;
use crate::services_scope::{ScopeRedefinitions, ServicesScope};
use crate::utils::absolute_path;

pub const MIXER_FILE: &str = "docker-compose-mixer.yml";
pub const OUTPUT_FILE: &str = "docker-compose.yml";

#[derive(Default)]
pub struct MixerOpts {
    pub input_file: Option<PathBuf>,
    /// `-` writes to stdout.
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    File(PathBuf),
    Stdout,
}

impl Destination {
    /// Path reported in errors about the output.
    pub fn path(&self) -> PathBuf {
        match self {
            Destination::File(path) => path.clone(),
            Destination::Stdout => PathBuf::from("<stdout>"),
        }
    }
}

#[derive(Debug)]
pub enum MixOutcome {
    /// The manifest has no `includes`, nothing was written.
    Skipped,
    Saved {
        destination: Destination,
        services: usize,
        redefinitions: ScopeRedefinitions,
    },
}

/// Result of the in-memory passes, before serialization.
pub struct Composed {
    pub services: Mapping,
    pub redefinitions: ScopeRedefinitions,
}

pub struct Mixer {
    pub input_file: PathBuf,
    pub destination: Destination,

    pub config: Option<MixerConfig>,
}

impl Mixer {
    pub fn new(opts: MixerOpts) -> Result<Self, Error> {
        let input_file = absolute_path(
            &opts
                .input_file
                .unwrap_or_else(|| PathBuf::from(MIXER_FILE)),
        )?;

        let destination = match opts.output_file {
            Some(file) if file.as_os_str() == "-" => Destination::Stdout,
            Some(file) => Destination::File(absolute_path(&file)?),
            None => Destination::File(absolute_path(Path::new(OUTPUT_FILE))?),
        };

        Ok(Mixer {
            input_file,
            destination,
            config: None,
        })
    }

    pub fn work_dir(&self) -> &Path {
        self.input_file.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Directory every relative path in the result is relative to.
    pub fn output_dir(&self) -> Result<PathBuf, Error> {
        match &self.destination {
            Destination::File(file) => Ok(file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("/"))),
            Destination::Stdout => absolute_path(Path::new(".")),
        }
    }

    pub async fn load(&mut self) -> Result<(), Error> {
        info!(
            "Start compiling docker-compose file in directory: {}",
            self.work_dir().display()
        );

        if !self.input_file.exists() {
            return Err(Error::ManifestNotFound(self.input_file.clone()));
        }

        let contents = fs::read_to_string(&self.input_file)
            .await
            .map_err(|err| Error::io(&self.input_file, err))?;

        let config = MixerConfig::parse(&self.input_file, &contents)?;
        config.validate()?;

        debug!("Mixer config is: {:?}", config);
        self.config = Some(config);

        Ok(())
    }

    async fn build_scopes(&self, config: &MixerConfig) -> Result<ScopesContainer, Error> {
        let mut container = ScopesContainer::new();
        container.reset();
        container.set_ignored(config.get_ignores());
        debug!("Ignored services: {:?}", container.ignored_services());

        for (prefix, file) in config.get_includes(self.work_dir()) {
            debug!(
                "Creating scope for file: {} and prefix: {}",
                file.display(),
                prefix
            );
            let scope = ServicesScope::load(&prefix, &file).await?;
            container.add_scope(scope);
        }

        Ok(container)
    }

    /// Runs every pass; `None` when the manifest has no `includes`.
    pub async fn compose(&self) -> Result<Option<Composed>, Error> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("Mixer config is not loaded".to_string()))?;

        if config.includes.is_none() {
            warn!("No includes found in {}", self.input_file.display());
            return Ok(None);
        }

        let mut container = self.build_scopes(config).await?;
        debug!("{} scopes loaded", container.scopes().len());

        container.resolve_names()?;
        container.resolve_paths(&self.output_dir()?);

        // Master services keep their ports; included services are bumped around them.
        let master_scope = match config.master_services.as_ref() {
            Some(master_services) => Some(ServicesScope::from_mapping(
                "",
                self.input_file.clone(),
                master_services.clone(),
            )?),
            None => None,
        };
        let reserved = match master_scope.as_ref() {
            Some(scope) => scope.host_ports()?,
            None => vec![],
        };
        debug!("Host ports reserved by master services: {:?}", reserved);

        let redefinitions = container.resolve_ports(reserved)?;
        for (service, ports) in redefinitions.iter() {
            for (requested, assigned) in ports {
                warn!(
                    "Port redefined for {}: {} -> {}",
                    service, requested, assigned
                );
            }
        }

        if let Some(scope) = master_scope {
            debug!("Adding master services");
            container.add_scope(scope);
        }

        if let Some(overrides) = config.overrides.as_ref() {
            container.apply_overrides(overrides);
        }

        Ok(Some(Composed {
            services: container.get_result_scope(),
            redefinitions,
        }))
    }

    async fn save(&self, services: &Mapping) -> Result<(), Error> {
        let data = serde_yaml::to_string(services)
            .map_err(|err| Error::serialize(self.destination.path(), err))?;

        match &self.destination {
            Destination::File(path) => {
                info!("Save result scope in the file {}", path.display());
                let mut file = fs::File::create(path)
                    .await
                    .map_err(|err| Error::io(path, err))?;
                file.write_all(data.as_bytes())
                    .await
                    .map_err(|err| Error::io(path, err))?;
                file.flush().await.map_err(|err| Error::io(path, err))?;
            }
            Destination::Stdout => {
                let mut stdout = tokio::io::stdout();
                stdout
                    .write_all(data.as_bytes())
                    .await
                    .map_err(|err| Error::io(self.destination.path(), err))?;
                stdout
                    .flush()
                    .await
                    .map_err(|err| Error::io(self.destination.path(), err))?;
            }
        }

        Ok(())
    }

    pub async fn process(&mut self) -> Result<MixOutcome, Error> {
        self.load().await?;

        let composed = match self.compose().await? {
            Some(composed) => composed,
            None => return Ok(MixOutcome::Skipped),
        };

        debug!("Result scope is: {:?}", composed.services);
        self.save(&composed.services).await?;

        Ok(MixOutcome::Saved {
            destination: self.destination.clone(),
            services: composed.services.len(),
            redefinitions: composed.redefinitions,
        })
    }
}
