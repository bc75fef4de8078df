use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};

/// `[host_ip:][host_port:]container_port` entry of a `ports` list.
#[derive(Debug, Clone, PartialEq)]
pub struct PortBinding {
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
    pub container: String,
}

/// `[host:]container[:mode]` entry of a `volumes` list.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeBinding {
    pub host: Option<String>,
    pub container: String,
    pub mode: Option<String>,
}

fn parse_host_port(s: &str, raw: &str) -> Result<Option<u16>> {
    if s.is_empty() {
        return Ok(None);
    }

    s.parse::<u16>()
        .map(Some)
        .map_err(|err| anyhow!("Invalid host port '{}' in '{}': {}", s, raw, err))
}

impl FromStr for PortBinding {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();

        let binding = match parts.as_slice() {
            [container] => PortBinding {
                host_ip: None,
                host_port: None,
                container: container.to_string(),
            },
            [host, container] => PortBinding {
                host_ip: None,
                host_port: parse_host_port(host, s)?,
                container: container.to_string(),
            },
            [ip, host, container] => PortBinding {
                host_ip: Some(ip.to_string()),
                host_port: parse_host_port(host, s)?,
                container: container.to_string(),
            },
            _ => bail!("Invalid port binding: {}", s),
        };

        if binding.container.is_empty() {
            bail!("Missing container port in: {}", s);
        }

        Ok(binding)
    }
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host_port = self.host_port.map(|p| p.to_string()).unwrap_or_default();
        match (&self.host_ip, self.host_port) {
            (Some(ip), _) => write!(f, "{}:{}:{}", ip, host_port, self.container),
            (None, Some(_)) => write!(f, "{}:{}", host_port, self.container),
            (None, None) => write!(f, "{}", self.container),
        }
    }
}

impl FromStr for VolumeBinding {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();

        let binding = match parts.as_slice() {
            [container] => VolumeBinding {
                host: None,
                container: container.to_string(),
                mode: None,
            },
            [host, container] => VolumeBinding {
                host: Some(host.to_string()),
                container: container.to_string(),
                mode: None,
            },
            [host, container, mode] => VolumeBinding {
                host: Some(host.to_string()),
                container: container.to_string(),
                mode: Some(mode.to_string()),
            },
            _ => bail!("Invalid volume: {}", s),
        };

        if binding.container.is_empty() {
            bail!("Missing container path in volume: {}", s);
        }

        Ok(binding)
    }
}

impl VolumeBinding {
    /// Named volumes (`data:/var/lib/data`) are not filesystem paths.
    pub fn is_named(&self) -> bool {
        match self.host.as_deref() {
            None => false,
            Some(host) => !host.starts_with('.') && !host.starts_with('~') && !host.contains('/'),
        }
    }
}

impl fmt::Display for VolumeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = self.host.as_ref() {
            write!(f, "{}:", host)?;
        }
        write!(f, "{}", self.container)?;
        if let Some(mode) = self.mode.as_ref() {
            write!(f, ":{}", mode)?;
        }
        Ok(())
    }
}
