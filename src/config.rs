use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;

use crate::pump::{SessionConfig, DEFAULT_SENSITIVITY, DEFAULT_SOURCE, DEFAULT_TARGET_FPS};
use crate::zones::{parse_zone_list, Rect, ZoneSet};

pub const MIN_SENSITIVITY: u32 = 50;
pub const MAX_SENSITIVITY: u32 = 5000;

const DEFAULT_RTSP_PORT: u16 = 554;
const DEFAULT_STREAM_PATH: &str = "/stream1";

#[derive(Debug, Deserialize, Default)]
struct VigildConfigFile {
    source: Option<SourceConfigFile>,
    motion: Option<MotionConfigFile>,
    zones: Option<ZoneConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    stream_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    sensitivity: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ZoneConfigFile {
    detection: Option<String>,
    ignore: Option<String>,
}

/// Where the frames come from.
///
/// Both representations resolve to a single canonical address string before
/// the pump ever sees them; the pump never inspects structured parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// A fully formed address. `0` and `1` select local device indexes.
    Direct(String),
    /// Structured camera parameters assembled into an `rtsp://` address.
    Params {
        host: String,
        port: u16,
        username: String,
        password: String,
        path: String,
    },
}

impl ConnectionTarget {
    /// Resolve to the canonical address string, validating on the way.
    pub fn resolve(&self) -> Result<String> {
        match self {
            ConnectionTarget::Direct(url) => {
                let url = url.trim();
                if url.is_empty() || url == "0" || url == "1" {
                    return Ok(if url == "1" { "1" } else { "0" }.to_string());
                }
                if url.starts_with("http://")
                    || url.starts_with("https://")
                    || url.starts_with("rtsp://")
                    || url.starts_with("stub://")
                {
                    return Ok(url.to_string());
                }
                Err(anyhow!(
                    "source URL must be a device index or start with http://, https://, rtsp://, or stub://"
                ))
            }
            ConnectionTarget::Params {
                host,
                port,
                username,
                password,
                path,
            } => {
                let host = host.trim();
                if host.is_empty() {
                    return Err(anyhow!("camera host must not be empty"));
                }
                host.parse::<IpAddr>()
                    .map_err(|_| anyhow!("camera host '{}' is not a valid IP address", host))?;
                if *port == 0 {
                    return Err(anyhow!("camera port must not be zero"));
                }
                if !path.starts_with('/') {
                    return Err(anyhow!("stream path must start with '/'"));
                }
                let userinfo = if username.is_empty() && password.is_empty() {
                    String::new()
                } else {
                    format!("{}:{}@", username, password)
                };
                Ok(format!("rtsp://{}{}:{}{}", userinfo, host, port, path))
            }
        }
    }
}

/// Daemon configuration: connection target, motion parameters, and zones.
///
/// Loaded from an optional JSON file, then overridden from the environment,
/// then validated. A [`SessionConfig`] snapshot is taken from this at each
/// session start.
#[derive(Clone, Debug)]
pub struct VigildConfig {
    pub target: ConnectionTarget,
    pub sensitivity: u32,
    pub target_fps: u32,
    pub detection_zones: Vec<Rect>,
    pub ignore_zones: Vec<Rect>,
}

impl VigildConfig {
    /// Load from `path`, falling back to the `VIGIL_CONFIG` environment
    /// variable, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("VIGIL_CONFIG").ok();
        let path = path.or_else(|| env_path.as_deref().map(Path::new));
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: VigildConfigFile) -> Result<Self> {
        let source = file.source.unwrap_or_default();
        let target = if let Some(host) = source.host {
            ConnectionTarget::Params {
                host,
                port: source.port.unwrap_or(DEFAULT_RTSP_PORT),
                username: source.username.unwrap_or_default(),
                password: source.password.unwrap_or_default(),
                path: source
                    .stream_path
                    .unwrap_or_else(|| DEFAULT_STREAM_PATH.to_string()),
            }
        } else {
            ConnectionTarget::Direct(source.url.unwrap_or_else(|| DEFAULT_SOURCE.to_string()))
        };

        let motion = file.motion.unwrap_or_default();
        let zones = file.zones.unwrap_or_default();
        Ok(Self {
            target,
            sensitivity: motion.sensitivity.unwrap_or(DEFAULT_SENSITIVITY),
            target_fps: motion.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            detection_zones: parse_zone_list(zones.detection.as_deref().unwrap_or(""))?,
            ignore_zones: parse_zone_list(zones.ignore.as_deref().unwrap_or(""))?,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("VIGIL_SOURCE") {
            if !url.trim().is_empty() {
                self.target = ConnectionTarget::Direct(url);
            }
        }
        if let Ok(sensitivity) = std::env::var("VIGIL_SENSITIVITY") {
            self.sensitivity = sensitivity
                .parse()
                .map_err(|_| anyhow!("VIGIL_SENSITIVITY must be an integer"))?;
        }
        if let Ok(fps) = std::env::var("VIGIL_TARGET_FPS") {
            self.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("VIGIL_TARGET_FPS must be an integer"))?;
        }
        if let Ok(zones) = std::env::var("VIGIL_DETECTION_ZONES") {
            self.detection_zones = parse_zone_list(&zones)?;
        }
        if let Ok(zones) = std::env::var("VIGIL_IGNORE_ZONES") {
            self.ignore_zones = parse_zone_list(&zones)?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !(MIN_SENSITIVITY..=MAX_SENSITIVITY).contains(&self.sensitivity) {
            return Err(anyhow!(
                "sensitivity {} is outside [{}, {}]",
                self.sensitivity,
                MIN_SENSITIVITY,
                MAX_SENSITIVITY
            ));
        }
        if self.target_fps == 0 {
            return Err(anyhow!("target_fps must be greater than zero"));
        }
        // Resolve eagerly so a bad target fails at load, not at start.
        self.target.resolve()?;
        Ok(())
    }

    /// Take the immutable per-session snapshot.
    pub fn session(&self) -> Result<SessionConfig> {
        Ok(SessionConfig {
            source: self.target.resolve()?,
            sensitivity: self.sensitivity,
            target_fps: self.target_fps,
            zones: ZoneSet::new(self.detection_zones.clone(), self.ignore_zones.clone()),
        })
    }
}

fn read_config_file(path: &Path) -> Result<VigildConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
