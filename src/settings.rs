use crate::config::Config;
use crate::errors::Result;

/// Thin wrapper around `Config` giving the rest of the crate a single owned
/// handle to load, mutate, and persist configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    config: Config,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Ok(Self { config: Config::load()? })
    }

    pub fn default() -> Self {
        Self { config: Config::default() }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn save(&self) -> Result<()> {
        self.config.save()
    }
}
