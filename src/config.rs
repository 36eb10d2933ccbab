use crate::errors::{FlacVaultError, Result};
use crate::model::QualityTier;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// System roots a naming-engine output directory may never resolve into (§6).
const FORBIDDEN_ROOTS: &[&str] = &["/etc", "/root", "/proc", "/sys", "/bin", "/sbin", "/usr/bin", "/dev", "/boot"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LyricsEmbedMode {
    Embed,
    Lrc,
    Both,
}

impl Default for LyricsEmbedMode {
    fn default() -> Self {
        LyricsEmbedMode::Lrc
    }
}

/// `namingTemplate` may be a preset alias or a raw placeholder template (§4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NamingTemplate {
    Preset(NamingPreset),
    Custom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingPreset {
    Jellyfin,
    Plex,
    Flat,
    Album,
    Year,
}

impl NamingPreset {
    pub fn template(self) -> &'static str {
        match self {
            NamingPreset::Jellyfin => "{artist}/{title}/{title}",
            NamingPreset::Plex => "{artist}/{title}",
            NamingPreset::Flat => "{artist} - {title}",
            NamingPreset::Album => "{artist}/{album}/{title}",
            NamingPreset::Year => "{year}/{artist} - {title}",
        }
    }
}

impl NamingTemplate {
    pub fn resolve(&self) -> String {
        match self {
            NamingTemplate::Preset(p) => p.template().to_string(),
            NamingTemplate::Custom(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub output_directory: PathBuf,
    pub video_quality: QualityTier,
    pub audio_source_priority: Vec<String>,
    pub naming_template: NamingTemplate,
    pub generate_nfo: bool,
    pub concurrent_downloads: u32,
    pub embed_cover_art: bool,
    pub theme: String,
    pub cookies_browser: Option<String>,
    pub lyrics_enabled: bool,
    pub lyrics_embed_mode: LyricsEmbedMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_directory: dirs::video_dir()
                .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join("Videos"))
                .join("flacvault"),
            video_quality: QualityTier::Best,
            audio_source_priority: vec!["tidal".into(), "qobuz".into(), "amazon".into(), "deezer".into()],
            naming_template: NamingTemplate::Preset(NamingPreset::Jellyfin),
            generate_nfo: true,
            concurrent_downloads: 2,
            embed_cover_art: true,
            theme: "auto".to_string(),
            cookies_browser: None,
            lyrics_enabled: true,
            lyrics_embed_mode: LyricsEmbedMode::Lrc,
        }
    }
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join("flacvault"))
            .ok_or_else(|| FlacVaultError::ConfigInvalid("could not locate config directory".to_string()))
    }

    pub fn json_settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn toml_settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn local_json_settings_path() -> Result<PathBuf> {
        Ok(std::env::current_dir()?.join("flacvault.json"))
    }

    /// Cascading load: local JSON -> config-dir JSON -> TOML -> defaults+save.
    /// Environment overrides (upper-snake-case of each field name) apply last.
    pub fn load() -> Result<Self> {
        let mut config = None;
        let mut loaded_from = None;

        if let Ok(path) = Self::local_json_settings_path() {
            if path.exists() {
                if let Ok(c) = Self::load_from_json(&path) {
                    loaded_from = Some(path);
                    config = Some(c);
                }
            }
        }

        if config.is_none() {
            if let Ok(path) = Self::json_settings_path() {
                if path.exists() {
                    if let Ok(c) = Self::load_from_json(&path) {
                        loaded_from = Some(path);
                        config = Some(c);
                    }
                }
            }
        }

        if config.is_none() {
            let toml_path = Self::toml_settings_path()?;
            if toml_path.exists() {
                let content = std::fs::read_to_string(&toml_path)?;
                config = Some(toml::from_str(&content)?);
                loaded_from = Some(toml_path);
            }
        }

        let mut config = match config {
            Some(c) => {
                if let Some(path) = &loaded_from {
                    crate::utils::logger::Logger::log_config_loaded(&path.display().to_string());
                }
                c
            }
            None => {
                let c = Self::default();
                c.save()?;
                c
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn load_from_json(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("OUTPUT_DIRECTORY") {
            self.output_directory = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VIDEO_QUALITY") {
            if let Ok(q) = v.parse() {
                self.video_quality = q;
            }
        }
        if let Ok(v) = std::env::var("AUDIO_SOURCE_PRIORITY") {
            self.audio_source_priority = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = std::env::var("NAMING_TEMPLATE") {
            self.naming_template = NamingTemplate::Custom(v);
        }
        if let Ok(v) = std::env::var("GENERATE_NFO") {
            self.generate_nfo = parse_bool(&v, self.generate_nfo);
        }
        if let Ok(v) = std::env::var("CONCURRENT_DOWNLOADS") {
            if let Ok(n) = v.parse() {
                self.concurrent_downloads = n;
            }
        }
        if let Ok(v) = std::env::var("EMBED_COVER_ART") {
            self.embed_cover_art = parse_bool(&v, self.embed_cover_art);
        }
        if let Ok(v) = std::env::var("THEME") {
            self.theme = v;
        }
        if let Ok(v) = std::env::var("COOKIES_BROWSER") {
            self.cookies_browser = Some(v);
        }
        if let Ok(v) = std::env::var("LYRICS_ENABLED") {
            self.lyrics_enabled = parse_bool(&v, self.lyrics_enabled);
        }
        if let Ok(v) = std::env::var("LYRICS_EMBED_MODE") {
            self.lyrics_embed_mode = match v.as_str() {
                "embed" => LyricsEmbedMode::Embed,
                "both" => LyricsEmbedMode::Both,
                _ => LyricsEmbedMode::Lrc,
            };
        }
    }

    pub fn validate(&self) -> Result<()> {
        let canon = self.output_directory.to_string_lossy().to_string();
        if FORBIDDEN_ROOTS.iter().any(|root| canon == *root || canon.starts_with(&format!("{root}/"))) {
            return Err(FlacVaultError::ConfigInvalid(format!(
                "output directory {canon} resolves under a forbidden system root"
            )));
        }
        if self.concurrent_downloads == 0 {
            return Err(FlacVaultError::ConfigInvalid("concurrentDownloads must be >= 1".to_string()));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.validate()?;
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;

        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(Self::toml_settings_path()?, toml_content)?;

        let json_content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::json_settings_path()?, &json_content)?;

        if let Ok(local_path) = Self::local_json_settings_path() {
            let _ = std::fs::write(local_path, &json_content);
        }

        crate::utils::logger::Logger::log_config_saved(&Self::toml_settings_path()?.display().to_string());
        Ok(())
    }

    pub fn ensure_output_directory(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_directory)?;
        Ok(())
    }
}

fn parse_bool(v: &str, default: bool) -> bool {
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_root_rejected() {
        let mut c = Config::default();
        c.output_directory = PathBuf::from("/etc/flacvault");
        assert!(c.validate().is_err());
    }

    #[test]
    fn naming_preset_resolves() {
        assert_eq!(NamingPreset::Jellyfin.template(), "{artist}/{title}/{title}");
    }
}
