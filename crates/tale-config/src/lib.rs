//! Configuration management for tale.
//!
//! Parses `tale.toml` with serde and discovers it in the current directory
//! or any parent. [`CliSettings`] override file values after loading.
//!
//! ## Environment Variable Expansion
//!
//! Path values support `${VAR}` (error if unset) and `${VAR:-default}`:
//!
//! - `story.source_dir`
//! - `story.initial_state`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the passage source directory.
    pub source_dir: Option<PathBuf>,
    /// Override the initial state file.
    pub initial_state: Option<PathBuf>,
    /// Override indentation normalization.
    pub normalize_indentation: Option<bool>,
    /// Override the dispatch step budget.
    pub max_steps: Option<usize>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "tale.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rendering limits and switches.
    pub render: RenderConfig,
    /// Story configuration (paths are relative strings from TOML).
    story: StoryConfigRaw,

    /// Resolved story configuration (set after loading).
    #[serde(skip)]
    pub story_resolved: StoryConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Rendering configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Strip tab or multi-space indentation in front of directives.
    pub normalize_indentation: bool,
    /// Dispatch steps allowed per resolution pass.
    pub max_steps: usize,
    /// Watcher ticks allowed before pending changes are dropped.
    pub max_watch_ticks: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            normalize_indentation: true,
            max_steps: 100_000,
            max_watch_ticks: 64,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StoryConfigRaw {
    source_dir: Option<String>,
    initial_state: Option<String>,
}

/// Resolved story configuration with absolute paths.
#[derive(Debug, Default)]
pub struct StoryConfig {
    /// Directory holding passage files.
    pub source_dir: PathBuf,
    /// JSON file with the initial game data.
    pub initial_state: Option<PathBuf>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`story.source_dir`").
        field: String,
        /// Error message (e.g., "${`STORY_ROOT`} not set").
        message: String,
    },
}

fn require_non_zero(value: usize, field: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `tale.toml` in the current directory and its parents, falling back
    /// to defaults relative to the current directory.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// validation fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source_dir) = &settings.source_dir {
            self.story_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(initial_state) = &settings.initial_state {
            self.story_resolved.initial_state = Some(initial_state.clone());
        }
        if let Some(normalize) = settings.normalize_indentation {
            self.render.normalize_indentation = normalize;
        }
        if let Some(max_steps) = settings.max_steps {
            self.render.max_steps = max_steps;
        }
    }

    fn discover_config() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        Self::discover_config_from(&cwd)
    }

    /// Search for the config file in `start` and its parents.
    fn discover_config_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Default config with paths relative to `base`.
    fn default_with_base(base: &Path) -> Self {
        Self {
            render: RenderConfig::default(),
            story: StoryConfigRaw::default(),
            story_resolved: StoryConfig {
                source_dir: base.join("passages"),
                initial_state: None,
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expansion runs before paths are joined onto the config directory.
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if a limit is zero or the source
    /// directory is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_zero(self.render.max_steps, "render.max_steps")?;
        require_non_zero(self.render.max_watch_ticks, "render.max_watch_ticks")?;
        if self.story_resolved.source_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "story.source_dir cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.story.source_dir {
            self.story.source_dir = Some(expand::expand_env(dir, "story.source_dir")?);
        }
        if let Some(ref state) = self.story.initial_state {
            self.story.initial_state = Some(expand::expand_env(state, "story.initial_state")?);
        }
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.story_resolved = StoryConfig {
            source_dir: config_dir.join(self.story.source_dir.as_deref().unwrap_or("passages")),
            initial_state: self
                .story
                .initial_state
                .as_deref()
                .map(|path| config_dir.join(path)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert!(config.render.normalize_indentation);
        assert_eq!(config.render.max_steps, 100_000);
        assert_eq!(config.render.max_watch_ticks, 64);
        assert_eq!(
            config.story_resolved.source_dir,
            PathBuf::from("/test/passages")
        );
        assert!(config.story_resolved.initial_state.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn test_parse_render_config() {
        let toml = r"
[render]
normalize_indentation = false
max_steps = 500
";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.render.normalize_indentation);
        assert_eq!(config.render.max_steps, 500);
        assert_eq!(config.render.max_watch_ticks, 64);
    }

    #[test]
    fn test_resolve_story_paths() {
        let toml = r#"
[story]
source_dir = "chapters"
initial_state = "data/start.json"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(
            config.story_resolved.source_dir,
            PathBuf::from("/project/chapters")
        );
        assert_eq!(
            config.story_resolved.initial_state,
            Some(PathBuf::from("/project/data/start.json"))
        );
    }

    #[test]
    fn test_absolute_source_dir_kept() {
        let toml = r#"
[story]
source_dir = "/srv/passages"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(
            config.story_resolved.source_dir,
            PathBuf::from("/srv/passages")
        );
    }

    #[test]
    fn test_unknown_field_type_is_parse_error() {
        let result: Result<Config, _> = toml::from_str("[render]\nmax_steps = \"many\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_zero_steps() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.render.max_steps = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("render.max_steps"));
    }

    #[test]
    fn test_validate_zero_watch_ticks() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.render.max_watch_ticks = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("render.max_watch_ticks"));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            initial_state: Some(PathBuf::from("/saves/start.json")),
            max_steps: Some(10),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(
            config.story_resolved.initial_state,
            Some(PathBuf::from("/saves/start.json"))
        );
        assert_eq!(config.render.max_steps, 10);
        assert!(config.render.normalize_indentation); // Unchanged
        assert_eq!(
            config.story_resolved.source_dir,
            PathBuf::from("/test/passages")
        ); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.apply_cli_settings(&CliSettings::default());
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_from_file_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[story]\nsource_dir = \"story\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.story_resolved.source_dir, dir.path().join("story"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[render]\nmax_watch_ticks = 0\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_rejects_zero_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();
        let overrides = CliSettings {
            max_steps: Some(0),
            ..Default::default()
        };

        let err = Config::load(Some(&path), Some(&overrides)).unwrap_err();
        assert!(err.to_string().contains("render.max_steps"));
    }

    #[test]
    fn test_discover_in_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("act1").join("scene2");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "").unwrap();

        assert_eq!(
            Config::discover_config_from(&nested),
            Some(dir.path().join(CONFIG_FILENAME))
        );
    }

    #[test]
    fn test_expand_env_vars_source_dir() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("TALE_TEST_CHAPTER_DIR", "chapters");
        }
        let toml = r#"
[story]
source_dir = "${TALE_TEST_CHAPTER_DIR}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(
            config.story_resolved.source_dir,
            PathBuf::from("/project/chapters")
        );
        unsafe {
            std::env::remove_var("TALE_TEST_CHAPTER_DIR");
        }
    }

    #[test]
    fn test_expand_env_vars_missing() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::remove_var("TALE_TEST_NO_SAVE");
        }
        let toml = r#"
[story]
initial_state = "${TALE_TEST_NO_SAVE}/start.json"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.expand_env_vars().unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
    }
}
