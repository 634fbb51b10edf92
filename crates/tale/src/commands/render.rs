//! `tale render` command implementation.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use tale_config::{CliSettings, Config};
use tale_renderer::{RenderSettings, RenderedPassage, Session, to_html, to_plain_text};
use tale_state::{SessionSnapshot, StateManager};

use crate::error::CliError;
use crate::output::Output;

/// Output format of a rendered passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Format {
    /// Plain text.
    Text,
    /// HTML with `<tale-*>` component elements.
    Html,
    /// Resolved tree, components and errors as JSON.
    Json,
}

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Passage file. Relative paths that don't exist are looked up in the
    /// story source directory.
    file: PathBuf,

    /// JSON file with initial game data or a saved session snapshot
    /// (overrides config).
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Path to configuration file (default: auto-discover tale.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dispatch step budget (overrides config).
    #[arg(long)]
    max_steps: Option<usize>,

    /// Keep indentation in front of directives.
    #[arg(long)]
    no_normalize: bool,

    /// Write the session snapshot to this file after rendering.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if the config, state or passage can't be loaded.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            initial_state: self.state.clone(),
            normalize_indentation: self.no_normalize.then_some(false),
            max_steps: self.max_steps,
            ..Default::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let path = resolve_passage_path(&self.file, &config.story_resolved.source_dir);
        let text = std::fs::read_to_string(&path)?;
        if self.verbose {
            output.info(&format!("Rendering {}...", path.display()));
        }

        let state = match &config.story_resolved.initial_state {
            Some(state_path) => load_state(state_path)?,
            None => StateManager::new(),
        };
        let mut session = Session::new(state).with_settings(RenderSettings {
            normalize_indentation: config.render.normalize_indentation,
            max_steps: config.render.max_steps,
            max_watch_ticks: config.render.max_watch_ticks,
        });

        let passage = session.render_passage(&text);
        let ticks = session.run_until_idle();
        tracing::info!(
            components = passage.components.len(),
            ticks,
            "passage resolved"
        );

        match self.format {
            Format::Text => output.result(&to_plain_text(&passage.nodes)),
            Format::Html => output.result(&to_html(&passage.nodes)),
            Format::Json => {
                let report = JsonReport {
                    passage: &passage,
                    errors: session.errors(),
                };
                output.result(&serde_json::to_string_pretty(&report)?);
            }
        }

        if self.format != Format::Json {
            print_diagnostics(&output, &passage, session.errors());
        }

        if let Some(save) = &self.save {
            std::fs::write(save, session.snapshot().to_json()?)?;
            if self.verbose {
                output.info(&format!("Snapshot written to {}", save.display()));
            }
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    passage: &'a RenderedPassage,
    errors: &'a [String],
}

fn print_diagnostics(output: &Output, passage: &RenderedPassage, errors: &[String]) {
    for warning in &passage.warnings {
        output.warning(&format!("warning: {warning}"));
    }
    if !errors.is_empty() {
        output.heading(&format!("\n{} error(s) while rendering:", errors.len()));
        for error in errors {
            output.warning(&format!("  - {error}"));
        }
    }
}

/// `file` itself if it exists, otherwise `file` under `source_dir`.
fn resolve_passage_path(file: &Path, source_dir: &Path) -> PathBuf {
    if file.exists() || file.is_absolute() {
        return file.to_path_buf();
    }
    let candidate = source_dir.join(file);
    if candidate.exists() {
        candidate
    } else {
        file.to_path_buf()
    }
}

/// Load a state file: a session snapshot when it carries `gameData`,
/// plain game data otherwise.
fn load_state(path: &Path) -> Result<StateManager, CliError> {
    let content = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&content)? {
        Value::Object(map) if map.contains_key("gameData") => {
            let snapshot: SessionSnapshot = serde_json::from_value(Value::Object(map))?;
            Ok(StateManager::from_snapshot(snapshot))
        }
        Value::Object(map) => Ok(StateManager::with_data(map)),
        _ => Err(CliError::Validation(format!(
            "{}: initial state must be a JSON object",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_load_plain_game_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("start.json");
        std::fs::write(&path, r#"{"hero": {"hp": 7}}"#).unwrap();

        let state = load_state(&path).unwrap();
        assert_eq!(state.get_value("hero.hp"), Some(&json!(7)));
    }

    #[test]
    fn test_load_snapshot_keeps_locks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");
        std::fs::write(
            &path,
            r#"{"gameData": {"gold": 3}, "lockedKeys": {"gold": true}}"#,
        )
        .unwrap();

        let state = load_state(&path).unwrap();
        assert_eq!(state.get_value("gold"), Some(&json!(3)));
        assert!(state.is_locked("gold"));
    }

    #[test]
    fn test_load_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let err = load_state(&path).err().unwrap();
        assert!(matches!(err, CliError::Validation(_)));
    }

    #[test]
    fn test_passage_path_falls_back_to_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("intro.md"), "Hello").unwrap();

        assert_eq!(
            resolve_passage_path(Path::new("intro.md"), dir.path()),
            dir.path().join("intro.md")
        );
        assert_eq!(
            resolve_passage_path(Path::new("missing.md"), dir.path()),
            PathBuf::from("missing.md")
        );
    }
}
