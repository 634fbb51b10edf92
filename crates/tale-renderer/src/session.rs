//! The render session.
//!
//! A [`Session`] owns everything that outlives one passage: the state, both
//! handler registries, the block runner with its pipeline cache, the
//! watchers and the presets.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tale_state::{SessionSnapshot, SetOptions, StateError, StateManager};
use tale_syntax::Node;

use crate::bridge::{Component, build_components, passage_hooks};
use crate::context::Env;
use crate::pipeline::Pipeline;
use crate::presets::Presets;
use crate::registry::HandlerRegistry;
use crate::runner::BlockRunner;
use crate::watch::WatchRegistry;

/// Limits and switches for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Strip indentation in front of directives before parsing.
    pub normalize_indentation: bool,
    /// Dispatch steps allowed per resolution pass.
    pub max_steps: usize,
    /// Ticks [`Session::run_until_idle`] runs before giving up.
    pub max_watch_ticks: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            normalize_indentation: true,
            max_steps: 100_000,
            max_watch_ticks: 64,
        }
    }
}

/// Result of rendering one passage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedPassage {
    /// Resolved tree.
    pub nodes: Vec<Node>,
    /// Component instances found in the tree.
    pub components: Vec<Component>,
    /// Hooks outside any component.
    pub hooks: BTreeMap<String, Vec<Node>>,
    /// Structural warnings from parsing.
    pub warnings: Vec<String>,
}

/// Rendering context for one story.
///
/// ```
/// use tale_renderer::{Session, to_plain_text};
/// use tale_state::StateManager;
///
/// let mut session = Session::new(StateManager::new());
/// let passage = session.render_passage("::set{key=gold value=3}\nYou have :show[gold] gold.");
/// assert_eq!(to_plain_text(&passage.nodes), "You have 3 gold.");
/// ```
#[derive(Debug)]
pub struct Session {
    state: StateManager,
    registry: Arc<HandlerRegistry>,
    effects: Arc<HandlerRegistry>,
    runner: BlockRunner,
    watchers: WatchRegistry,
    presets: Presets,
    settings: RenderSettings,
    pipeline: Pipeline,
}

impl Session {
    /// Session over `state` with the built-in registries.
    #[must_use]
    pub fn new(state: StateManager) -> Self {
        let registry = Arc::new(HandlerRegistry::with_defaults());
        let settings = RenderSettings::default();
        Self {
            state,
            pipeline: Pipeline::new(&registry).with_normalize(settings.normalize_indentation),
            registry,
            effects: Arc::new(HandlerRegistry::effects()),
            runner: BlockRunner::new(),
            watchers: WatchRegistry::new(),
            presets: Presets::new(),
            settings,
        }
    }

    /// Replace the render settings.
    #[must_use]
    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self.pipeline = Pipeline::new(&self.registry).with_normalize(settings.normalize_indentation);
        self
    }

    /// Dispatch passages through `registry` instead of the built-ins.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.pipeline = Pipeline::new(&registry).with_normalize(self.settings.normalize_indentation);
        self.registry = registry;
        self
    }

    fn env(&mut self) -> (Env<'_>, &mut BlockRunner) {
        (
            Env {
                state: &mut self.state,
                watchers: &mut self.watchers,
                presets: &mut self.presets,
                effects: Arc::clone(&self.effects),
                max_steps: self.settings.max_steps,
            },
            &mut self.runner,
        )
    }

    /// Parse and resolve a passage. Watchers of the previous passage are
    /// dropped first.
    pub fn render_passage(&mut self, text: &str) -> RenderedPassage {
        self.watchers.clear();
        let mut document = self.pipeline.parse(text);
        let env = Env {
            state: &mut self.state,
            watchers: &mut self.watchers,
            presets: &mut self.presets,
            effects: Arc::clone(&self.effects),
            max_steps: self.settings.max_steps,
        };
        self.pipeline.resolve(&mut document.children, env);
        tracing::debug!(
            nodes = document.children.len(),
            warnings = document.warnings.len(),
            "passage rendered"
        );
        RenderedPassage {
            components: build_components(&document.children),
            hooks: passage_hooks(&document.children),
            nodes: document.children,
            warnings: document.warnings,
        }
    }

    /// Resolve a copy of `nodes` with the main registry.
    pub fn run_block(&mut self, nodes: &[Node]) -> Vec<Node> {
        let registry = Arc::clone(&self.registry);
        let (env, runner) = self.env();
        runner.run(nodes, &registry, env)
    }

    /// Run the `event` hook of `component`. Returns whether it had one.
    pub fn fire(&mut self, component: &Component, event: &str) -> bool {
        let Some(block) = component.hooks.get(event) else {
            return false;
        };
        tracing::debug!(id = component.id, tag = %component.tag, event, "firing hook");
        self.run_block(block);
        true
    }

    /// Run a passage-level hook. Returns whether the passage had one.
    pub fn fire_passage(&mut self, passage: &RenderedPassage, event: &str) -> bool {
        let Some(block) = passage.hooks.get(event) else {
            return false;
        };
        self.run_block(block);
        true
    }

    /// Write an input value into the state.
    pub fn set_input(&mut self, key: &str, value: Value) -> Result<bool, StateError> {
        self.state.set_value(key, value, SetOptions::default())
    }

    /// Drain queued change events and re-run the watchers they concern.
    ///
    /// Writes made by the watchers themselves are picked up by the next tick.
    /// Returns the number of watchers run.
    pub fn tick(&mut self) -> usize {
        let events = self.state.take_events();
        if events.is_empty() {
            return 0;
        }
        let due = self.watchers.due(&events, &self.state);
        let effects = Arc::clone(&self.effects);
        for block in &due {
            let (env, runner) = self.env();
            runner.run(block, &effects, env);
        }
        due.len()
    }

    /// Tick until no events are pending, at most `max_watch_ticks` times.
    ///
    /// Returns the number of ticks run. Events still pending after the limit
    /// are dropped and an error is recorded.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ticks = 0;
        while self.state.has_pending_events() {
            if ticks == self.settings.max_watch_ticks {
                let limit = self.settings.max_watch_ticks;
                self.state.take_events();
                self.state
                    .add_error(format!("watchers still changing state after {limit} ticks"));
                break;
            }
            self.tick();
            ticks += 1;
        }
        ticks
    }

    /// Start the story over: initial data, no locks, watchers or presets.
    pub fn restart(&mut self) {
        self.state.reset();
        self.state.take_events();
        self.watchers.clear();
        self.presets.clear();
    }

    /// Errors recorded so far.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        self.state.errors()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    #[must_use]
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateManager {
        &mut self.state
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    /// Watchers registered by the current passage.
    #[must_use]
    pub fn watchers(&self) -> &WatchRegistry {
        &self.watchers
    }

    #[must_use]
    pub fn runner(&self) -> &BlockRunner {
        &self.runner
    }
}
