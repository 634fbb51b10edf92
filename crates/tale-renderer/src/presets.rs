//! Attribute presets.
//!
//! `::preset[hero]{x=10 color=gold}` stores raw attributes under a name;
//! components carrying `preset=hero` receive them wherever they do not set
//! the attribute themselves.

use std::collections::{BTreeMap, HashMap};

use tale_syntax::DirectiveNode;

/// Preset name to raw attributes.
pub type Presets = HashMap<String, BTreeMap<String, String>>;

/// Merge the preset named by the directive's `preset` attribute into its
/// attributes and drop the `preset` attribute.
///
/// Returns the unknown preset name when there is no such preset.
pub(crate) fn apply_preset(presets: &Presets, directive: &mut DirectiveNode) -> Result<(), String> {
    let Some(name) = directive.attributes.remove("preset") else {
        return Ok(());
    };
    let name = name.trim();
    let Some(preset) = presets.get(name) else {
        return Err(name.to_owned());
    };
    for (key, value) in preset {
        directive
            .attributes
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    Ok(())
}
