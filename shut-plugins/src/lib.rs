pub mod checks;

pub use checks::ChecksPlugin;

use shut_core::PluginRegistry;

/// Returns a registry containing every built-in plugin.
pub fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(ChecksPlugin::NAME, || Box::new(ChecksPlugin));
    registry
}
