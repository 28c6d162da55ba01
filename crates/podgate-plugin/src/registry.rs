//! Name-keyed plugin registry.
//!
//! The orchestrator's configuration refers to plugins by name; the registry
//! maps each name to a factory that builds the plugin from that name, its
//! args blob, and the orchestrator [`Handle`]. A plugin answers to the name it
//! was registered under.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{PluginError, PluginResult};
use crate::framework::{Handle, PlacementPlugin};
use crate::plugin::CapacityGate;

pub type PluginFactory = Box<
    dyn Fn(&str, &serde_json::Value, &Handle) -> PluginResult<Arc<dyn PlacementPlugin>>
        + Send
        + Sync,
>;

#[derive(Default)]
pub struct Registry {
    factories: BTreeMap<String, PluginFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with [`CapacityGate`] under its default name.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .factories
            .insert(CapacityGate::NAME.to_string(), Box::new(build_capacity_gate));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: PluginFactory) -> PluginResult<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(PluginError::DuplicatePlugin(name));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Builder-style [`Registry::register`].
    pub fn with_plugin(mut self, name: impl Into<String>, factory: PluginFactory) -> PluginResult<Self> {
        self.register(name, factory)?;
        Ok(self)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the plugin registered under `name`.
    pub fn build(
        &self,
        name: &str,
        args: &serde_json::Value,
        handle: &Handle,
    ) -> PluginResult<Arc<dyn PlacementPlugin>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginError::UnknownPlugin(name.to_string()))?;
        let plugin = factory(name, args, handle)?;
        info!(%name, "plugin instantiated");
        Ok(plugin)
    }
}

fn build_capacity_gate(
    name: &str,
    args: &serde_json::Value,
    handle: &Handle,
) -> PluginResult<Arc<dyn PlacementPlugin>> {
    Ok(Arc::new(CapacityGate::named(name, args, handle)?))
}
