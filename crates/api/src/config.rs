//! Types for use when configuring svcnet modules.

use crate::*;

/// helper transcode function
fn tc<S: serde::Serialize, D: serde::de::DeserializeOwned>(
    s: &S,
) -> SvcResult<D> {
    serde_json::from_str(
        &serde_json::to_string(s)
            .map_err(|e| SvcError::other_src("encode", e))?,
    )
    .map_err(|e| SvcError::other_src("decode", e))
}

/// Denotes a type used to configure a specific svcnet module.
///
/// A module config is a struct with a single camelCase field named after
/// the module, holding the module's own parameters. This keeps the keys of
/// different modules from colliding in the shared [Config] map.
///
/// The types defined here are specifically for configuration that cannot
/// be changed at runtime, the likes of which might be found in a
/// configuration file.
pub trait ModConfig:
    'static
    + Sized
    + Default
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
{
}

/// Svcnet configuration.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Config(serde_json::Map<String, serde_json::Value>);

impl Config {
    /// Merge the top-level keys of a module config into this config,
    /// overwriting any previous values under those keys.
    pub fn set_module_config<M: ModConfig>(
        &mut self,
        config: &M,
    ) -> SvcResult<()> {
        match tc(config)? {
            serde_json::Value::Object(map) => {
                self.0.extend(map);
                Ok(())
            }
            oth => Err(SvcError::other(format!(
                "module config must serialize to an object, got: {oth}"
            ))),
        }
    }

    /// Extract a module config. Note that this config may be loaded from
    /// disk and edited by humans, so module configs should be tolerant to
    /// missing properties, setting sane defaults.
    pub fn get_module_config<M: ModConfig>(&self) -> SvcResult<M> {
        tc(&self.0)
    }
}
