//! Builders to construct resource protectors from configuration.

use std::collections::HashMap;

use crate::config::GuardConfig;
use crate::core::error::ProtectorError;
use crate::core::protector::{Protector, Spawn};

/// Build one protector per configured entry, using the map key as the
/// protector name.
///
/// # Errors
///
/// Returns [`ProtectorError::InvalidConfig`] when the configuration fails
/// validation.
pub fn build_protectors<S>(
    config: &GuardConfig,
    spawner: S,
) -> Result<HashMap<String, Protector<S>>, ProtectorError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    config.validate().map_err(ProtectorError::InvalidConfig)?;

    let mut protectors = HashMap::new();
    for (name, protector_cfg) in &config.protectors {
        let protector = Protector::from_config(name.clone(), protector_cfg, spawner.clone())?;
        protectors.insert(name.clone(), protector);
    }

    Ok(protectors)
}
