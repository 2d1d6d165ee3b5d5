// opcflat Module - Configuration document loading
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Reads the output template and name mapping files from disk and builds
//! the shared [`Flattener`].

use crate::error::{ModuleError, Result};
use opcflat::{Flattener, FlattenerConfig, NameOverrides, OutputTemplate};
use std::fs;
use std::path::Path;
use tracing::info;

fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ModuleError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Load an output template (a JSON object).
pub fn load_template(path: &Path) -> Result<OutputTemplate> {
    let text = read_document(path)?;
    let template = OutputTemplate::from_json(&text).map_err(|source| ModuleError::Config {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "Loaded output template from {} ({} keys)",
        path.display(),
        template.len()
    );
    Ok(template)
}

/// Load a `NodesMapping` document.
pub fn load_overrides(path: &Path) -> Result<NameOverrides> {
    let text = read_document(path)?;
    let overrides =
        NameOverrides::from_mapping_json(&text).map_err(|source| ModuleError::Config {
            path: path.to_path_buf(),
            source,
        })?;
    info!(
        "Loaded {} display name overrides from {}",
        overrides.len(),
        path.display()
    );
    Ok(overrides)
}

/// Build the flattener from options plus optional template and mapping files.
pub fn build_flattener(
    config: FlattenerConfig,
    template: Option<&Path>,
    mapping: Option<&Path>,
) -> Result<Flattener> {
    let mut flattener = Flattener::with_config(config);

    if let Some(path) = template {
        flattener = flattener.with_template(load_template(path)?);
    }
    if let Some(path) = mapping {
        flattener = flattener.with_overrides(load_overrides(path)?);
    }

    Ok(flattener)
}
