//! Layered config loading: built-in `Default`, overridden by an optional TOML file.
//! CLI-flag overrides are applied by the caller on top of the returned value, since the
//! flag set is specific to each binary.

use serde::de::DeserializeOwned;
use std::path::Path;

/// Loads `T::default()`, then overlays a TOML file at `path` if it exists and parses.
/// A missing file is not an error; a present-but-malformed file is.
pub fn load<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T, serdeconv::Error> {
    match path.filter(|p| p.exists()) {
        Some(p) => serdeconv::from_toml_file(p),
        None => Ok(T::default()),
    }
}
