//! Runtime configuration for locating the OpenCL ICD loader.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit OpenCL library to try first.
pub const LIBRARY_ENV_VAR: &str = "KORE_OPENCL_LIBRARY";

/// Where to look for the OpenCL library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Candidate library paths, tried in order.
    #[serde(default = "default_library_paths")]
    pub library_paths: Vec<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { library_paths: default_library_paths() }
    }
}

impl RuntimeConfig {
    /// A config that only tries the given paths.
    pub fn with_paths(library_paths: Vec<PathBuf>) -> Self {
        Self { library_paths }
    }

    /// Platform defaults, with `KORE_OPENCL_LIBRARY` (if set and non-empty)
    /// tried before them.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = std::env::var_os(LIBRARY_ENV_VAR).filter(|p| !p.is_empty()) {
            config.library_paths.insert(0, PathBuf::from(path));
        }
        config
    }
}

fn default_library_paths() -> Vec<PathBuf> {
    let names: &[&str] = if cfg!(target_os = "windows") {
        &["OpenCL.dll"]
    } else if cfg!(target_os = "macos") {
        &["/System/Library/Frameworks/OpenCL.framework/OpenCL", "libOpenCL.dylib"]
    } else {
        &["libOpenCL.so.1", "libOpenCL.so"]
    };
    names.iter().map(PathBuf::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_candidates() {
        let config = RuntimeConfig::default();
        assert!(!config.library_paths.is_empty());
    }

    #[test]
    fn test_with_paths() {
        let config = RuntimeConfig::with_paths(vec!["/opt/ocl/libOpenCL.so".into()]);
        assert_eq!(config.library_paths, vec![PathBuf::from("/opt/ocl/libOpenCL.so")]);
    }

    #[test]
    fn test_json_missing_paths_uses_defaults() {
        let config: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = RuntimeConfig::with_paths(vec!["a.so".into(), "b.so".into()]);
        let text = serde_json::to_string(&config).unwrap();
        let back: RuntimeConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
