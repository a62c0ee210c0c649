// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

static CONFIG: OnceLock<StoneworkConfig> = OnceLock::new();

fn default_log_level() -> String {
    "info".to_string()
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static StoneworkConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = path.as_ref().to_path_buf();
    let cfg = StoneworkConfig::load_from_file(&path)?;
    let _ = CONFIG.set(cfg);
    Ok(CONFIG.get().expect("CONFIG set"))
}

pub fn init_from_env_or_default() -> Result<&'static StoneworkConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    // A storage library must work without a config file: missing file means
    // compiled-in defaults, a present-but-broken file is still an error.
    let cfg = match config_path_from_env_or_default() {
        Some(path) => StoneworkConfig::load_from_file(&path)?,
        None => StoneworkConfig::default(),
    };
    let _ = CONFIG.set(cfg);
    Ok(CONFIG.get().expect("CONFIG set"))
}

pub fn config() -> Result<&'static StoneworkConfig> {
    init_from_env_or_default()
}

fn config_path_from_env_or_default() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("STONEWORK_CONFIG") {
        if !p.trim().is_empty() {
            return Some(PathBuf::from(p));
        }
    }

    let candidate = PathBuf::from("stonework.toml");
    if candidate.exists() {
        return Some(candidate);
    }
    None
}

#[derive(Clone, Deserialize)]
pub struct StoneworkConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    /// Example: "stonework=debug"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl StoneworkConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        let cfg: StoneworkConfig =
            toml::from_str(&s).with_context(|| format!("parse toml: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn log_filter_expression(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(&self.log_level)
    }
}

impl Default for StoneworkConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct StorageConfig {
    /// Capacity stamped onto newly created blocks when neither the
    /// descriptor nor the relation carries an explicit layout.
    #[serde(default = "StorageConfig::default_block_capacity_bytes")]
    pub default_block_capacity_bytes: u64,
}

impl StorageConfig {
    fn default_block_capacity_bytes() -> u64 {
        2 * 1024 * 1024
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_block_capacity_bytes: Self::default_block_capacity_bytes(),
        }
    }
}
