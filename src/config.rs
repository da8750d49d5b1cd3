use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Neighbours returned by nearest/similarity queries when `n` is omitted
const DEFAULT_NEIGHBORS: usize = 10;
/// Tokens returned by random-token queries when `n` is omitted
const DEFAULT_RANDOM_TOKENS: usize = 100;

const MAX_NEIGHBORS: usize = 1000;
const MAX_PROJECTION: usize = 200;
const MAX_SAMPLE: usize = 10_000;

/// Values used when a request leaves `n` out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryDefaults {
    #[serde(default = "default_neighbors")]
    pub neighbors: usize,

    #[serde(default = "default_random_tokens")]
    pub random_tokens: usize,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            neighbors: DEFAULT_NEIGHBORS,
            random_tokens: DEFAULT_RANDOM_TOKENS,
        }
    }
}

/// Per-request caps that bound worst-case query latency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryLimits {
    /// Largest `n` for nearest/similarity
    #[serde(default = "max_neighbors")]
    pub max_neighbors: usize,

    /// Largest token list for projection and multi-token similarity
    #[serde(default = "max_projection")]
    pub max_projection: usize,

    /// Largest `n` for the random-sampling queries
    #[serde(default = "max_sample")]
    pub max_sample: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_neighbors: MAX_NEIGHBORS,
            max_projection: MAX_PROJECTION,
            max_sample: MAX_SAMPLE,
        }
    }
}

fn default_neighbors() -> usize {
    DEFAULT_NEIGHBORS
}

fn default_random_tokens() -> usize {
    DEFAULT_RANDOM_TOKENS
}

fn max_neighbors() -> usize {
    MAX_NEIGHBORS
}

fn max_projection() -> usize {
    MAX_PROJECTION
}

fn max_sample() -> usize {
    MAX_SAMPLE
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_extensions() -> Vec<String> {
    vec!["txt".to_string(), "vec".to_string(), "bin".to_string()]
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory scanned for embedding files at startup
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File extensions treated as embedding files
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Address the HTTP server binds to
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_true")]
    pub cors_allow_any_origin: bool,

    #[serde(default)]
    pub defaults: QueryDefaults,

    #[serde(default)]
    pub limits: QueryLimits,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            extensions: default_extensions(),
            listen: default_listen(),
            cors_allow_any_origin: true,
            defaults: QueryDefaults::default(),
            limits: QueryLimits::default(),
            base_path: PathBuf::new(),
        }
    }
}

impl Config {
    /// `$VSPACE_BASE_PATH`, or `~/.local/share/vspace`.
    pub fn default_base_path() -> anyhow::Result<PathBuf> {
        if let Ok(path) = std::env::var("VSPACE_BASE_PATH") {
            return Ok(PathBuf::from(path));
        }
        let home = homedir::my_home()
            .context("couldnt look up home dir")?
            .context("couldnt find home dir")?;
        Ok(home.join(".local/share/vspace"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.extensions.is_empty() {
            bail!("extensions must list at least one file extension");
        }

        self.listen
            .parse::<SocketAddr>()
            .with_context(|| format!("listen is not a socket address: {:?}", self.listen))?;

        let limits = &self.limits;
        for (name, value) in [
            ("limits.max_neighbors", limits.max_neighbors),
            ("limits.max_projection", limits.max_projection),
            ("limits.max_sample", limits.max_sample),
            ("defaults.neighbors", self.defaults.neighbors),
            ("defaults.random_tokens", self.defaults.random_tokens),
        ] {
            if value == 0 {
                bail!("{name} must be greater than 0");
            }
        }

        if self.defaults.neighbors > limits.max_neighbors {
            bail!(
                "defaults.neighbors ({}) exceeds limits.max_neighbors ({})",
                self.defaults.neighbors,
                limits.max_neighbors
            );
        }
        if self.defaults.random_tokens > limits.max_sample {
            bail!(
                "defaults.random_tokens ({}) exceeds limits.max_sample ({})",
                self.defaults.random_tokens,
                limits.max_sample
            );
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, writing the defaults first when
    /// it does not exist yet.
    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base_path)
            .with_context(|| format!("couldnt create {}", base_path.display()))?;

        let path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            let defaults = Self {
                base_path: base_path.to_path_buf(),
                ..Default::default()
            };
            defaults.save()?;
            log::info!("wrote default config to {}", path.display());
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("couldnt read {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("{} is malformed", path.display()))?;

        config.base_path = base_path.to_path_buf();
        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(&Self::default_base_path()?)
    }

    /// Atomically rewrite `config.yaml`.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = self.base_path.join(CONFIG_FILE);
        let temp_path = self.base_path.join(format!(".{CONFIG_FILE}.tmp"));

        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(&temp_path, config_str)
            .with_context(|| format!("couldnt write {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &path)
            .with_context(|| format!("couldnt replace {}", path.display()))?;
        Ok(())
    }

    /// `data_dir`, resolved against the config directory when relative.
    pub fn data_path(&self) -> PathBuf {
        if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            self.base_path.join(&self.data_dir)
        }
    }

    /// Apply `$VSPACE_DATA_DIR` on top of the file values. Not persisted.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("VSPACE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
    }
}
