//! Stack identity, naming, lifecycle state, and the engine's output bag.
//!
//! Pure functions only: no I/O, no async.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::error::DeserializeError;

// ── Constants ────────────────────────────────────────────────────────────────

/// Fixed project prefix shared by every stack this crate provisions.
pub const PROJECT_PREFIX: &str = "ddagent-e2e";

/// Identity used when the OS user cannot be resolved or is a superuser.
pub const PLACEHOLDER_IDENTITY: &str = "nouser";

/// Config key injected into every stack with the environment name.
pub const ENVIRONMENT_CONFIG_KEY: &str = "environment";

const SUPERUSERS: &[&str] = &["root", "administrator", "system"];

// ── Key and naming ───────────────────────────────────────────────────────────

/// Cache key of a stack: `(environment, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackKey {
    pub environment: String,
    pub name: String,
}

impl StackKey {
    #[must_use]
    pub fn new(environment: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for StackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.environment, self.name)
    }
}

/// Normalise a raw OS user name into a stack-name-safe identity.
///
/// Strips a `DOMAIN\` prefix, lower-cases, and replaces `.` and spaces with
/// `-`. Empty names and superuser accounts map to [`PLACEHOLDER_IDENTITY`].
#[must_use]
pub fn normalize_identity(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return PLACEHOLDER_IDENTITY.to_string();
    };
    let user = raw.rsplit('\\').next().unwrap_or(raw).to_lowercase();
    if user.is_empty() || SUPERUSERS.contains(&user.as_str()) {
        return PLACEHOLDER_IDENTITY.to_string();
    }
    user.replace(['.', ' '], "-")
}

/// Derive the engine stack name for a normalised identity and logical name.
///
/// ```
/// use e2e_env::domain::stack::stack_name;
/// assert_eq!(stack_name("alice", "smoke"), "ddagent-e2e-alice-smoke");
/// ```
#[must_use]
pub fn stack_name(identity: &str, name: &str) -> String {
    format!("{PROJECT_PREFIX}-{identity}-{name}")
}

// ── Lifecycle ────────────────────────────────────────────────────────────────

/// Lifecycle state of a cached stack. `Absent` marks an entry whose first
/// create has not started yet; a `Deleted` entry has already left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Absent,
    Provisioning,
    Up,
    Destroying,
    /// The last configure, `up` or teardown failed; the engine stack is
    /// still cached for the next `get_stack`, `delete_stack` or `cleanup`.
    Failed,
    Deleted,
}

/// Stage of the provisioning lifecycle, used for deadlines and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackStage {
    Create,
    Configure,
    Up,
    Refresh,
    Destroy,
    Remove,
}

impl fmt::Display for StackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Configure => "configure",
            Self::Up => "up",
            Self::Refresh => "refresh",
            Self::Destroy => "destroy",
            Self::Remove => "remove",
        })
    }
}

// ── Config ───────────────────────────────────────────────────────────────────

/// A single stack config value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub value: String,
    #[serde(default)]
    pub secret: bool,
}

impl ConfigValue {
    #[must_use]
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: false,
        }
    }

    #[must_use]
    pub fn secret(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: true,
        }
    }
}

/// Stack configuration, ordered so engine invocations are reproducible.
pub type StackConfig = BTreeMap<String, ConfigValue>;

/// Merge caller config with the injected environment key. The environment
/// key wins over any caller-supplied value.
#[must_use]
pub fn with_environment(config: &StackConfig, environment: &str) -> StackConfig {
    let mut merged = config.clone();
    merged.insert(
        ENVIRONMENT_CONFIG_KEY.to_string(),
        ConfigValue::plain(environment),
    );
    merged
}

// ── Up-result ────────────────────────────────────────────────────────────────

/// One entry of the engine's output bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputValue {
    pub value: serde_json::Value,
    #[serde(default)]
    pub secret: bool,
}

impl From<serde_json::Value> for OutputValue {
    fn from(value: serde_json::Value) -> Self {
        Self {
            value,
            secret: false,
        }
    }
}

/// Result of a successful `up`: an opaque bag of outputs keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpResult {
    pub outputs: HashMap<String, OutputValue>,
}

impl UpResult {
    #[must_use]
    pub fn new(outputs: HashMap<String, OutputValue>) -> Self {
        Self { outputs }
    }

    /// Deserialize the output `name` into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError::MissingOutput`] when the bag has no such
    /// output and [`DeserializeError::Malformed`] when its shape does not
    /// match `T`.
    pub fn output<T: DeserializeOwned>(&self, name: &str) -> Result<T, DeserializeError> {
        let raw = self
            .outputs
            .get(name)
            .ok_or_else(|| DeserializeError::MissingOutput {
                name: name.to_string(),
            })?;
        serde_json::from_value(raw.value.clone()).map_err(|source| DeserializeError::Malformed {
            name: name.to_string(),
            source,
        })
    }
}
