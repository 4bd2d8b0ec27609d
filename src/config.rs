use serde::Deserialize;

// appended to `use` targets that have no extension
pub const DEFAULT_MODULE_EXTENSION: &str = "vine";

// `use "vine:io"` resolves against the module registry instead of the filesystem
pub const DEFAULT_BUILTIN_PREFIX: &str = "vine:";

// upper bound on tokens discarded by a lenient `match` before giving up
pub const DEFAULT_SCAN_LIMIT: usize = 1_000_000;

/// How the parser treats a token that does not match what the grammar expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The next significant token must match, otherwise it is a syntax error.
    #[default]
    Strict,
    /// Skip non-matching tokens until one matches or `limit` tokens were discarded.
    Scan { limit: usize },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub module_extension: String,
    pub builtin_prefix: String,
    pub match_mode: MatchMode,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            // set default values here, unless overridden via command-line
            module_extension: DEFAULT_MODULE_EXTENSION.into(),
            builtin_prefix: DEFAULT_BUILTIN_PREFIX.into(),
            match_mode: MatchMode::Strict,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    pub fn lenient() -> Self {
        Self {
            match_mode: MatchMode::Scan {
                limit: DEFAULT_SCAN_LIMIT,
            },
            ..Self::default()
        }
    }
}
