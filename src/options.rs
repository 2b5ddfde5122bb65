use serde::Deserialize;

// -----------------------------------------------------------------------------
// Transform options
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Names that are never read through the scope parameter.
    pub unscopables: Vec<String>,
    pub source_map: bool,
    pub filename: String,
    /// Only redirect `this`; leave free identifiers alone.
    pub keep_scope: bool,
    /// Replacement for `this` when `keep_scope` is set.
    #[serde(alias = "thisUid")]
    pub this_var_name: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            unscopables: vec!["require".to_string()],
            source_map: true,
            filename: "unknown".to_string(),
            keep_scope: false,
            this_var_name: "_this".to_string(),
        }
    }
}

impl Options {
    /// Parse options from a JSON object. Missing keys take their defaults;
    /// unusable input falls back to `Options::default()`.
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_else(|err| {
            tracing::warn!(%err, "ignoring invalid transform options");
            Options::default()
        })
    }

    pub(crate) fn is_unscopable(&self, name: &str) -> bool {
        self.unscopables.iter().any(|u| u == name)
    }
}
