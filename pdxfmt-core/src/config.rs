//! Formatting options and directory-scoped configuration
//!
//! A configuration document maps relative path prefixes to partial option
//! overrides. The overrides are resolved into a prefix tree at load time;
//! a file inherits the options of its nearest ancestor directory (or
//! itself) that has an explicit entry.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Default configuration file name, looked up next to the mod folder
pub const CONFIG_DEFAULT_NAME: &str = "format.config.json";

/// Fully resolved formatting options; every field is always present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub use_tab: bool,
    pub tab_width: usize,
    pub bracket_spacing: bool,
    pub assignment_spacing: bool,
    pub single_line_block: bool,
    pub bracket_wraparound: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            use_tab: false,
            tab_width: 4,
            bracket_spacing: true,
            assignment_spacing: true,
            single_line_block: true,
            bracket_wraparound: 10,
        }
    }
}

impl FormatOptions {
    /// Indentation prefix for the given depth
    pub fn indent(&self, depth: usize) -> String {
        if self.use_tab {
            "\t".repeat(depth)
        } else {
            " ".repeat(self.tab_width * depth)
        }
    }
}

/// Partial option set from a configuration entry; unset fields inherit
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatOptionsOverride {
    pub use_tab: Option<bool>,
    pub tab_width: Option<usize>,
    pub bracket_spacing: Option<bool>,
    pub assignment_spacing: Option<bool>,
    pub single_line_block: Option<bool>,
    pub bracket_wraparound: Option<usize>,
}

impl FormatOptionsOverride {
    /// Merge this override onto a base option set
    pub fn apply(&self, base: &FormatOptions) -> FormatOptions {
        FormatOptions {
            use_tab: self.use_tab.unwrap_or(base.use_tab),
            tab_width: self.tab_width.unwrap_or(base.tab_width),
            bracket_spacing: self.bracket_spacing.unwrap_or(base.bracket_spacing),
            assignment_spacing: self.assignment_spacing.unwrap_or(base.assignment_spacing),
            single_line_block: self.single_line_block.unwrap_or(base.single_line_block),
            bracket_wraparound: self.bracket_wraparound.unwrap_or(base.bracket_wraparound),
        }
    }
}

#[derive(Debug)]
struct ConfigNode {
    options: Option<FormatOptions>,
    children: HashMap<String, ConfigNode>,
}

impl ConfigNode {
    fn new(options: Option<FormatOptions>) -> Self {
        Self { options, children: HashMap::new() }
    }
}

/// Prefix tree of resolved option snapshots, keyed by path segments
#[derive(Debug)]
pub struct ConfigTree {
    root: ConfigNode,
}

impl ConfigTree {
    pub fn new(default: FormatOptions) -> Self {
        Self { root: ConfigNode::new(Some(default)) }
    }

    /// Store the override at the given path, resolved against the nearest
    /// ancestor snapshot present at insertion time
    pub fn insert(&mut self, segments: &[&str], layer: &FormatOptionsOverride) {
        let mut inherited = self.root.options.clone().unwrap_or_default();
        let mut node = &mut self.root;

        for segment in segments {
            if let Some(options) = &node.options {
                inherited = options.clone();
            }
            node = node
                .children
                .entry((*segment).to_string())
                .or_insert_with(|| ConfigNode::new(None));
        }

        node.options = Some(layer.apply(&inherited));
    }

    /// Longest-matching-prefix lookup; always succeeds, falling back to
    /// the root default
    pub fn lookup(&self, segments: &[&str]) -> FormatOptions {
        let mut node = &self.root;
        let mut best = node.options.as_ref();

        for segment in segments {
            match node.children.get(*segment) {
                Some(child) => {
                    node = child;
                    if child.options.is_some() {
                        best = child.options.as_ref();
                    }
                }
                None => break,
            }
        }

        best.cloned().unwrap_or_default()
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new(FormatOptions::default())
    }
}

/// Raw shape of the configuration document; unknown keys are ignored
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigData {
    paths: HashMap<String, FormatOptionsOverride>,
    exclude_files: Vec<String>,
}

/// Error loading the configuration document
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file '{path}' is invalid: {source}")]
    Invalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Loaded configuration: resolved option tree plus exclusion set
#[derive(Debug, Default)]
pub struct Config {
    tree: ConfigTree,
    exclude_files: Vec<String>,
}

impl Config {
    /// Load from a JSON file; a missing file is treated as an empty
    /// document, anything else unreadable or undecodable is an error
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json(&text).map_err(|source| ConfigError::Invalid {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let data: ConfigData = serde_json::from_str(text)?;
        Ok(Self::from_data(data))
    }

    fn from_data(data: ConfigData) -> Self {
        let mut tree = ConfigTree::default();

        // ancestors first, so deeper entries resolve against them
        let mut entries: Vec<(String, FormatOptionsOverride)> = data.paths.into_iter().collect();
        entries.sort_by_key(|(path, _)| path_segments(path).len());

        for (path, layer) in &entries {
            tree.insert(&path_segments(path), layer);
        }

        let exclude_files = data
            .exclude_files
            .iter()
            .map(|path| path_segments(path).join("/"))
            .collect();

        Self { tree, exclude_files }
    }

    /// Effective options for a file path relative to the mod root
    pub fn options_for(&self, path: &str) -> FormatOptions {
        self.tree.lookup(&path_segments(path))
    }

    /// True when the path is listed in `excludeFiles`
    pub fn is_excluded(&self, path: &str) -> bool {
        let normalized = path_segments(path).join("/");
        self.exclude_files.iter().any(|excluded| *excluded == normalized)
    }

    pub fn exclude_files(&self) -> &[String] {
        &self.exclude_files
    }
}

/// Split on either separator, discarding empty segments
fn path_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|segment| !segment.is_empty()).collect()
}
