//! Bridge configuration.
//!
//! The host page may publish a partial config object before the module
//! starts; every missing field falls back to the defaults below.

use serde::{Deserialize, Serialize};

/// Default delay before a hover/unhover burst settles (ms).
pub const DEFAULT_DEBOUNCE_MS: u32 = 10;

/// Default delay before the element under the pointer is re-resolved after
/// scrolling stops (ms).
pub const DEFAULT_SCROLL_DEBOUNCE_MS: u32 = 420;

/// Default window during which a repeated error key is suppressed (ms).
pub const DEFAULT_DEDUP_TTL_MS: f64 = 5000.0;

// =============================================================================
// SERIALIZER CONFIG
// =============================================================================

/// Limits applied by the value serializer. Immutable for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerializerConfig {
    pub max_depth: usize,
    pub indent: usize,
    pub include_symbols: bool,
    pub preserve_types: bool,
    pub max_string_length: usize,
    pub max_array_length: usize,
    pub max_object_keys: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            indent: 2,
            include_symbols: true,
            preserve_types: true,
            max_string_length: 10_000,
            max_array_length: 100,
            max_object_keys: 100,
        }
    }
}

/// Per-call overrides merged on top of a base [`SerializerConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerializerOverrides {
    pub max_depth: Option<usize>,
    pub include_symbols: Option<bool>,
    pub preserve_types: Option<bool>,
    pub max_string_length: Option<usize>,
    pub max_array_length: Option<usize>,
    pub max_object_keys: Option<usize>,
}

impl SerializerConfig {
    /// Merge overrides into a copy of this config.
    pub fn with(&self, overrides: &SerializerOverrides) -> SerializerConfig {
        SerializerConfig {
            max_depth: overrides.max_depth.unwrap_or(self.max_depth),
            indent: self.indent,
            include_symbols: overrides.include_symbols.unwrap_or(self.include_symbols),
            preserve_types: overrides.preserve_types.unwrap_or(self.preserve_types),
            max_string_length: overrides
                .max_string_length
                .unwrap_or(self.max_string_length),
            max_array_length: overrides.max_array_length.unwrap_or(self.max_array_length),
            max_object_keys: overrides.max_object_keys.unwrap_or(self.max_object_keys),
        }
    }
}

// =============================================================================
// BRIDGE CONFIG
// =============================================================================

/// Complete bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Origins allowed to exchange messages with the bridge. `"*"` admits all.
    pub allowed_origins: Vec<String>,
    /// Id of the application mount root.
    pub root_id: String,

    /// Hover/unhover debounce (ms).
    pub debounce_ms: u32,
    /// Scroll re-resolve debounce (ms).
    pub scroll_debounce_ms: u32,
    /// Error dedup window (ms).
    pub dedup_ttl_ms: f64,

    /// Distance of the tooltip above the hovered element (px).
    pub tooltip_offset: f64,
    /// Tooltip max width (px).
    pub max_tooltip_width: f64,
    /// Tooltip left/top for elements spanning the viewport.
    pub full_width_tooltip_offset: String,
    /// Width difference under which an element counts as full-width (px).
    pub full_width_tolerance: f64,
    pub highlight_color: String,
    pub highlight_background: String,
    pub z_index: u32,

    /// Serializer defaults for every capture.
    pub serializer: SerializerConfig,
    /// Depth limit used when serializing console arguments.
    pub console_max_depth: usize,
    /// Stack lines dropped from captured warn/error stacks (the wrapper's own).
    pub stack_frames_to_skip: usize,
    /// Component tree recursion limit.
    pub tree_max_depth: usize,

    /// Poll interval while a hot-reload update is pending (ms).
    pub hot_reload_poll_ms: u32,
    /// Window property holding the dev server's hot module handle, if any.
    pub hot_module_global: Option<String>,
    /// Version announced in `SELECTOR_SCRIPT_LOADED`.
    pub script_version: Option<String>,
    /// Max tracing level: trace, debug, info, warn or error.
    pub log_level: String,

    pub capture_console: bool,
    pub capture_network: bool,
    pub capture_errors: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            root_id: "root".to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            scroll_debounce_ms: DEFAULT_SCROLL_DEBOUNCE_MS,
            dedup_ttl_ms: DEFAULT_DEDUP_TTL_MS,
            tooltip_offset: 25.0,
            max_tooltip_width: 200.0,
            full_width_tooltip_offset: "12px".to_string(),
            full_width_tolerance: 5.0,
            highlight_color: "#0da2e7".to_string(),
            highlight_background: "#0da2e71a".to_string(),
            z_index: 10_000,
            serializer: SerializerConfig::default(),
            console_max_depth: 5,
            stack_frames_to_skip: 2,
            tree_max_depth: 64,
            hot_reload_poll_ms: 50,
            hot_module_global: None,
            script_version: None,
            log_level: "info".to_string(),
            capture_console: true,
            capture_network: true,
            capture_errors: true,
        }
    }
}

impl BridgeConfig {
    /// Serializer settings used for console arguments.
    pub fn console_serializer(&self) -> SerializerConfig {
        self.serializer.with(&SerializerOverrides {
            max_depth: Some(self.console_max_depth),
            include_symbols: Some(true),
            preserve_types: Some(true),
            ..SerializerOverrides::default()
        })
    }

    /// Version string announced to the parent.
    pub fn announced_version(&self) -> String {
        self.script_version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }

    /// Whether `width` spans the viewport closely enough to be treated as
    /// full-width.
    pub fn is_full_width(&self, width: f64, viewport_width: f64) -> bool {
        (width - viewport_width).abs() < self.full_width_tolerance
    }
}
