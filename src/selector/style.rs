//! Attribute names, class names and stylesheets the picker puts on the page.

use crate::config::BridgeConfig;

pub const HOVERED_ATTR: &str = "data-imagine-hovered";
pub const SELECTED_ATTR: &str = "data-imagine-selected";
pub const FULL_WIDTH_ATTR: &str = "data-full-width";
/// Marks buttons whose `disabled` was lifted while picking.
pub const FORCE_ENABLED_ATTR: &str = "data-imagine-disabled";
/// Marks clones made by element duplication.
pub const TEMPORARY_ATTR: &str = "data-imagine-tmp";
/// Location value given to duplicated elements.
pub const UNIDENTIFIED_LOCATION: &str = "x";

pub const TOOLTIP_CLASS: &str = "imagine-selector-tooltip";
pub const OVERRIDE_STYLESHEET_ID: &str = "imagine-override";

pub const SCROLL_OVERRIDE_CSS: &str = "* { scroll-behavior: auto !important; }";

/// Outline offsets for regular and full-width highlights.
const NORMAL_OFFSET: &str = "0";
const FULL_WIDTH_OFFSET: &str = "-5px";

/// Tooltip and highlight rules.
pub fn highlight_css(config: &BridgeConfig) -> String {
    let color = &config.highlight_color;
    let background = &config.highlight_background;
    let z = config.z_index;
    format!(
        r#"
.{TOOLTIP_CLASS} {{
  position: fixed;
  z-index: {z};
  pointer-events: none;
  background-color: {color};
  color: white;
  padding: 4px 8px;
  border-radius: 4px;
  font-size: 14px;
  font-weight: bold;
  line-height: 1;
  white-space: nowrap;
  display: none;
  box-shadow: 0 2px 4px rgba(0,0,0,0.2);
  transition: opacity 0.2s ease-in-out;
  margin: 0;
}}
[{HOVERED_ATTR}] {{
  position: relative;
}}
[{HOVERED_ATTR}]::before {{
  content: '';
  position: absolute;
  top: 0;
  left: 0;
  width: 100%;
  height: 100%;
  border-radius: 0px;
  outline: 1px dashed {color} !important;
  outline-offset: {NORMAL_OFFSET} !important;
  background-color: {background} !important;
  z-index: {z};
  pointer-events: none;
}}
[{SELECTED_ATTR}] {{
  position: relative;
}}
[{SELECTED_ATTR}]::before {{
  content: '';
  position: absolute;
  top: 0;
  left: 0;
  width: 100%;
  height: 100%;
  border-radius: 0px;
  outline: 1px dashed {color} !important;
  outline-offset: 3px !important;
  transition: outline-offset 0.2s ease-in-out;
  z-index: {z};
  pointer-events: none;
}}
[{SELECTED_ATTR}][contenteditable] {{
  outline: none !important;
}}
[{HOVERED_ATTR}][{FULL_WIDTH_ATTR}]::before,
[{SELECTED_ATTR}][{FULL_WIDTH_ATTR}]::before {{
  outline-offset: {FULL_WIDTH_OFFSET} !important;
}}
"#
    )
}
