//! Stylesheet for the private `.chatkit-*` namespace.
//!
//! Rules are scoped by the instance attribute so several widgets with
//! different settings can share a page.

use std::time::Duration;

use crate::config::WidgetConfig;

pub const BUTTON_CLASS: &str = "chatkit-button";
pub const WINDOW_CLASS: &str = "chatkit-window";
pub const OVERLAY_CLASS: &str = "chatkit-overlay";
pub const INLINE_CLASS: &str = "chatkit-inline";
pub const OPEN_CLASS: &str = "open";
pub const CLOSING_CLASS: &str = "closing";
pub const INSTANCE_ATTRIBUTE: &str = "data-chatkit-instance";

/// Length of the exit animation; the panel stays in layout until it ends.
pub const CLOSE_ANIMATION: Duration = Duration::from_millis(300);

const EDGE_OFFSET: &str = "20px";
const WINDOW_OFFSET: &str = "90px";

pub fn render_stylesheet(config: &WidgetConfig, instance_id: &str) -> String {
    let scope = format!("[{INSTANCE_ATTRIBUTE}=\"{instance_id}\"]");
    let position = config.position();
    let vertical = if position.is_bottom() { "bottom" } else { "top" };
    let horizontal = if position.is_right() { "right" } else { "left" };
    let z_button = config.z_index();
    let z_window = z_button.saturating_sub(1);
    let z_overlay = z_button.saturating_sub(2);
    let animation_ms = CLOSE_ANIMATION.as_millis();

    format!(
        r#"
.{BUTTON_CLASS}{scope} {{
  position: fixed;
  {vertical}: {EDGE_OFFSET};
  {horizontal}: {EDGE_OFFSET};
  width: {button_size};
  height: {button_size};
  border-radius: 50%;
  background-color: {button_color};
  color: white;
  border: none;
  font-size: 24px;
  cursor: pointer;
  box-shadow: 0 4px 12px rgba(0, 0, 0, 0.15);
  z-index: {z_button};
  transition: transform 0.2s, box-shadow 0.2s;
  display: flex;
  align-items: center;
  justify-content: center;
}}
.{BUTTON_CLASS}{scope}:hover {{
  transform: scale(1.05);
  box-shadow: 0 6px 16px rgba(0, 0, 0, 0.2);
}}
.{BUTTON_CLASS}{scope}:active {{
  transform: scale(0.95);
}}
.{WINDOW_CLASS}{scope} {{
  position: fixed;
  {vertical}: {WINDOW_OFFSET};
  {horizontal}: {EDGE_OFFSET};
  width: {window_width};
  height: {window_height};
  max-width: calc(100vw - 40px);
  max-height: calc(100vh - 120px);
  border: none;
  border-radius: 12px;
  box-shadow: 0 8px 32px rgba(0, 0, 0, 0.2);
  z-index: {z_window};
  display: none;
  background: white;
}}
.{WINDOW_CLASS}{scope}.{OPEN_CLASS} {{
  display: block;
  animation: chatkit-slide-in {animation_ms}ms ease-out;
}}
.{WINDOW_CLASS}{scope}.{CLOSING_CLASS} {{
  display: block;
  animation: chatkit-slide-out {animation_ms}ms ease-in forwards;
}}
.{OVERLAY_CLASS}{scope} {{
  position: fixed;
  top: 0;
  left: 0;
  width: 100%;
  height: 100%;
  background: rgba(0, 0, 0, 0.3);
  z-index: {z_overlay};
  display: none;
}}
.{OVERLAY_CLASS}{scope}.{OPEN_CLASS} {{
  display: block;
  animation: chatkit-fade-in {animation_ms}ms ease-out;
}}
.{INLINE_CLASS}{scope} {{
  width: 100%;
  height: {window_height};
  border: none;
  border-radius: 12px;
  box-shadow: 0 2px 8px rgba(0, 0, 0, 0.1);
}}
@media (max-width: 768px) {{
  .{WINDOW_CLASS}{scope} {{
    width: calc(100vw - 40px);
    height: calc(100vh - 120px);
  }}
}}
@keyframes chatkit-slide-in {{
  from {{ opacity: 0; transform: translateY(20px) scale(0.95); }}
  to {{ opacity: 1; transform: translateY(0) scale(1); }}
}}
@keyframes chatkit-slide-out {{
  from {{ opacity: 1; transform: translateY(0) scale(1); }}
  to {{ opacity: 0; transform: translateY(20px) scale(0.95); }}
}}
@keyframes chatkit-fade-in {{
  from {{ opacity: 0; }}
  to {{ opacity: 1; }}
}}
"#,
        button_size = config.button_size(),
        button_color = config.button_color(),
        window_width = config.window_width(),
        window_height = config.window_height(),
    )
}
