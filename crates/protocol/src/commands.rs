use serde::{Deserialize, Serialize};

use crate::theme::ThemeToken;
use crate::types::{Point, Rect};

/// A single, stateless scene instruction.
///
/// The timeline core emits a `Vec<RenderCommand>` describing the whole grid.
/// An adapter owns the actual graphics objects: it walks the list in order,
/// keeping a stack of open groups, and creates or updates whatever its
/// backend needs (meshes, line geometries, text sprites).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Open a logical group. Its translation applies to every command up to
    /// the matching `EndGroup` (groups nest and translations accumulate).
    /// `visible = false` means the adapter may skip the whole subtree.
    BeginGroup {
        id: String,
        translate: Point,
        /// Depth hint, larger is closer to the viewer.
        z: f64,
        visible: bool,
    },

    /// Close the current group.
    EndGroup,

    /// A filled, positioned quad (a cell, a bar background, a track label
    /// background). `hue` tints the token color when present.
    DrawRect {
        rect: Rect,
        color: ThemeToken,
        hue: Option<f64>,
        border_color: Option<ThemeToken>,
        opacity: f32,
        /// Segment this quad stands for, used for hit-testing.
        segment_id: Option<u64>,
    },

    /// A straight line geometry.
    DrawLine {
        from: Point,
        to: Point,
        color: ThemeToken,
        width: f64,
        opacity: f32,
    },

    /// A text label anchored at `position`.
    DrawText {
        position: Point,
        text: String,
        color: ThemeToken,
        font_size: f64,
        align: TextAlign,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl RenderCommand {
    /// Whether this command opens a group with the given id.
    pub fn is_group(&self, group_id: &str) -> bool {
        matches!(self, Self::BeginGroup { id, .. } if id == group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_roundtrip_keeps_segment_id() {
        let cmd = RenderCommand::DrawRect {
            rect: Rect::new(10.0, 20.0, 30.0, 40.0),
            color: ThemeToken::CellStoryboard,
            hue: Some(210.0),
            border_color: None,
            opacity: 1.0,
            segment_id: Some(7),
        };
        let json = serde_json::to_string(&cmd).unwrap_or_default();
        let back: RenderCommand =
            serde_json::from_str(&json).unwrap_or(RenderCommand::EndGroup);
        assert_eq!(back, cmd);
    }

    #[test]
    fn group_lookup_by_id() {
        let cmd = RenderCommand::BeginGroup {
            id: "cursor".into(),
            translate: Point::new(0.0, 0.0),
            z: 4.0,
            visible: true,
        };
        assert!(cmd.is_group("cursor"));
        assert!(!cmd.is_group("cells"));
        assert!(!RenderCommand::EndGroup.is_group("cursor"));
    }
}
