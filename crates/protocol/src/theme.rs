use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the adapter's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    Background,

    // Grid
    GridLine,
    TrackSeparator,

    // Cells, one per media family
    CellStoryboard,
    CellVideo,
    CellAudio,
    CellText,
    CellHoverBorder,
    CellLabel,

    // Top bar time scale
    TimeScaleBackground,
    TimeScaleLine,
    TimeScaleText,

    // Left bar track scale
    TrackScaleBackground,
    TrackScaleText,
    TrackScaleHidden,

    Cursor,
}
