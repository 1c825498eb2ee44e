pub mod compare;
pub mod drawing;
pub mod preferences;
pub mod snapshot;
pub mod surface;
pub mod timeframes;
pub mod transform;

pub use compare::CompareOverlay;
pub use drawing::{ClickOutcome, ClickTarget, DrawingTool, DrawingToolController, ToolState};
pub use preferences::TimeframePreferences;
pub use snapshot::{SnapshotExporter, SnapshotOutcome};
pub use surface::{ChartSurfaceController, PaneKind, PaneLayout, ScreenPoint, Viewport};
pub use timeframes::{TimeframeCatalog, TimeframeDescriptor, TimeframeSelection};
