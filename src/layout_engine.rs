pub mod drag;
pub mod engine;
pub mod preview;
pub mod snap_resolver;
pub mod tab_resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use drag::{DragManager, DragPhase};
pub use engine::{Event, LayoutEngine, Sender, channel};
pub use preview::{NoopPreview, PreviewHandler, PreviewPool};
pub use snap_resolver::{SnapTarget, resolve_snap};
pub use tab_resolver::{ZOrder, resolve_tab};
