//! The seam between the engine and the window runtime.
//!
//! The engine never talks to the OS directly; an embedder implements
//! [`WindowRuntime`] and feeds [`RuntimeEvent`]s into the engine's queue.
//! Commands are synchronous from the engine's point of view: the adapter is
//! responsible for its own timeout and reports `RuntimeError::Timeout` when a
//! command does not complete in time.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::common::collections::HashMap;
use crate::sys::geometry::{Point, Rect};

/// Identity of one OS window, unique while the window exists.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId {
    pub uuid: String,
    pub name: String,
}

impl WindowId {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self { uuid: uuid.into(), name: name.into() }
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.uuid, self.name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    #[default]
    Normal,
    Minimized,
    Maximized,
}

/// Cached per-window state, refreshed on every observed transform or commit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowState {
    pub rect: Rect,
    pub frame: bool,
    pub hidden: bool,
    pub mode: WindowMode,
    pub min_size: Point,
    pub max_size: Point,
    pub opacity: f64,
}

impl Default for WindowState {
    fn default() -> Self {
        WindowState {
            rect: Rect::default(),
            frame: true,
            hidden: false,
            mode: WindowMode::Normal,
            min_size: Point::zero(),
            max_size: Point::new(f64::MAX, f64::MAX),
            opacity: 1.0,
        }
    }
}

/// Which edge/corner stays put while a window is resized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeAnchor {
    #[default]
    Center,
    TopLeft,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RuntimeError {
    #[error("window vanished mid-operation")]
    WindowGone,
    #[error("runtime command failed: {0}")]
    CommandFailed(String),
    #[error("runtime command timed out after {0:?}")]
    Timeout(Duration),
}

/// Commands the engine issues against the runtime. Implemented by the
/// embedder's adapter; a test double lives in `layout_engine::testing`.
pub trait WindowRuntime {
    fn move_to(&self, id: &WindowId, center: Point) -> Result<(), RuntimeError>;
    fn resize_to(
        &self,
        id: &WindowId,
        half_size: Point,
        anchor: ResizeAnchor,
    ) -> Result<(), RuntimeError>;
    fn set_bounds(&self, id: &WindowId, rect: Rect) -> Result<(), RuntimeError>;
    fn show(&self, id: &WindowId) -> Result<(), RuntimeError>;
    fn hide(&self, id: &WindowId) -> Result<(), RuntimeError>;
    fn bring_to_front(&self, id: &WindowId) -> Result<(), RuntimeError>;
    fn close(&self, id: &WindowId, force: bool) -> Result<(), RuntimeError>;

    /// Create the special window hosting a tab strip UI. Returns the new
    /// window's identity and initial state; the engine registers it like any
    /// other window but never exposes it through the client surface.
    fn create_tab_strip(&self, url: &str, rect: Rect) -> Result<(WindowId, WindowState), RuntimeError>;

    /// Global mouse position, polled during drags.
    fn mouse_position(&self) -> Point;
}

/// Whether the left button was held when a bounds change was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseState {
    Down,
    Up,
}

/// Events the adapter pushes into the engine, in observed runtime order.
#[derive(Clone, Debug)]
pub enum RuntimeEvent {
    WindowCreated { id: WindowId, state: WindowState },
    WindowClosed(WindowId),
    WindowFocused(WindowId),
    BoundsChanged { id: WindowId, rect: Rect, mouse: MouseState },
    StateChanged { id: WindowId, mode: WindowMode },
    FrameChanged { id: WindowId, frame: bool },
    HiddenChanged { id: WindowId, hidden: bool },
    MouseUp,
}

/// A capability to command one window. Flips not-ready on the first failed
/// command; every later command on the handle is a no-op so a vanished window
/// cannot wedge a commit sequence.
#[derive(Clone)]
pub struct WindowHandle {
    id: WindowId,
    runtime: Rc<dyn WindowRuntime>,
    ready: Rc<Cell<bool>>,
}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowHandle")
            .field("id", &self.id)
            .field("ready", &self.ready.get())
            .finish()
    }
}

impl WindowHandle {
    pub fn new(id: WindowId, runtime: Rc<dyn WindowRuntime>) -> Self {
        Self { id, runtime, ready: Rc::new(Cell::new(true)) }
    }

    pub fn id(&self) -> &WindowId { &self.id }

    pub fn is_ready(&self) -> bool { self.ready.get() }

    pub fn mark_not_ready(&self) { self.ready.set(false); }

    fn guard(&self, result: Result<(), RuntimeError>) -> Result<(), RuntimeError> {
        if let Err(ref e) = result {
            warn!(window = %self.id, error = %e, "runtime command failed; window marked not ready");
            self.ready.set(false);
        }
        result
    }

    pub fn move_to(&self, center: Point) -> Result<(), RuntimeError> {
        if !self.is_ready() {
            return Ok(());
        }
        self.guard(self.runtime.move_to(&self.id, center))
    }

    pub fn resize_to(&self, half_size: Point, anchor: ResizeAnchor) -> Result<(), RuntimeError> {
        if !self.is_ready() {
            return Ok(());
        }
        self.guard(self.runtime.resize_to(&self.id, half_size, anchor))
    }

    pub fn set_bounds(&self, rect: Rect) -> Result<(), RuntimeError> {
        if !self.is_ready() {
            return Ok(());
        }
        self.guard(self.runtime.set_bounds(&self.id, rect))
    }

    pub fn show(&self) -> Result<(), RuntimeError> {
        if !self.is_ready() {
            return Ok(());
        }
        self.guard(self.runtime.show(&self.id))
    }

    pub fn hide(&self) -> Result<(), RuntimeError> {
        if !self.is_ready() {
            return Ok(());
        }
        self.guard(self.runtime.hide(&self.id))
    }

    pub fn bring_to_front(&self) -> Result<(), RuntimeError> {
        if !self.is_ready() {
            return Ok(());
        }
        self.guard(self.runtime.bring_to_front(&self.id))
    }

    pub fn close(&self, force: bool) -> Result<(), RuntimeError> {
        if !self.is_ready() {
            return Ok(());
        }
        self.guard(self.runtime.close(&self.id, force))
    }
}

/// A per-window counter for frame writes the engine itself requested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionId(u32);

impl TransactionId {
    pub fn next(&mut self) -> TransactionId {
        self.0 += 1;
        *self
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TxRecord {
    pub txid: TransactionId,
    pub target: Rect,
}

/// Pending engine-requested frame writes, keyed by window.
///
/// When a bounds event arrives we check the queue head: a match means the
/// event echoes our own write (group cohesion, snap commit) and must not be
/// treated as a user transform. Matching is approximate since some runtimes
/// round to integer pixels.
#[derive(Default)]
pub struct TxStore {
    pending: HashMap<WindowId, VecDeque<TxRecord>>,
    counter: TransactionId,
}

const TX_MATCH_EPSILON: f64 = 1.0;

impl TxStore {
    pub fn new() -> Self { Self::default() }

    pub fn record(&mut self, id: &WindowId, target: Rect) -> TransactionId {
        let txid = self.counter.next();
        self.pending.entry(id.clone()).or_default().push_back(TxRecord { txid, target });
        txid
    }

    /// Consume a pending record matching `observed`. Returns true when the
    /// observed frame was one the engine asked for.
    pub fn consume(&mut self, id: &WindowId, observed: &Rect) -> bool {
        let Some(queue) = self.pending.get_mut(id) else {
            return false;
        };
        let matched = queue
            .front()
            .map(|rec| rec.target.approx_eq(observed, TX_MATCH_EPSILON))
            .unwrap_or(false);
        if matched {
            queue.pop_front();
            if queue.is_empty() {
                self.pending.remove(id);
            }
        }
        matched
    }

    pub fn forget(&mut self, id: &WindowId) { self.pending.remove(id); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_store_consumes_in_order() {
        let mut store = TxStore::new();
        let id = WindowId::new("app", "w1");
        let a = Rect::from_origin_size(Point::new(0.0, 0.0), Point::new(100.0, 100.0));
        let b = a.translate(Point::new(50.0, 0.0));
        store.record(&id, a);
        store.record(&id, b);

        assert!(store.consume(&id, &a));
        assert!(!store.consume(&id, &a));
        assert!(store.consume(&id, &b));
        assert!(!store.consume(&id, &b));
    }

    #[test]
    fn test_tx_store_tolerates_rounding() {
        let mut store = TxStore::new();
        let id = WindowId::new("app", "w1");
        let target = Rect::new(Point::new(100.4, 100.0), Point::new(50.0, 50.0));
        store.record(&id, target);
        let observed = Rect::new(Point::new(100.0, 100.0), Point::new(50.0, 50.0));
        assert!(store.consume(&id, &observed));
    }

    #[test]
    fn test_tx_store_mismatch_leaves_record() {
        let mut store = TxStore::new();
        let id = WindowId::new("app", "w1");
        let target = Rect::new(Point::new(100.0, 100.0), Point::new(50.0, 50.0));
        store.record(&id, target);
        let user_move = target.translate(Point::new(30.0, 0.0));
        assert!(!store.consume(&id, &user_move));
        assert!(store.consume(&id, &target));
    }
}
