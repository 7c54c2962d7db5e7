//! Test doubles for engine-level tests: an in-memory window runtime that
//! records every command and lets tests inject failures.

use std::cell::{Cell, RefCell};

use crate::common::collections::HashMap;
use crate::sys::geometry::{Point, Rect};
use crate::sys::runtime::{
    ResizeAnchor, RuntimeError, WindowId, WindowRuntime, WindowState,
};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Command {
    MoveTo(WindowId, Point),
    ResizeTo(WindowId, Point, ResizeAnchor),
    SetBounds(WindowId, Rect),
    Show(WindowId),
    Hide(WindowId),
    BringToFront(WindowId),
    Close(WindowId, bool),
    CreateTabStrip(String, Rect),
}

#[derive(Default)]
pub(crate) struct FakeRuntime {
    commands: RefCell<Vec<Command>>,
    bounds: RefCell<HashMap<WindowId, Rect>>,
    failing: RefCell<Option<WindowId>>,
    mouse: Cell<Point>,
    strip_counter: Cell<u32>,
}

impl FakeRuntime {
    pub fn new() -> Self { Self::default() }

    pub fn set_mouse(&self, point: Point) { self.mouse.set(point); }

    /// Every subsequent command against `id` fails as if the window
    /// vanished.
    pub fn fail_window(&self, id: WindowId) { *self.failing.borrow_mut() = Some(id); }

    pub fn commands(&self) -> Vec<Command> { self.commands.borrow().clone() }

    pub fn clear_commands(&self) { self.commands.borrow_mut().clear(); }

    pub fn bounds_of(&self, id: &WindowId) -> Option<Rect> {
        self.bounds.borrow().get(id).copied()
    }

    fn check(&self, id: &WindowId) -> Result<(), RuntimeError> {
        if self.failing.borrow().as_ref() == Some(id) {
            return Err(RuntimeError::WindowGone);
        }
        Ok(())
    }

    fn record(&self, command: Command) { self.commands.borrow_mut().push(command); }
}

impl WindowRuntime for FakeRuntime {
    fn move_to(&self, id: &WindowId, center: Point) -> Result<(), RuntimeError> {
        self.check(id)?;
        self.record(Command::MoveTo(id.clone(), center));
        if let Some(rect) = self.bounds.borrow_mut().get_mut(id) {
            rect.center = center;
        }
        Ok(())
    }

    fn resize_to(
        &self,
        id: &WindowId,
        half_size: Point,
        anchor: ResizeAnchor,
    ) -> Result<(), RuntimeError> {
        self.check(id)?;
        self.record(Command::ResizeTo(id.clone(), half_size, anchor));
        if let Some(rect) = self.bounds.borrow_mut().get_mut(id) {
            rect.half_size = half_size;
        }
        Ok(())
    }

    fn set_bounds(&self, id: &WindowId, rect: Rect) -> Result<(), RuntimeError> {
        self.check(id)?;
        self.record(Command::SetBounds(id.clone(), rect));
        self.bounds.borrow_mut().insert(id.clone(), rect);
        Ok(())
    }

    fn show(&self, id: &WindowId) -> Result<(), RuntimeError> {
        self.check(id)?;
        self.record(Command::Show(id.clone()));
        Ok(())
    }

    fn hide(&self, id: &WindowId) -> Result<(), RuntimeError> {
        self.check(id)?;
        self.record(Command::Hide(id.clone()));
        Ok(())
    }

    fn bring_to_front(&self, id: &WindowId) -> Result<(), RuntimeError> {
        self.check(id)?;
        self.record(Command::BringToFront(id.clone()));
        Ok(())
    }

    fn close(&self, id: &WindowId, force: bool) -> Result<(), RuntimeError> {
        self.check(id)?;
        self.record(Command::Close(id.clone(), force));
        Ok(())
    }

    fn create_tab_strip(
        &self,
        url: &str,
        rect: Rect,
    ) -> Result<(WindowId, WindowState), RuntimeError> {
        self.record(Command::CreateTabStrip(url.to_string(), rect));
        let n = self.strip_counter.get();
        self.strip_counter.set(n + 1);
        let id = WindowId::new("sash-tabstrip", format!("strip-{n}"));
        self.bounds.borrow_mut().insert(id.clone(), rect);
        let state = WindowState { rect, ..Default::default() };
        Ok((id, state))
    }

    fn mouse_position(&self) -> Point { self.mouse.get() }
}
