use tracing::trace;

use crate::sys::geometry::Rect;

/// The external decorator that owns the actual preview windows. The engine
/// only tells it where markers go and whether they render as valid.
pub trait PreviewHandler {
    fn show(&self, slot: usize, rect: Rect, valid: bool);
    fn hide(&self, slot: usize);
}

/// Handler for embedders (and tests) that render no previews.
pub struct NoopPreview;

impl PreviewHandler for NoopPreview {
    fn show(&self, _slot: usize, _rect: Rect, _valid: bool) {}
    fn hide(&self, _slot: usize) {}
}

/// Pool of pre-allocated preview marker slots.
///
/// Window creation is the expensive part of the first drag frame, so at
/// least three markers are created up front and slots are only ever
/// recycled, never destroyed, for the life of the process.
pub struct PreviewPool {
    handler: Box<dyn PreviewHandler>,
    free: Vec<usize>,
    active: Vec<usize>,
}

const MIN_SLOTS: usize = 3;

impl PreviewPool {
    pub fn new(handler: Box<dyn PreviewHandler>, preallocate: usize) -> Self {
        let slots = preallocate.max(MIN_SLOTS);
        Self { handler, free: (0..slots).collect(), active: Vec::new() }
    }

    /// Show one marker per rect, acquiring (or creating) slots as needed.
    /// Surplus active slots from the previous frame are returned.
    pub fn show(&mut self, rects: &[Rect], valid: bool) {
        while self.active.len() > rects.len() {
            let slot = self.active.pop().expect("len checked");
            self.handler.hide(slot);
            self.free.push(slot);
        }
        while self.active.len() < rects.len() {
            let slot = self.free.pop().unwrap_or_else(|| {
                let next = self.slot_count();
                trace!(slot = next, "preview pool grew");
                next
            });
            self.active.push(slot);
        }
        for (slot, rect) in self.active.iter().zip(rects) {
            self.handler.show(*slot, *rect, valid);
        }
    }

    /// Return every active marker to the free list.
    pub fn hide_all(&mut self) {
        for slot in self.active.drain(..) {
            self.handler.hide(slot);
            self.free.push(slot);
        }
    }

    pub fn active_count(&self) -> usize { self.active.len() }

    pub fn slot_count(&self) -> usize { self.free.len() + self.active.len() }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::sys::geometry::Point;

    #[derive(Default)]
    struct Recorder {
        shown: RefCell<Vec<(usize, bool)>>,
        hidden: RefCell<Vec<usize>>,
    }

    impl PreviewHandler for Rc<Recorder> {
        fn show(&self, slot: usize, _rect: Rect, valid: bool) {
            self.shown.borrow_mut().push((slot, valid));
        }
        fn hide(&self, slot: usize) { self.hidden.borrow_mut().push(slot); }
    }

    fn rects(n: usize) -> Vec<Rect> {
        (0..n)
            .map(|i| Rect::new(Point::new(i as f64 * 100.0, 0.0), Point::new(40.0, 40.0)))
            .collect()
    }

    #[test]
    fn test_pool_preallocates_minimum() {
        let pool = PreviewPool::new(Box::new(NoopPreview), 0);
        assert_eq!(pool.slot_count(), 3);
    }

    #[test]
    fn test_show_hide_cycle_recycles_slots() {
        let recorder = Rc::new(Recorder::default());
        let mut pool = PreviewPool::new(Box::new(Rc::clone(&recorder)), 3);

        pool.show(&rects(2), true);
        assert_eq!(pool.active_count(), 2);
        pool.hide_all();
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.slot_count(), 3);

        pool.show(&rects(2), false);
        assert_eq!(recorder.shown.borrow().iter().filter(|(_, v)| !v).count(), 2);
    }

    #[test]
    fn test_pool_grows_past_preallocation_and_keeps_slots() {
        let mut pool = PreviewPool::new(Box::new(NoopPreview), 3);
        pool.show(&rects(5), true);
        assert_eq!(pool.active_count(), 5);
        assert_eq!(pool.slot_count(), 5);
        pool.hide_all();
        assert_eq!(pool.slot_count(), 5);
    }

    #[test]
    fn test_shrinking_frame_returns_surplus() {
        let mut pool = PreviewPool::new(Box::new(NoopPreview), 3);
        pool.show(&rects(3), true);
        pool.show(&rects(1), true);
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.slot_count(), 3);
    }
}
