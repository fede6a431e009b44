use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::broadcast::{Broadcast, Subscription};

/// Where a canvas is mounted. Fullscreen wins over inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CanvasSlot {
    Inline,
    Fullscreen,
}

impl CanvasSlot {
    fn index(self) -> usize {
        match self {
            CanvasSlot::Inline => 0,
            CanvasSlot::Fullscreen => 1,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(Self::Inline),
            "fullscreen" => Some(Self::Fullscreen),
            _ => None,
        }
    }
}

struct Slots<C> {
    entries: [Option<(u64, C)>; 2],
    next_token: u64,
}

struct Inner<C> {
    slots: RefCell<Slots<C>>,
    active: Broadcast<Option<C>>,
}

impl<C: Clone + PartialEq + 'static> Inner<C> {
    fn resolve(&self) {
        let next = {
            let slots = self.slots.borrow();
            slots.entries[CanvasSlot::Fullscreen.index()]
                .as_ref()
                .or(slots.entries[CanvasSlot::Inline.index()].as_ref())
                .map(|(_, c)| c.clone())
        };
        self.active.update(|cur| {
            if *cur == next {
                return false;
            }
            *cur = next;
            true
        });
    }

    fn release(&self, slot: CanvasSlot, token: u64) {
        let released = {
            let mut slots = self.slots.borrow_mut();
            let entry = &mut slots.entries[slot.index()];
            match entry {
                Some((t, _)) if *t == token => {
                    *entry = None;
                    true
                }
                _ => false,
            }
        };
        if released {
            self.resolve();
        }
    }
}

/// Registry of competing canvases resolving to one active canvas.
///
/// Generic over the canvas handle so hosts can store DOM elements, window ids
/// or plain labels in tests.
pub struct VisualSurface<C> {
    inner: Rc<Inner<C>>,
}

impl<C> Clone for VisualSurface<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Clone + PartialEq + 'static> Default for VisualSurface<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clone + PartialEq + 'static> VisualSurface<C> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                slots: RefCell::new(Slots {
                    entries: [None, None],
                    next_token: 0,
                }),
                active: Broadcast::new(None),
            }),
        }
    }

    /// Puts `canvas` in `slot`, replacing whatever was there. Passing `None`
    /// clears the slot. The returned guard clears the slot again when
    /// released, unless another registration has replaced it meanwhile.
    pub fn register_canvas(&self, slot: CanvasSlot, canvas: Option<C>) -> CanvasRegistration {
        let token = {
            let mut slots = self.inner.slots.borrow_mut();
            let token = slots.next_token;
            slots.next_token += 1;
            slots.entries[slot.index()] = canvas.map(|c| (token, c));
            token
        };
        self.inner.resolve();

        let weak: Weak<Inner<C>> = Rc::downgrade(&self.inner);
        CanvasRegistration {
            release: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.release(slot, token);
                }
            })),
        }
    }

    pub fn active(&self) -> Option<C> {
        self.inner.active.get()
    }

    pub fn canvas_in(&self, slot: CanvasSlot) -> Option<C> {
        self.inner.slots.borrow().entries[slot.index()]
            .as_ref()
            .map(|(_, c)| c.clone())
    }

    /// Notified with the active canvas on subscribe and whenever it changes.
    pub fn subscribe(&self, f: impl Fn(Option<&C>) + 'static) -> Subscription {
        self.inner.active.subscribe(move |c| f(c.as_ref()))
    }
}

/// Releases a canvas registration on `release()` or drop.
#[must_use = "dropping a CanvasRegistration unregisters the canvas"]
pub struct CanvasRegistration {
    release: Option<Box<dyn FnOnce()>>,
}

impl CanvasRegistration {
    pub fn release(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(f) = self.release.take() {
            f();
        }
    }
}

impl Drop for CanvasRegistration {
    fn drop(&mut self) {
        self.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Seen = Rc<RefCell<Vec<Option<&'static str>>>>;

    fn recorder(v: &VisualSurface<&'static str>) -> (Seen, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let sub = v.subscribe(move |c| s.borrow_mut().push(c.copied()));
        (seen, sub)
    }

    #[test]
    fn fullscreen_takes_priority_then_reverts() {
        let v = VisualSurface::new();
        let _inline = v.register_canvas(CanvasSlot::Inline, Some("c1"));
        let full = v.register_canvas(CanvasSlot::Fullscreen, Some("c2"));
        assert_eq!(v.active(), Some("c2"));
        full.release();
        assert_eq!(v.active(), Some("c1"));
    }

    #[test]
    fn notifies_only_when_active_changes() {
        let v = VisualSurface::new();
        let (seen, _sub) = recorder(&v);
        let full = v.register_canvas(CanvasSlot::Fullscreen, Some("f"));
        // inline behind fullscreen does not change the active canvas
        let inline = v.register_canvas(CanvasSlot::Inline, Some("i"));
        drop(inline);
        drop(full);
        assert_eq!(*seen.borrow(), vec![None, Some("f"), None]);
    }

    #[test]
    fn stale_registration_is_a_noop() {
        let v = VisualSurface::new();
        let first = v.register_canvas(CanvasSlot::Inline, Some("a"));
        let _second = v.register_canvas(CanvasSlot::Inline, Some("b"));
        first.release();
        assert_eq!(v.active(), Some("b"));
        assert_eq!(v.canvas_in(CanvasSlot::Inline), Some("b"));
    }

    #[test]
    fn registering_none_clears_the_slot() {
        let v = VisualSurface::new();
        let _a = v.register_canvas(CanvasSlot::Inline, Some("a"));
        let _b = v.register_canvas(CanvasSlot::Inline, None);
        assert_eq!(v.active(), None);
    }

    #[test]
    fn registration_outliving_surface_is_harmless() {
        let v = VisualSurface::new();
        let reg = v.register_canvas(CanvasSlot::Inline, Some("a"));
        drop(v);
        reg.release();
    }
}
