// requestAnimationFrame loops that can be paused and resumed.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys as web;

struct RafState {
    tick: RefCell<Option<Closure<dyn FnMut(f64)>>>,
    handle: Cell<Option<i32>>,
    running: Cell<bool>,
}

impl RafState {
    fn schedule(&self) {
        let Some(window) = web::window() else {
            return;
        };
        let tick = self.tick.borrow();
        let Some(tick) = tick.as_ref() else {
            return;
        };
        match window.request_animation_frame(tick.as_ref().unchecked_ref()) {
            Ok(id) => self.handle.set(Some(id)),
            Err(e) => log::error!("[frame] requestAnimationFrame failed: {:?}", e),
        }
    }
}

/// Calls `f(timestamp_ms)` once per animation frame while running.
pub struct RafLoop {
    state: Rc<RafState>,
}

impl RafLoop {
    pub fn new(mut f: impl FnMut(f64) + 'static) -> Self {
        let state = Rc::new(RafState {
            tick: RefCell::new(None),
            handle: Cell::new(None),
            running: Cell::new(false),
        });
        let weak: Weak<RafState> = Rc::downgrade(&state);
        *state.tick.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            state.handle.set(None);
            if !state.running.get() {
                return;
            }
            f(ts);
            if state.running.get() {
                state.schedule();
            }
        }) as Box<dyn FnMut(f64)>));
        Self { state }
    }

    pub fn start(&self) {
        if self.state.running.replace(true) {
            return;
        }
        if self.state.handle.get().is_none() {
            self.state.schedule();
        }
    }

    pub fn stop(&self) {
        self.state.running.set(false);
        if let Some(id) = self.state.handle.take() {
            if let Some(window) = web::window() {
                let _ = window.cancel_animation_frame(id);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.get()
    }
}

impl Drop for RafLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
