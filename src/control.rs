use std::cell::RefCell;
use std::rc::Rc;

use crate::options::OptionsPatch;
use crate::pattern::{Pattern, PointerState};
use crate::region::SurfaceSize;

/// Requests a host or UI layer can send to a coordinator.
#[derive(Debug, Clone)]
pub enum Command {
    SetOptions(OptionsPatch),
    SetPattern(Pattern),
    /// Host resize notification. Ignored when the coordinator resizes to a fixed target.
    Resize(SurfaceSize),
    StartAnimation,
    StopAnimation,
    RenderOnce,
    PointerMoved { x: f32, y: f32 },
    PointerClicked { x: f32, y: f32 },
}

/// Coalescing buffer between command senders and the frame loop.
///
/// Option patches merge (later fields win) and are held until no new patch has
/// arrived for the debounce window. Everything else is applied at the next frame
/// boundary, with the last pattern, resize and start/stop request winning.
#[derive(Debug, Default)]
pub struct PendingUpdates {
    patch: Option<OptionsPatch>,
    /// Frame time at which the current patch was first observed unchanged.
    patch_seen_ms: Option<f64>,
    pattern: Option<Pattern>,
    resize: Option<SurfaceSize>,
    animating: Option<bool>,
    render_requested: bool,
    pointer: Option<PointerState>,
}

/// Updates ready to apply at one frame boundary.
#[derive(Debug, Default)]
pub struct ReadyUpdates {
    pub patch: Option<OptionsPatch>,
    pub pattern: Option<Pattern>,
    pub resize: Option<SurfaceSize>,
    pub animating: Option<bool>,
    pub render_requested: bool,
    pub pointer: Option<PointerState>,
}

impl ReadyUpdates {
    pub fn is_empty(&self) -> bool {
        self.patch.is_none()
            && self.pattern.is_none()
            && self.resize.is_none()
            && self.animating.is_none()
            && !self.render_requested
            && self.pointer.is_none()
    }
}

impl PendingUpdates {
    pub fn push(&mut self, command: Command) {
        match command {
            Command::SetOptions(patch) => {
                match &mut self.patch {
                    Some(pending) => pending.merge(patch),
                    None => self.patch = Some(patch),
                }
                self.patch_seen_ms = None;
            }
            Command::SetPattern(pattern) => self.pattern = Some(pattern),
            Command::Resize(size) => self.resize = Some(size),
            Command::StartAnimation => self.animating = Some(true),
            Command::StopAnimation => self.animating = Some(false),
            Command::RenderOnce => self.render_requested = true,
            Command::PointerMoved { x, y } => {
                let clicked = self.pointer.is_some_and(|pointer| pointer.clicked);
                self.pointer = Some(PointerState { x, y, clicked });
            }
            Command::PointerClicked { x, y } => {
                self.pointer = Some(PointerState {
                    x,
                    y,
                    clicked: true,
                });
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        self.patch.is_some()
            || self.pattern.is_some()
            || self.resize.is_some()
            || self.animating.is_some()
            || self.render_requested
            || self.pointer.is_some()
    }

    /// Drains everything due at `now_ms`. A patch stays buffered until it has been
    /// quiet for `debounce_ms`.
    pub fn take_ready(&mut self, now_ms: f64, debounce_ms: u64) -> ReadyUpdates {
        let patch_ready = match (&self.patch, self.patch_seen_ms) {
            (None, _) => false,
            (Some(_), _) if debounce_ms == 0 => true,
            (Some(_), None) => {
                self.patch_seen_ms = Some(now_ms);
                false
            }
            (Some(_), Some(seen)) => now_ms - seen >= debounce_ms as f64,
        };
        let patch = if patch_ready {
            self.patch_seen_ms = None;
            self.patch.take()
        } else {
            None
        };

        ReadyUpdates {
            patch,
            pattern: self.pattern.take(),
            resize: self.resize.take(),
            animating: self.animating.take(),
            render_requested: std::mem::take(&mut self.render_requested),
            pointer: self.pointer.take(),
        }
    }
}

/// Cloneable command table handed to hosts and UI layers.
#[derive(Debug, Clone, Default)]
pub struct ControlHandle {
    pending: Rc<RefCell<PendingUpdates>>,
}

impl ControlHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&self, command: Command) {
        self.pending.borrow_mut().push(command);
    }

    pub fn set_options(&self, patch: OptionsPatch) {
        self.send(Command::SetOptions(patch));
    }

    pub fn set_pattern(&self, pattern: Pattern) {
        self.send(Command::SetPattern(pattern));
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.send(Command::Resize(SurfaceSize::new(width, height)));
    }

    pub fn start_animation(&self) {
        self.send(Command::StartAnimation);
    }

    pub fn stop_animation(&self) {
        self.send(Command::StopAnimation);
    }

    pub fn request_render(&self) {
        self.send(Command::RenderOnce);
    }

    pub fn pointer_moved(&self, x: f32, y: f32) {
        self.send(Command::PointerMoved { x, y });
    }

    pub fn pointer_clicked(&self, x: f32, y: f32) {
        self.send(Command::PointerClicked { x, y });
    }

    pub fn has_pending(&self) -> bool {
        self.pending.borrow().has_pending()
    }

    pub(crate) fn take_ready(&self, now_ms: f64, debounce_ms: u64) -> ReadyUpdates {
        self.pending.borrow_mut().take_ready(now_ms, debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, ControlHandle, PendingUpdates};
    use crate::options::OptionsPatch;

    fn font_size(size: f32) -> OptionsPatch {
        OptionsPatch {
            font_size: Some(size),
            ..Default::default()
        }
    }

    #[test]
    fn patches_coalesce_and_wait_for_quiet_window() {
        let mut pending = PendingUpdates::default();
        pending.push(Command::SetOptions(font_size(10.0)));
        pending.push(Command::SetOptions(OptionsPatch {
            animation_speed: Some(3.0),
            ..Default::default()
        }));
        pending.push(Command::SetOptions(font_size(14.0)));

        assert!(pending.take_ready(0.0, 100).patch.is_none());
        assert!(pending.take_ready(50.0, 100).patch.is_none());
        let patch = pending
            .take_ready(100.0, 100)
            .patch
            .expect("patch released after window");
        assert_eq!(patch.font_size, Some(14.0));
        assert_eq!(patch.animation_speed, Some(3.0));
        assert!(!pending.has_pending());
    }

    #[test]
    fn new_edit_restarts_debounce_window() {
        let mut pending = PendingUpdates::default();
        pending.push(Command::SetOptions(font_size(10.0)));
        assert!(pending.take_ready(0.0, 100).patch.is_none());
        pending.push(Command::SetOptions(font_size(11.0)));
        assert!(pending.take_ready(120.0, 100).patch.is_none());
        assert!(pending.take_ready(219.0, 100).patch.is_none());
        assert!(pending.take_ready(220.0, 100).patch.is_some());
    }

    #[test]
    fn zero_debounce_flushes_on_next_boundary() {
        let handle = ControlHandle::new();
        handle.set_options(font_size(9.0));
        handle.resize(10, 10);
        handle.resize(20, 30);
        handle.start_animation();
        handle.stop_animation();

        let ready = handle.take_ready(5.0, 0);
        assert!(ready.patch.is_some());
        assert_eq!(ready.resize.map(|size| (size.width, size.height)), Some((20, 30)));
        assert_eq!(ready.animating, Some(false));
        assert!(!handle.has_pending());
        assert!(handle.take_ready(6.0, 0).is_empty());
    }

    #[test]
    fn click_survives_a_later_move_until_drained() {
        let handle = ControlHandle::new();
        handle.pointer_clicked(1.0, 2.0);
        handle.pointer_moved(3.0, 4.0);
        let pointer = handle.take_ready(0.0, 0).pointer.expect("pointer");
        assert!(pointer.clicked);
        assert_eq!((pointer.x, pointer.y), (3.0, 4.0));
    }
}
