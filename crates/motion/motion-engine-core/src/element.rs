//! Visual element capability consumed by the engine.
//!
//! The engine never owns elements: hosts hand out shared handles implementing
//! [`Element`]. All methods take `&self` because hosts keep their own interior
//! state (a DOM node, a scene-graph entry, ...).

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::ids::ElementKey;
use crate::transform::Transform;

/// Axis-aligned rectangle in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Strict overlap test; touching edges do not intersect
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    #[inline]
    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Visible surface dimensions supplied by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

/// Hint telling the renderer an element is actively transforming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderHint {
    Transform,
    TransformAndOpacity,
}

impl RenderHint {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::TransformAndOpacity => "transform, opacity",
        }
    }
}

/// Rendering target driven by the engine.
pub trait Element {
    /// Stable identity for caches
    fn key(&self) -> ElementKey;

    /// Whether the element is still part of a live surface
    fn is_attached(&self) -> bool;

    /// Computed transform as the host reports it: `none`, `matrix(...)` or `matrix3d(...)`
    fn computed_transform(&self) -> Option<String>;

    /// Commit a transform function list (see [`Transform::to_css`])
    fn set_transform(&self, value: &str);

    /// Drop all transform styling
    fn clear_transform(&self);

    fn set_render_hint(&self, hint: Option<RenderHint>);

    /// Override the host transition; `None` restores the host default
    fn set_transition(&self, value: Option<&str>);

    /// Force pending style writes to become visible synchronously
    fn flush_layout(&self);

    fn set_opacity(&self, opacity: f64);

    /// Current bounding box in viewport coordinates
    fn bounding_rect(&self) -> Rect;
}

/// Shared element handle
pub type ElementRef = Rc<dyn Element>;

static NEXT_ELEMENT_KEY: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique element key for hosts that have no natural id
pub fn next_element_key() -> ElementKey {
    ElementKey(NEXT_ELEMENT_KEY.fetch_add(1, Ordering::Relaxed))
}

/// In-memory rendering target.
///
/// Stores every style write and reports the composed matrix of the last
/// committed transform, the same way a browser reports computed style.
#[derive(Debug)]
pub struct HeadlessElement {
    key: ElementKey,
    attached: Cell<bool>,
    layout: Cell<Rect>,
    transform: RefCell<Option<String>>,
    computed_override: RefCell<Option<String>>,
    render_hint: Cell<Option<RenderHint>>,
    transition: RefCell<Option<String>>,
    opacity: Cell<f64>,
    transform_writes: Cell<usize>,
    layout_flushes: Cell<usize>,
}

impl HeadlessElement {
    pub fn new(layout: Rect) -> Rc<Self> {
        Rc::new(Self {
            key: next_element_key(),
            attached: Cell::new(true),
            layout: Cell::new(layout),
            transform: RefCell::new(None),
            computed_override: RefCell::new(None),
            render_hint: Cell::new(None),
            transition: RefCell::new(None),
            opacity: Cell::new(1.0),
            transform_writes: Cell::new(0),
            layout_flushes: Cell::new(0),
        })
    }

    /// 100×100 box at the viewport origin
    pub fn boxed() -> Rc<Self> {
        Self::new(Rect::new(0.0, 0.0, 100.0, 100.0))
    }

    pub fn detach(&self) {
        self.attached.set(false);
    }

    pub fn attach(&self) {
        self.attached.set(true);
    }

    pub fn set_layout(&self, rect: Rect) {
        self.layout.set(rect);
    }

    /// Force what `computed_transform` reports, e.g. to emulate a host quirk
    pub fn override_computed(&self, value: Option<&str>) {
        *self.computed_override.borrow_mut() = value.map(str::to_string);
    }

    /// Last committed transform string
    pub fn transform_css(&self) -> Option<String> {
        self.transform.borrow().clone()
    }

    /// Last committed transform, parsed back into channels
    pub fn current_transform(&self) -> Transform {
        self.transform
            .borrow()
            .as_deref()
            .and_then(|css| css.parse().ok())
            .unwrap_or_default()
    }

    pub fn render_hint(&self) -> Option<RenderHint> {
        self.render_hint.get()
    }

    pub fn transition(&self) -> Option<String> {
        self.transition.borrow().clone()
    }

    pub fn opacity(&self) -> f64 {
        self.opacity.get()
    }

    pub fn transform_writes(&self) -> usize {
        self.transform_writes.get()
    }

    pub fn layout_flushes(&self) -> usize {
        self.layout_flushes.get()
    }
}

impl Element for HeadlessElement {
    fn key(&self) -> ElementKey {
        self.key
    }

    fn is_attached(&self) -> bool {
        self.attached.get()
    }

    fn computed_transform(&self) -> Option<String> {
        if let Some(forced) = self.computed_override.borrow().clone() {
            return Some(forced);
        }
        Some(self.current_transform().to_matrix_css())
    }

    fn set_transform(&self, value: &str) {
        *self.transform.borrow_mut() = Some(value.to_string());
        self.transform_writes.set(self.transform_writes.get() + 1);
    }

    fn clear_transform(&self) {
        *self.transform.borrow_mut() = None;
        self.transform_writes.set(self.transform_writes.get() + 1);
    }

    fn set_render_hint(&self, hint: Option<RenderHint>) {
        self.render_hint.set(hint);
    }

    fn set_transition(&self, value: Option<&str>) {
        *self.transition.borrow_mut() = value.map(str::to_string);
    }

    fn flush_layout(&self) {
        self.layout_flushes.set(self.layout_flushes.get() + 1);
    }

    fn set_opacity(&self, opacity: f64) {
        self.opacity.set(opacity);
    }

    fn bounding_rect(&self) -> Rect {
        let t = self.current_transform();
        self.layout.get().translated(
            t.value(crate::transform::Channel::TranslateX),
            t.value(crate::transform::Channel::TranslateY),
        )
    }
}
