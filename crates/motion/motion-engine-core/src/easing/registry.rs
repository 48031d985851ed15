use std::cell::Cell;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::rc::Rc;

use log::warn;
use lru::LruCache;

use super::bezier::{CubicBezier, CSS_CURVES};
use super::functions::PENNER_CURVES;
use super::{Easing, EasingFunction, ResolvedEasing, SpringEasing};
use crate::AnimationError;

/// Registry of named easing functions plus the bezier compiler cache
pub struct EasingLibrary {
    functions: HashMap<String, Rc<dyn EasingFunction>>,
    bezier_cache: LruCache<String, Rc<CubicBezier>>,
    fallbacks: Cell<u64>,
}

impl EasingLibrary {
    /// Create a library holding the built-in curves
    pub fn new(bezier_cache_size: usize) -> Self {
        let size = NonZeroUsize::new(bezier_cache_size).unwrap_or(NonZeroUsize::MIN);
        let mut library = Self {
            functions: HashMap::new(),
            bezier_cache: LruCache::new(size),
            fallbacks: Cell::new(0),
        };
        library.register_builtin_functions();
        library
    }

    fn register_builtin_functions(&mut self) {
        for curve in PENNER_CURVES {
            self.register(curve);
        }
        for (name, curve) in CSS_CURVES {
            self.functions.insert(name.to_string(), Rc::new(curve));
        }
        self.register(SpringEasing::default());
    }

    /// Register (or replace) a function under its own name
    pub fn register(&mut self, function: impl EasingFunction + 'static) {
        self.functions
            .insert(function.name().to_string(), Rc::new(function));
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<Rc<dyn EasingFunction>> {
        self.functions.get(name).cloned()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Ease `t` with the named function, clamped to `[0, 1]`.
    ///
    /// Unknown names, failures and non-finite output return `t` unchanged.
    pub fn apply(&self, name: &str, t: f64) -> f64 {
        let Some(function) = self.functions.get(name) else {
            warn!("unknown easing '{name}'; using linear");
            self.record_fallback();
            return t;
        };
        match function.ease(t) {
            Ok(v) if v.is_finite() => v.clamp(0.0, 1.0),
            Ok(v) => {
                warn!("easing '{name}' produced non-finite value {v}; using linear");
                self.record_fallback();
                t
            }
            Err(err) => {
                warn!("easing '{name}' failed: {err}; using linear");
                self.record_fallback();
                t
            }
        }
    }

    /// Compile (or fetch from cache) a bezier curve
    pub fn compile_bezier(&mut self, points: [f64; 4]) -> Result<Rc<CubicBezier>, AnimationError> {
        let curve = CubicBezier::from_points(points)?;
        let key = curve.key();
        if let Some(cached) = self.bezier_cache.get(&key) {
            return Ok(Rc::clone(cached));
        }
        let compiled = Rc::new(curve);
        self.bezier_cache.put(key, Rc::clone(&compiled));
        Ok(compiled)
    }

    /// Physics easing for the given spring constants
    pub fn spring(
        &self,
        stiffness: f64,
        friction: f64,
        mass: f64,
    ) -> Result<SpringEasing, AnimationError> {
        SpringEasing::new(stiffness, friction, mass)
    }

    /// Bind a configured easing for an animator.
    ///
    /// Unknown names resolve to linear with a warning; invalid bezier points are
    /// a construction error.
    pub fn resolve(&mut self, easing: &Easing) -> Result<ResolvedEasing, AnimationError> {
        match easing {
            Easing::Named(name) => match self.get(name) {
                Some(function) => Ok(ResolvedEasing::clamped(function)),
                None => {
                    warn!("unknown easing '{name}'; using linear");
                    self.record_fallback();
                    Ok(ResolvedEasing::linear())
                }
            },
            Easing::Bezier { bezier } => {
                let curve: Rc<dyn EasingFunction> = self.compile_bezier(*bezier)?;
                Ok(ResolvedEasing::raw(curve))
            }
        }
    }

    #[inline]
    fn record_fallback(&self) {
        self.fallbacks.set(self.fallbacks.get() + 1);
    }

    /// How many evaluations fell back to linear
    #[inline]
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.get()
    }

    #[inline]
    pub fn bezier_cache_len(&self) -> usize {
        self.bezier_cache.len()
    }
}

impl Default for EasingLibrary {
    fn default() -> Self {
        Self::new(64)
    }
}
