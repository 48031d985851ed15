//! Channel-based spatial transforms and their algebra.
//!
//! A [`Transform`] is a set of optional scalar channels. An absent channel reads
//! as its default: `0` for everything except the scale channels, which read as `1`.

pub mod css;
pub mod matrix;
pub mod processor;

pub use matrix::ComputedMatrix;
pub use processor::{RenderStats, TransformProcessor};

use serde::{Deserialize, Serialize};

use crate::AnimationError;

/// One named scalar component of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    TranslateX,
    TranslateY,
    TranslateZ,
    RotateX,
    RotateY,
    RotateZ,
    ScaleX,
    ScaleY,
    ScaleZ,
    SkewX,
    SkewY,
    Perspective,
}

impl Channel {
    pub const ALL: [Channel; 12] = [
        Channel::TranslateX,
        Channel::TranslateY,
        Channel::TranslateZ,
        Channel::RotateX,
        Channel::RotateY,
        Channel::RotateZ,
        Channel::ScaleX,
        Channel::ScaleY,
        Channel::ScaleZ,
        Channel::SkewX,
        Channel::SkewY,
        Channel::Perspective,
    ];

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::TranslateX => "translateX",
            Self::TranslateY => "translateY",
            Self::TranslateZ => "translateZ",
            Self::RotateX => "rotateX",
            Self::RotateY => "rotateY",
            Self::RotateZ => "rotateZ",
            Self::ScaleX => "scaleX",
            Self::ScaleY => "scaleY",
            Self::ScaleZ => "scaleZ",
            Self::SkewX => "skewX",
            Self::SkewY => "skewY",
            Self::Perspective => "perspective",
        }
    }

    #[inline]
    pub fn is_scale(&self) -> bool {
        matches!(self, Self::ScaleX | Self::ScaleY | Self::ScaleZ)
    }

    /// Value an absent channel reads as
    #[inline]
    pub fn default_value(&self) -> f64 {
        if self.is_scale() {
            1.0
        } else {
            0.0
        }
    }
}

/// Spatial transform made of optional channels.
///
/// Translations are in pixels, rotations and skews in degrees, perspective is a
/// distance in pixels (`0` or absent means no perspective).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transform {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translate_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translate_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translate_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skew_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skew_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perspective: Option<f64>,
}

impl Transform {
    /// Transform with no channels set (reads as identity)
    pub fn new() -> Self {
        Self::default()
    }

    /// Every channel explicitly set to its default
    pub fn identity() -> Self {
        let mut t = Self::new();
        for channel in Channel::ALL {
            t.set(channel, channel.default_value());
        }
        t
    }

    pub fn from_translation(x: f64, y: f64) -> Self {
        Self::new()
            .with(Channel::TranslateX, x)
            .with(Channel::TranslateY, y)
    }

    pub fn from_scale(scale: f64) -> Self {
        Self::new()
            .with(Channel::ScaleX, scale)
            .with(Channel::ScaleY, scale)
    }

    pub fn from_rotation(degrees: f64) -> Self {
        Self::new().with(Channel::RotateZ, degrees)
    }

    #[inline]
    fn slot(&self, channel: Channel) -> &Option<f64> {
        match channel {
            Channel::TranslateX => &self.translate_x,
            Channel::TranslateY => &self.translate_y,
            Channel::TranslateZ => &self.translate_z,
            Channel::RotateX => &self.rotate_x,
            Channel::RotateY => &self.rotate_y,
            Channel::RotateZ => &self.rotate_z,
            Channel::ScaleX => &self.scale_x,
            Channel::ScaleY => &self.scale_y,
            Channel::ScaleZ => &self.scale_z,
            Channel::SkewX => &self.skew_x,
            Channel::SkewY => &self.skew_y,
            Channel::Perspective => &self.perspective,
        }
    }

    #[inline]
    fn slot_mut(&mut self, channel: Channel) -> &mut Option<f64> {
        match channel {
            Channel::TranslateX => &mut self.translate_x,
            Channel::TranslateY => &mut self.translate_y,
            Channel::TranslateZ => &mut self.translate_z,
            Channel::RotateX => &mut self.rotate_x,
            Channel::RotateY => &mut self.rotate_y,
            Channel::RotateZ => &mut self.rotate_z,
            Channel::ScaleX => &mut self.scale_x,
            Channel::ScaleY => &mut self.scale_y,
            Channel::ScaleZ => &mut self.scale_z,
            Channel::SkewX => &mut self.skew_x,
            Channel::SkewY => &mut self.skew_y,
            Channel::Perspective => &mut self.perspective,
        }
    }

    /// Raw channel value, `None` when absent
    #[inline]
    pub fn get(&self, channel: Channel) -> Option<f64> {
        *self.slot(channel)
    }

    /// Channel value with the absent-channel default applied
    #[inline]
    pub fn value(&self, channel: Channel) -> f64 {
        self.get(channel).unwrap_or_else(|| channel.default_value())
    }

    #[inline]
    pub fn set(&mut self, channel: Channel, value: f64) {
        *self.slot_mut(channel) = Some(value);
    }

    #[inline]
    pub fn clear(&mut self, channel: Channel) {
        *self.slot_mut(channel) = None;
    }

    #[inline]
    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self.set(channel, value);
        self
    }

    /// Channels that carry a value
    pub fn channels(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        Channel::ALL
            .into_iter()
            .filter_map(move |c| self.get(c).map(|v| (c, v)))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        Channel::ALL.iter().all(|c| self.get(*c).is_none())
    }

    /// True when every channel reads as its default
    pub fn is_identity(&self) -> bool {
        Channel::ALL
            .iter()
            .all(|c| self.value(*c) == c.default_value())
    }

    /// Reject NaN or infinite channels before they reach an element
    pub fn validate_finite(&self) -> Result<(), AnimationError> {
        match self.channels().find(|(_, value)| !value.is_finite()) {
            Some((channel, value)) => Err(AnimationError::invalid_config(
                channel.name(),
                value,
                "must be finite",
            )),
            None => Ok(()),
        }
    }

    /// Copy of `self` where every channel set in `other` is overwritten
    pub fn merged_with(&self, other: &Transform) -> Transform {
        let mut out = self.clone();
        for (channel, value) in other.channels() {
            out.set(channel, value);
        }
        out
    }

    /// Blend toward `end` by `progress`.
    ///
    /// Channels present on either side are blended; a channel missing on one
    /// side reads as its default. Scale channels follow smoothstep
    /// (`3p² - 2p³`) instead of the linear ramp used for everything else.
    pub fn interpolate(&self, end: &Transform, progress: f64) -> Transform {
        let mut out = Transform::new();
        for channel in Channel::ALL {
            if self.get(channel).is_none() && end.get(channel).is_none() {
                continue;
            }
            let from = self.value(channel);
            let to = end.value(channel);
            let weight = if channel.is_scale() {
                smoothstep(progress)
            } else {
                progress
            };
            out.set(channel, from + (to - from) * weight);
        }
        out
    }
}

/// Hermite smoothstep `3p² - 2p³`
#[inline]
pub fn smoothstep(p: f64) -> f64 {
    p * p * (3.0 - 2.0 * p)
}
