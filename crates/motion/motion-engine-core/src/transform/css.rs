//! String encoding of transforms.
//!
//! Serialization always uses the canonical function order
//! `perspective, translate3d, rotateX, rotateY, rotateZ, scale3d, skewX, skewY`
//! and only emits groups that carry at least one channel.

use std::fmt::Write;
use std::str::FromStr;

use super::{Channel, Transform};
use crate::error::AnimationError;

impl Transform {
    /// Encode as a CSS-style transform string. An empty transform encodes as `none`.
    pub fn to_css(&self) -> String {
        let mut out = String::new();

        if let Some(p) = self.perspective.filter(|p| *p > 0.0) {
            push_fn(&mut out, "perspective", &[(p, "px")]);
        }
        if self.translate_x.is_some() || self.translate_y.is_some() || self.translate_z.is_some() {
            push_fn(
                &mut out,
                "translate3d",
                &[
                    (self.value(Channel::TranslateX), "px"),
                    (self.value(Channel::TranslateY), "px"),
                    (self.value(Channel::TranslateZ), "px"),
                ],
            );
        }
        for (channel, name) in [
            (Channel::RotateX, "rotateX"),
            (Channel::RotateY, "rotateY"),
            (Channel::RotateZ, "rotateZ"),
        ] {
            if let Some(v) = self.get(channel) {
                push_fn(&mut out, name, &[(v, "deg")]);
            }
        }
        if self.scale_x.is_some() || self.scale_y.is_some() || self.scale_z.is_some() {
            push_fn(
                &mut out,
                "scale3d",
                &[
                    (self.value(Channel::ScaleX), ""),
                    (self.value(Channel::ScaleY), ""),
                    (self.value(Channel::ScaleZ), ""),
                ],
            );
        }
        for (channel, name) in [(Channel::SkewX, "skewX"), (Channel::SkewY, "skewY")] {
            if let Some(v) = self.get(channel) {
                push_fn(&mut out, name, &[(v, "deg")]);
            }
        }

        if out.is_empty() {
            "none".to_string()
        } else {
            out
        }
    }
}

fn push_fn(out: &mut String, name: &str, args: &[(f64, &str)]) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(name);
    out.push('(');
    for (i, (value, unit)) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{value}{unit}");
    }
    out.push(')');
}

/// Split `name(a, b) name2(c)` into `(name, [args])` pairs.
pub(crate) fn split_functions(input: &str) -> Result<Vec<(String, Vec<String>)>, AnimationError> {
    let mut functions = Vec::new();
    let mut rest = input.trim();
    while !rest.is_empty() {
        let open = rest.find('(').ok_or_else(|| AnimationError::TransformParse {
            reason: format!("expected '(' in '{rest}'"),
        })?;
        let close = rest.find(')').ok_or_else(|| AnimationError::TransformParse {
            reason: format!("unterminated function in '{rest}'"),
        })?;
        if close < open {
            return Err(AnimationError::TransformParse {
                reason: format!("unbalanced parentheses in '{rest}'"),
            });
        }
        let name = rest[..open].trim().to_string();
        if name.is_empty() {
            return Err(AnimationError::TransformParse {
                reason: "missing function name".to_string(),
            });
        }
        let args = rest[open + 1..close]
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        functions.push((name, args));
        rest = rest[close + 1..].trim_start();
    }
    Ok(functions)
}

/// Parse a length (`px` or unitless) or a plain number.
fn parse_length(arg: &str) -> Result<f64, AnimationError> {
    let raw = arg.strip_suffix("px").unwrap_or(arg);
    parse_number(raw)
}

/// Parse an angle and return it in degrees.
fn parse_angle(arg: &str) -> Result<f64, AnimationError> {
    if let Some(v) = arg.strip_suffix("deg") {
        parse_number(v)
    } else if let Some(v) = arg.strip_suffix("grad") {
        Ok(parse_number(v)? * 0.9)
    } else if let Some(v) = arg.strip_suffix("rad") {
        Ok(parse_number(v)?.to_degrees())
    } else if let Some(v) = arg.strip_suffix("turn") {
        Ok(parse_number(v)? * 360.0)
    } else {
        parse_number(arg)
    }
}

pub(crate) fn parse_number(arg: &str) -> Result<f64, AnimationError> {
    let value: f64 = arg
        .trim()
        .parse()
        .map_err(|_| AnimationError::TransformParse {
            reason: format!("invalid number '{arg}'"),
        })?;
    if !value.is_finite() {
        return Err(AnimationError::TransformParse {
            reason: format!("non-finite number '{arg}'"),
        });
    }
    Ok(value)
}

fn expect_args(name: &str, args: &[String], min: usize, max: usize) -> Result<(), AnimationError> {
    if args.len() < min || args.len() > max {
        return Err(AnimationError::TransformParse {
            reason: format!("{name} expects {min}..={max} arguments, got {}", args.len()),
        });
    }
    Ok(())
}

impl FromStr for Transform {
    type Err = AnimationError;

    /// Parse the function list produced by [`Transform::to_css`] (and the common
    /// shorthands). Later functions overwrite channels set by earlier ones.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut t = Transform::new();
        if trimmed.is_empty() || trimmed == "none" {
            return Ok(t);
        }

        for (name, args) in split_functions(trimmed)? {
            match name.as_str() {
                "perspective" => {
                    expect_args(&name, &args, 1, 1)?;
                    t.set(Channel::Perspective, parse_length(&args[0])?);
                }
                "translate" => {
                    expect_args(&name, &args, 1, 2)?;
                    t.set(Channel::TranslateX, parse_length(&args[0])?);
                    let y = args.get(1).map(|a| parse_length(a)).transpose()?;
                    t.set(Channel::TranslateY, y.unwrap_or(0.0));
                }
                "translate3d" => {
                    expect_args(&name, &args, 3, 3)?;
                    t.set(Channel::TranslateX, parse_length(&args[0])?);
                    t.set(Channel::TranslateY, parse_length(&args[1])?);
                    t.set(Channel::TranslateZ, parse_length(&args[2])?);
                }
                "translateX" | "translateY" | "translateZ" => {
                    expect_args(&name, &args, 1, 1)?;
                    let channel = match name.as_str() {
                        "translateX" => Channel::TranslateX,
                        "translateY" => Channel::TranslateY,
                        _ => Channel::TranslateZ,
                    };
                    t.set(channel, parse_length(&args[0])?);
                }
                "rotate" | "rotateZ" => {
                    expect_args(&name, &args, 1, 1)?;
                    t.set(Channel::RotateZ, parse_angle(&args[0])?);
                }
                "rotateX" => {
                    expect_args(&name, &args, 1, 1)?;
                    t.set(Channel::RotateX, parse_angle(&args[0])?);
                }
                "rotateY" => {
                    expect_args(&name, &args, 1, 1)?;
                    t.set(Channel::RotateY, parse_angle(&args[0])?);
                }
                "scale" => {
                    expect_args(&name, &args, 1, 2)?;
                    let x = parse_number(&args[0])?;
                    let y = args.get(1).map(|a| parse_number(a)).transpose()?;
                    t.set(Channel::ScaleX, x);
                    t.set(Channel::ScaleY, y.unwrap_or(x));
                }
                "scale3d" => {
                    expect_args(&name, &args, 3, 3)?;
                    t.set(Channel::ScaleX, parse_number(&args[0])?);
                    t.set(Channel::ScaleY, parse_number(&args[1])?);
                    t.set(Channel::ScaleZ, parse_number(&args[2])?);
                }
                "scaleX" | "scaleY" | "scaleZ" => {
                    expect_args(&name, &args, 1, 1)?;
                    let channel = match name.as_str() {
                        "scaleX" => Channel::ScaleX,
                        "scaleY" => Channel::ScaleY,
                        _ => Channel::ScaleZ,
                    };
                    t.set(channel, parse_number(&args[0])?);
                }
                "skew" => {
                    expect_args(&name, &args, 1, 2)?;
                    t.set(Channel::SkewX, parse_angle(&args[0])?);
                    let y = args.get(1).map(|a| parse_angle(a)).transpose()?;
                    t.set(Channel::SkewY, y.unwrap_or(0.0));
                }
                "skewX" => {
                    expect_args(&name, &args, 1, 1)?;
                    t.set(Channel::SkewX, parse_angle(&args[0])?);
                }
                "skewY" => {
                    expect_args(&name, &args, 1, 1)?;
                    t.set(Channel::SkewY, parse_angle(&args[0])?);
                }
                other => {
                    return Err(AnimationError::TransformParse {
                        reason: format!("unsupported transform function '{other}'"),
                    })
                }
            }
        }
        Ok(t)
    }
}
