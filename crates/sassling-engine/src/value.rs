//! Flat value-exchange format for engine/host function calls.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! This mirrors the tagged-union value shape synchronous C engines pass to
//! custom function hooks: a small closed set of variants with no host types
//! inside. Values are deep-copied across the boundary in both directions, so
//! neither side ever holds a reference into the other's memory.

use std::fmt;

/// Separator used when a list value is serialized back into CSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListSeparator {
    #[default]
    Comma,
    Space,
}

impl ListSeparator {
    fn as_str(self) -> &'static str {
        match self {
            ListSeparator::Comma => ", ",
            ListSeparator::Space => " ",
        }
    }
}

/// A single engine-side value.
///
/// `Error` is special: a host callback that fails is converted into
/// `Value::Error` by the bridge, and engines turn it into an ordinary
/// compile error rather than crashing.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Number {
        value: f64,
        unit: String,
    },
    String {
        text: String,
        quoted: bool,
    },
    Color {
        r: f64,
        g: f64,
        b: f64,
        a: f64,
    },
    List {
        items: Vec<Value>,
        separator: ListSeparator,
        bracketed: bool,
    },
    Map(Vec<(Value, Value)>),
    Error(String),
    Warning(String),
}

impl Value {
    /// Shorthand for an unquoted string value.
    pub fn string(text: impl Into<String>) -> Self {
        Value::String {
            text: text.into(),
            quoted: false,
        }
    }

    /// Shorthand for a unitless number.
    pub fn number(value: f64) -> Self {
        Value::Number {
            value,
            unit: String::new(),
        }
    }

    /// Shorthand for a number with a unit, e.g. `Value::number_with_unit(12.0, "px")`.
    pub fn number_with_unit(value: f64, unit: impl Into<String>) -> Self {
        Value::Number {
            value,
            unit: unit.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Serialize the value as CSS text, rounding numbers to `precision`
    /// fractional digits and trimming trailing zeros.
    pub fn to_css(&self, precision: usize) -> String {
        let mut out = String::new();
        self.write_css(&mut out, precision);
        out
    }

    fn write_css(&self, out: &mut String, precision: usize) {
        match self {
            Value::Null => {}
            Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number { value, unit } => {
                out.push_str(&format_number(*value, precision));
                out.push_str(unit);
            }
            Value::String { text, quoted } => {
                if *quoted {
                    out.push('"');
                    out.push_str(text);
                    out.push('"');
                } else {
                    out.push_str(text);
                }
            }
            Value::Color { r, g, b, a } => {
                if (*a - 1.0).abs() < f64::EPSILON {
                    out.push_str(&format!(
                        "#{:02x}{:02x}{:02x}",
                        clamp_channel(*r),
                        clamp_channel(*g),
                        clamp_channel(*b)
                    ));
                } else {
                    out.push_str(&format!(
                        "rgba({}, {}, {}, {})",
                        clamp_channel(*r),
                        clamp_channel(*g),
                        clamp_channel(*b),
                        format_number(*a, precision)
                    ));
                }
            }
            Value::List {
                items,
                separator,
                bracketed,
            } => {
                if *bracketed {
                    out.push('[');
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(separator.as_str());
                    }
                    item.write_css(out, precision);
                }
                if *bracketed {
                    out.push(']');
                }
            }
            Value::Map(entries) => {
                // Maps are not valid CSS; engines reject them at the call
                // site. Serialized here only for diagnostics.
                out.push('(');
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    k.write_css(out, precision);
                    out.push_str(": ");
                    v.write_css(out, precision);
                }
                out.push(')');
            }
            Value::Error(msg) | Value::Warning(msg) => out.push_str(msg),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css(5))
    }
}

fn clamp_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Format a number with at most `precision` fractional digits, trimming
/// trailing zeros and a dangling decimal point.
pub fn format_number(value: f64, precision: usize) -> String {
    let mut s = format!("{:.*}", precision, value);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    // Avoid "-0"
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting_trims_zeros() {
        assert_eq!(format_number(42.0, 5), "42");
        assert_eq!(format_number(1.5, 5), "1.5");
        assert_eq!(format_number(1.0 / 3.0, 5), "0.33333");
        assert_eq!(format_number(1.0 / 3.0, 2), "0.33");
    }

    #[test]
    fn test_number_with_unit() {
        let v = Value::number_with_unit(42.0, "px");
        assert_eq!(v.to_css(5), "42px");
    }

    #[test]
    fn test_quoted_and_unquoted_strings() {
        assert_eq!(Value::string("sans-serif").to_css(5), "sans-serif");
        let quoted = Value::String {
            text: "Fira Sans".to_string(),
            quoted: true,
        };
        assert_eq!(quoted.to_css(5), "\"Fira Sans\"");
    }

    #[test]
    fn test_list_serialization() {
        let list = Value::List {
            items: vec![Value::number(1.0), Value::number(2.0)],
            separator: ListSeparator::Comma,
            bracketed: false,
        };
        assert_eq!(list.to_css(5), "1, 2");

        let spaced = Value::List {
            items: vec![Value::string("a"), Value::string("b")],
            separator: ListSeparator::Space,
            bracketed: true,
        };
        assert_eq!(spaced.to_css(5), "[a b]");
    }

    #[test]
    fn test_opaque_color_serializes_as_hex() {
        let c = Value::Color {
            r: 255.0,
            g: 0.0,
            b: 128.0,
            a: 1.0,
        };
        assert_eq!(c.to_css(5), "#ff0080");
    }
}
