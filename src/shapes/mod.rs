//! Built-in figure types.
//!
//! Every type module exposes a `register` function that adds its factories to a
//! [`TypeRegistry`]; [`register`] wires all of them and is what
//! `TypeRegistry::builtin` runs at startup.

mod basic;
mod connection;
mod group;

pub use basic::{Label, Shape, ShapeKind};
pub use connection::Connection;
pub use group::{Group, GroupKind};

use crate::error::AttributeError;
use crate::record::Record;
use crate::registry::TypeRegistry;
use once_cell::sync::Lazy;
use regex::Regex;

static COLOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(#[0-9a-fA-F]{3}|#[0-9a-fA-F]{6}|#[0-9a-fA-F]{8}|rgba?\(\s*\d{1,3}\s*,\s*\d{1,3}\s*,\s*\d{1,3}\s*(,\s*(0|1|0?\.\d+)\s*)?\)|[a-zA-Z]+)$",
    )
    .unwrap()
});

pub fn register(registry: &mut TypeRegistry) {
    basic::register(registry);
    group::register(registry);
    connection::register(registry);
}

fn color_attr(record: &Record, key: &str) -> Result<Option<String>, AttributeError> {
    let Some(color) = record.str_attr(key)? else {
        return Ok(None);
    };
    let color = color.trim();
    if !COLOR_RE.is_match(color) {
        return Err(AttributeError::invalid(key, color, "not a color"));
    }
    Ok(Some(color.to_string()))
}

/// Fill and outline settings shared by the vector shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub bg_color: Option<String>,
    pub color: Option<String>,
    pub stroke: f32,
    pub radius: f32,
    pub dasharray: Option<String>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            bg_color: None,
            color: Some("#1B1B1B".to_string()),
            stroke: 1.0,
            radius: 0.0,
            dasharray: None,
        }
    }
}

impl Style {
    pub fn restore(&mut self, record: &Record) -> Result<(), AttributeError> {
        if let Some(bg_color) = color_attr(record, "bgColor")? {
            self.bg_color = Some(bg_color);
        }
        if let Some(color) = color_attr(record, "color")? {
            self.color = Some(color);
        }
        if let Some(stroke) = record.f32_attr("stroke")? {
            if stroke < 0.0 {
                return Err(AttributeError::invalid("stroke", stroke, "must not be negative"));
            }
            self.stroke = stroke;
        }
        if let Some(radius) = record.f32_attr("radius")? {
            self.radius = radius.max(0.0);
        }
        if let Some(dasharray) = record.str_attr("dasharray")? {
            self.dasharray = Some(dasharray.to_string());
        }
        Ok(())
    }

    pub fn persist(&self, record: &mut Record) {
        if let Some(bg_color) = &self.bg_color {
            record.insert("bgColor", bg_color.as_str());
        }
        if let Some(color) = &self.color {
            record.insert("color", color.as_str());
        }
        record.insert("stroke", self.stroke);
        record.insert("radius", self.radius);
        if let Some(dasharray) = &self.dasharray {
            record.insert("dasharray", dasharray.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_validated() {
        let record = Record::new("Oval", "A")
            .with("bgColor", "#ffcc00")
            .with("color", "rgba(10, 20, 30, 0.5)");
        let mut style = Style::default();
        style.restore(&record).unwrap();
        assert_eq!(style.bg_color.as_deref(), Some("#ffcc00"));
        assert_eq!(style.color.as_deref(), Some("rgba(10, 20, 30, 0.5)"));

        let bad = Record::new("Oval", "A").with("bgColor", "#ggg");
        assert!(Style::default().restore(&bad).is_err());
    }

    #[test]
    fn style_round_trips_through_a_record() {
        let mut style = Style::default();
        style.stroke = 2.5;
        style.dasharray = Some("- ".to_string());
        let mut record = Record::new("Rectangle", "B");
        style.persist(&mut record);
        let mut restored = Style::default();
        restored.restore(&record).unwrap();
        assert_eq!(restored, style);
    }
}
