use super::{Style, color_attr};
use crate::error::AttributeError;
use crate::figure::{Figure, FigureCore, FigureRef, Port, PortTable, figure_ref};
use crate::record::Record;
use crate::registry::TypeRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Oval,
    Circle,
    Rectangle,
}

impl ShapeKind {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Oval => "Oval",
            Self::Circle => "Circle",
            Self::Rectangle => "Rectangle",
        }
    }

    fn default_size(self) -> (f32, f32) {
        match self {
            Self::Oval => (60.0, 40.0),
            Self::Circle => (40.0, 40.0),
            Self::Rectangle => (50.0, 50.0),
        }
    }
}

/// Node figure with a fill style and named ports.
#[derive(Debug)]
pub struct Shape {
    kind: ShapeKind,
    core: FigureCore,
    style: Style,
    ports: PortTable,
}

impl Shape {
    pub fn new(kind: ShapeKind) -> Self {
        let (width, height) = kind.default_size();
        Self {
            kind,
            core: FigureCore::with_size(width, height),
            style: Style::default(),
            ports: PortTable::between(),
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn style(&self) -> &Style {
        &self.style
    }
}

impl Figure for Shape {
    fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    fn core(&self) -> &FigureCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FigureCore {
        &mut self.core
    }

    fn set_persistent_attributes(&mut self, record: &Record) -> Result<(), AttributeError> {
        self.core.restore(record)?;
        if self.kind == ShapeKind::Circle {
            // Circles keep one diameter; `width` wins when both are stored.
            let mut bounds = self.core.bounds();
            let diameter = match record.f32_attr("width")? {
                Some(width) => width,
                None => bounds.width.max(bounds.height),
            };
            bounds.width = diameter;
            bounds.height = diameter;
            self.core.set_bounds(bounds);
        }
        self.style.restore(record)?;
        self.ports.restore(record)?;
        Ok(())
    }

    fn persistent_attributes(&self) -> Record {
        let mut record = self.core.persist(self.type_name(), true);
        self.style.persist(&mut record);
        record.insert("ports", self.ports.to_value());
        record
    }

    fn port(&self, name: &str) -> Option<Port> {
        self.ports.port(self.core.id(), name)
    }

    fn ports(&self) -> Vec<Port> {
        self.ports.ports(self.core.id())
    }
}

/// Text figure. Has no ports unless the record declares some.
#[derive(Debug)]
pub struct Label {
    core: FigureCore,
    style: Style,
    ports: PortTable,
    text: String,
    font_size: f32,
    font_color: Option<String>,
    bold: bool,
}

impl Label {
    pub fn new() -> Self {
        Self {
            core: FigureCore::with_size(40.0, 20.0),
            style: Style {
                color: None,
                stroke: 0.0,
                ..Style::default()
            },
            ports: PortTable::empty(),
            text: String::new(),
            font_size: 12.0,
            font_color: Some("#080808".to_string()),
            bold: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

impl Figure for Label {
    fn type_name(&self) -> &str {
        "Label"
    }

    fn core(&self) -> &FigureCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FigureCore {
        &mut self.core
    }

    fn set_persistent_attributes(&mut self, record: &Record) -> Result<(), AttributeError> {
        self.core.restore(record)?;
        self.style.restore(record)?;
        self.ports.restore(record)?;
        if let Some(text) = record.str_attr("text")? {
            self.text = text.to_string();
        }
        if let Some(font_size) = record.f32_attr("fontSize")? {
            if font_size <= 0.0 {
                return Err(AttributeError::invalid("fontSize", font_size, "must be positive"));
            }
            self.font_size = font_size;
        }
        if let Some(font_color) = color_attr(record, "fontColor")? {
            self.font_color = Some(font_color);
        }
        if let Some(bold) = record.bool_attr("bold")? {
            self.bold = bold;
        }
        Ok(())
    }

    fn persistent_attributes(&self) -> Record {
        let mut record = self.core.persist(self.type_name(), true);
        self.style.persist(&mut record);
        record.insert("text", self.text.as_str());
        record.insert("fontSize", self.font_size);
        if let Some(font_color) = &self.font_color {
            record.insert("fontColor", font_color.as_str());
        }
        record.insert("bold", self.bold);
        if !self.ports.is_empty() {
            record.insert("ports", self.ports.to_value());
        }
        record
    }

    fn port(&self, name: &str) -> Option<Port> {
        self.ports.port(self.core.id(), name)
    }

    fn ports(&self) -> Vec<Port> {
        self.ports.ports(self.core.id())
    }
}

fn oval() -> FigureRef {
    figure_ref(Shape::new(ShapeKind::Oval))
}

fn circle() -> FigureRef {
    figure_ref(Shape::new(ShapeKind::Circle))
}

fn rectangle() -> FigureRef {
    figure_ref(Shape::new(ShapeKind::Rectangle))
}

fn label() -> FigureRef {
    figure_ref(Label::new())
}

pub(super) fn register(registry: &mut TypeRegistry) {
    registry.register("Oval", oval);
    registry.register("draw2d.shape.basic.Oval", oval);
    registry.register("Circle", circle);
    registry.register("draw2d.shape.basic.Circle", circle);
    registry.register("Rectangle", rectangle);
    registry.register("draw2d.shape.basic.Rectangle", rectangle);
    registry.register("Label", label);
    registry.register("draw2d.shape.basic.Label", label);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use serde_json::json;

    #[test]
    fn shape_restores_geometry_style_and_ports() {
        let mut shape = Shape::new(ShapeKind::Rectangle);
        let record = Record::new("Rectangle", "B")
            .with("x", 50)
            .with("y", 50)
            .with("width", 30)
            .with("height", 30)
            .with("bgColor", "#00a8f0")
            .with("somethingElse", json!({"ignored": true}));
        shape.set_persistent_attributes(&record).unwrap();
        assert_eq!(shape.id(), "B");
        assert_eq!(shape.bounds(), Bounds::new(50.0, 50.0, 30.0, 30.0));
        assert_eq!(shape.style().bg_color.as_deref(), Some("#00a8f0"));
        let input = shape.port("input0").unwrap();
        assert_eq!(input.owner, "B");
        assert!(shape.port("output1").is_none());
    }

    #[test]
    fn circle_keeps_equal_sides() {
        let mut circle = Shape::new(ShapeKind::Circle);
        let record = Record::new("Circle", "c").with("width", 30).with("height", 80);
        circle.set_persistent_attributes(&record).unwrap();
        assert_eq!(circle.bounds().width, 30.0);
        assert_eq!(circle.bounds().height, 30.0);
    }

    #[test]
    fn label_restores_text_and_rejects_bad_font() {
        let mut label = Label::new();
        let record = Record::new("Label", "L").with("text", "hello").with("fontSize", 16);
        label.set_persistent_attributes(&record).unwrap();
        assert_eq!(label.text(), "hello");
        assert_eq!(label.font_size(), 16.0);
        assert!(label.port("input0").is_none());

        let bad = Record::new("Label", "L").with("fontSize", 0);
        assert!(label.set_persistent_attributes(&bad).is_err());
    }

    #[test]
    fn persisted_attributes_restore_an_equal_shape() {
        let mut original = Shape::new(ShapeKind::Oval);
        let record = Record::new("Oval", "A")
            .with("x", 10)
            .with("y", 10)
            .with("userData", json!({"tag": 1}));
        original.set_persistent_attributes(&record).unwrap();

        let mut copy = Shape::new(ShapeKind::Oval);
        copy.set_persistent_attributes(&original.persistent_attributes())
            .unwrap();
        assert_eq!(copy.persistent_attributes(), original.persistent_attributes());
    }
}
