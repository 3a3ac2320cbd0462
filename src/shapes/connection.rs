use super::color_attr;
use crate::crossing::Crossing;
use crate::error::AttributeError;
use crate::figure::{Connectable, Figure, FigureCore, FigureEvent, FigureRef, Port, figure_ref};
use crate::geometry::{Point, points_to_path};
use crate::record::{Endpoint, PortRef, Record};
use crate::registry::TypeRegistry;
use serde_json::{Value, json};

/// A line between two ports, optionally bent through `vertex` points.
#[derive(Debug)]
pub struct Connection {
    core: FigureCore,
    source: Option<Port>,
    target: Option<Port>,
    vertices: Vec<Point>,
    route: Vec<Point>,
    crossings: Vec<Crossing>,
    path: Option<String>,
    stroke: f32,
    color: Option<String>,
    outline_stroke: f32,
    outline_color: Option<String>,
    dasharray: Option<String>,
    router: Option<String>,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            core: FigureCore::new(),
            source: None,
            target: None,
            vertices: Vec::new(),
            route: Vec::new(),
            crossings: Vec::new(),
            path: None,
            stroke: 1.0,
            color: Some("#129CE4".to_string()),
            outline_stroke: 0.0,
            outline_color: None,
            dasharray: None,
            router: None,
        }
    }

    fn attach(&mut self, endpoint: Endpoint, port: Port) {
        self.core.fire(FigureEvent::Connected {
            connection: self.core.id().to_string(),
            endpoint,
            port: port.clone(),
        });
        match endpoint {
            Endpoint::Source => self.source = Some(port),
            Endpoint::Target => self.target = Some(port),
        }
        self.path = None;
    }

    fn restore_vertices(&mut self, record: &Record) -> Result<(), AttributeError> {
        let (key, items) = match record.array_attr("vertex")? {
            Some(items) => ("vertex", items),
            None => match record.array_attr("vertices")? {
                Some(items) => ("vertices", items),
                None => return Ok(()),
            },
        };
        let mut vertices = Vec::with_capacity(items.len());
        for item in items {
            let x = item.get("x").and_then(Value::as_f64);
            let y = item.get("y").and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) => vertices.push(Point::new(x as f32, y as f32)),
                _ => return Err(AttributeError::invalid(key, item, "expected {x, y}")),
            }
        }
        self.vertices = vertices;
        self.path = None;
        Ok(())
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Figure for Connection {
    fn type_name(&self) -> &str {
        "Connection"
    }

    fn core(&self) -> &FigureCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FigureCore {
        &mut self.core
    }

    // `source` and `target` are wired by the loader before this runs.
    fn set_persistent_attributes(&mut self, record: &Record) -> Result<(), AttributeError> {
        self.core.restore(record)?;
        if let Some(stroke) = record.f32_attr("stroke")? {
            self.stroke = stroke.max(0.0);
        }
        if let Some(color) = color_attr(record, "color")? {
            self.color = Some(color);
        }
        if let Some(outline_stroke) = record.f32_attr("outlineStroke")? {
            self.outline_stroke = outline_stroke.max(0.0);
        }
        if let Some(outline_color) = color_attr(record, "outlineColor")? {
            self.outline_color = Some(outline_color);
        }
        if let Some(dasharray) = record.str_attr("dasharray")? {
            self.dasharray = Some(dasharray.to_string());
        }
        if let Some(router) = record.str_attr("router")? {
            self.router = Some(router.to_string());
        }
        self.restore_vertices(record)
    }

    fn persistent_attributes(&self) -> Record {
        let mut record = self.core.persist(self.type_name(), false);
        record.insert("stroke", self.stroke);
        if let Some(color) = &self.color {
            record.insert("color", color.as_str());
        }
        record.insert("outlineStroke", self.outline_stroke);
        if let Some(outline_color) = &self.outline_color {
            record.insert("outlineColor", outline_color.as_str());
        }
        if let Some(dasharray) = &self.dasharray {
            record.insert("dasharray", dasharray.as_str());
        }
        if let Some(router) = &self.router {
            record.insert("router", router.as_str());
        }
        if !self.vertices.is_empty() {
            let vertex: Vec<Value> = self
                .vertices
                .iter()
                .map(|point| json!({"x": point.x, "y": point.y}))
                .collect();
            record.insert("vertex", vertex);
        }
        if let Some(source) = &self.source {
            record.insert("source", PortRef::new(&source.owner, &source.name));
        }
        if let Some(target) = &self.target {
            record.insert("target", PortRef::new(&target.owner, &target.name));
        }
        record
    }

    fn repaint(&mut self) -> bool {
        if !self.core.request_repaint() {
            return false;
        }
        if self.path.is_none() && self.route.len() >= 2 {
            self.path = Some(points_to_path(&self.route));
        }
        true
    }

    fn as_connectable(&self) -> Option<&dyn Connectable> {
        Some(self)
    }

    fn as_connectable_mut(&mut self) -> Option<&mut dyn Connectable> {
        Some(self)
    }
}

impl Connectable for Connection {
    fn set_source(&mut self, port: Port) {
        self.attach(Endpoint::Source, port);
    }

    fn set_target(&mut self, port: Port) {
        self.attach(Endpoint::Target, port);
    }

    fn source(&self) -> Option<&Port> {
        self.source.as_ref()
    }

    fn target(&self) -> Option<&Port> {
        self.target.as_ref()
    }

    fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    fn route(&self) -> &[Point] {
        &self.route
    }

    fn set_route(&mut self, route: Vec<Point>) {
        self.route = route;
    }

    fn crossings(&self) -> &[Crossing] {
        &self.crossings
    }

    fn set_crossings(&mut self, crossings: Vec<Crossing>) {
        self.crossings = crossings;
    }

    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn invalidate_path(&mut self) {
        self.path = None;
    }
}

fn connection() -> FigureRef {
    figure_ref(Connection::new())
}

pub(super) fn register(registry: &mut TypeRegistry) {
    registry.register("Connection", connection);
    registry.register("draw2d.Connection", connection);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::PortKind;

    fn port(owner: &str, name: &str) -> Port {
        Port {
            owner: owner.to_string(),
            name: name.to_string(),
            kind: PortKind::Hybrid,
            rel_x: 0.5,
            rel_y: 0.5,
        }
    }

    #[test]
    fn endpoints_persist_as_port_refs() {
        let mut line = Connection::new();
        line.core_mut().set_id("C1");
        line.set_source(port("A", "output0"));
        line.set_target(port("B", "input0"));
        let record = line.persistent_attributes();
        assert_eq!(record.get("source"), Some(&json!({"node": "A", "port": "output0"})));
        assert_eq!(record.get("target"), Some(&json!({"node": "B", "port": "input0"})));
        assert!(!record.contains_key("x"));
    }

    #[test]
    fn vertices_accept_both_keys_and_reject_garbage() {
        let mut line = Connection::new();
        let record = Record::new("Connection", "C")
            .with("vertices", json!([{"x": 1, "y": 2}, {"x": 3, "y": 4}]));
        line.set_persistent_attributes(&record).unwrap();
        assert_eq!(line.vertices(), [Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);

        let bad = Record::new("Connection", "C").with("vertex", json!([{"x": 1}]));
        assert!(line.set_persistent_attributes(&bad).is_err());
    }

    #[test]
    fn repaint_rebuilds_the_invalidated_path() {
        let mut line = Connection::new();
        line.set_route(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert!(!line.repaint());
        assert!(line.path().is_none());

        line.core_mut().activate();
        assert!(line.repaint());
        assert_eq!(line.path(), Some("M 0.00 0.00 L 10.00 0.00"));

        line.invalidate_path();
        assert!(line.path().is_none());
        line.repaint();
        assert!(line.path().is_some());
    }
}
