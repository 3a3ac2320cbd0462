use crate::crossing::Crossing;
use crate::error::AttributeError;
use crate::geometry::{Bounds, Point};
use crate::record::{Endpoint, Record};
use serde::Serialize;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a live figure. The host owns the registry entry, the loader
/// and its result set hold clones.
pub type FigureRef = Rc<RefCell<dyn Figure>>;

pub type EventListener = Rc<dyn Fn(&FigureEvent)>;

pub fn figure_ref<F: Figure + 'static>(figure: F) -> FigureRef {
    Rc::new(RefCell::new(figure))
}

/// Lifecycle of a figure produced by the loader.
///
/// `Building` figures buffer their events and swallow repaints; the activation
/// phase moves every figure to `Active` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructionState {
    #[default]
    Building,
    Active,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FigureEvent {
    Connected {
        connection: String,
        endpoint: Endpoint,
        port: Port,
    },
    Assigned {
        group: String,
        member: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Input,
    Output,
    Hybrid,
}

impl PortKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Hybrid => "hybrid",
        }
    }

    /// Accepts both the short form (`input`) and port class names such as
    /// `draw2d.InputPort`.
    pub fn from_token(token: &str) -> Option<Self> {
        let lower = token.to_ascii_lowercase();
        let tail = lower.rsplit('.').next().unwrap_or(&lower);
        match tail {
            "input" | "inputport" => Some(Self::Input),
            "output" | "outputport" => Some(Self::Output),
            "hybrid" | "hybridport" => Some(Self::Hybrid),
            _ => None,
        }
    }

    fn default_anchor(self) -> (f32, f32) {
        match self {
            Self::Input => (0.0, 0.5),
            Self::Output => (1.0, 0.5),
            Self::Hybrid => (0.5, 0.5),
        }
    }
}

/// Events taken out of a core together with the listeners that should see them.
///
/// Dispatching happens outside the figure's `RefCell`, so listeners are free to
/// borrow the figure that raised the event.
#[must_use]
#[derive(Default)]
pub struct EventBatch {
    listeners: Vec<EventListener>,
    events: Vec<FigureEvent>,
}

impl EventBatch {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn dispatch(self) {
        for event in &self.events {
            for listener in &self.listeners {
                listener(event);
            }
        }
    }
}

/// A resolved attachment point: which figure owns it and where it sits,
/// relative to the owner's bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Port {
    pub owner: String,
    pub name: String,
    pub kind: PortKind,
    pub rel_x: f32,
    pub rel_y: f32,
}

impl Port {
    pub fn position(&self, owner_bounds: &Bounds) -> Point {
        owner_bounds.anchor(self.rel_x, self.rel_y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    pub name: String,
    pub kind: PortKind,
    pub rel_x: f32,
    pub rel_y: f32,
}

impl PortSpec {
    pub fn new(name: &str, kind: PortKind) -> Self {
        let (rel_x, rel_y) = kind.default_anchor();
        Self {
            name: name.to_string(),
            kind,
            rel_x,
            rel_y,
        }
    }
}

/// Named ports of a node figure.
#[derive(Debug, Clone, PartialEq)]
pub struct PortTable {
    ports: Vec<PortSpec>,
}

impl PortTable {
    pub fn empty() -> Self {
        Self { ports: Vec::new() }
    }

    /// One input on the left edge and one output on the right edge.
    pub fn between() -> Self {
        Self {
            ports: vec![
                PortSpec::new("input0", PortKind::Input),
                PortSpec::new("output0", PortKind::Output),
            ],
        }
    }

    pub fn add(&mut self, spec: PortSpec) {
        self.ports.retain(|existing| existing.name != spec.name);
        self.ports.push(spec);
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn port(&self, owner: &str, name: &str) -> Option<Port> {
        self.ports
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| Self::materialize(owner, spec))
    }

    pub fn ports(&self, owner: &str) -> Vec<Port> {
        self.ports
            .iter()
            .map(|spec| Self::materialize(owner, spec))
            .collect()
    }

    fn materialize(owner: &str, spec: &PortSpec) -> Port {
        Port {
            owner: owner.to_string(),
            name: spec.name.clone(),
            kind: spec.kind,
            rel_x: spec.rel_x,
            rel_y: spec.rel_y,
        }
    }

    /// Replaces the table when the record carries a `ports` array.
    pub fn restore(&mut self, record: &Record) -> Result<(), AttributeError> {
        let Some(items) = record.array_attr("ports")? else {
            return Ok(());
        };
        let mut ports = Vec::with_capacity(items.len());
        for item in items {
            let Some(object) = item.as_object() else {
                return Err(AttributeError::wrong_type("ports", "array of objects", item));
            };
            let name = object
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| AttributeError::invalid("ports", item, "port without a name"))?;
            let kind_token = object
                .get("kind")
                .or_else(|| object.get("port"))
                .and_then(Value::as_str)
                .unwrap_or("hybrid");
            let kind = PortKind::from_token(kind_token).ok_or_else(|| {
                AttributeError::invalid("ports", kind_token, "unknown port kind")
            })?;
            let mut spec = PortSpec::new(name, kind);
            if let Some(rel_x) = object.get("x").and_then(Value::as_f64) {
                spec.rel_x = rel_x as f32;
            }
            if let Some(rel_y) = object.get("y").and_then(Value::as_f64) {
                spec.rel_y = rel_y as f32;
            }
            ports.retain(|existing: &PortSpec| existing.name != spec.name);
            ports.push(spec);
        }
        self.ports = ports;
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        Value::Array(
            self.ports
                .iter()
                .map(|spec| {
                    json!({
                        "name": spec.name,
                        "kind": spec.kind.as_str(),
                        "x": spec.rel_x,
                        "y": spec.rel_y,
                    })
                })
                .collect(),
        )
    }
}

/// State every figure carries regardless of its type.
pub struct FigureCore {
    id: String,
    bounds: Bounds,
    alpha: f32,
    angle: f32,
    css_class: Option<String>,
    user_data: Option<Value>,
    composite: Option<String>,
    state: ConstructionState,
    repaint_deferred: bool,
    repaints: usize,
    held: bool,
    pending: Vec<FigureEvent>,
    listeners: Vec<EventListener>,
}

impl FigureCore {
    pub fn new() -> Self {
        Self {
            id: String::new(),
            bounds: Bounds::default(),
            alpha: 1.0,
            angle: 0.0,
            css_class: None,
            user_data: None,
            composite: None,
            state: ConstructionState::Building,
            repaint_deferred: false,
            repaints: 0,
            held: false,
            pending: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn with_size(width: f32, height: f32) -> Self {
        let mut core = Self::new();
        core.bounds.width = width;
        core.bounds.height = height;
        core
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn css_class(&self) -> Option<&str> {
        self.css_class.as_deref()
    }

    pub fn user_data(&self) -> Option<&Value> {
        self.user_data.as_ref()
    }

    pub fn composite(&self) -> Option<&str> {
        self.composite.as_deref()
    }

    pub fn set_composite(&mut self, group: Option<&str>) {
        self.composite = group.map(str::to_string);
    }

    pub fn state(&self) -> ConstructionState {
        self.state
    }

    pub fn is_building(&self) -> bool {
        self.state == ConstructionState::Building
    }

    pub fn repaint_count(&self) -> usize {
        self.repaints
    }

    pub fn repaint_deferred(&self) -> bool {
        self.repaint_deferred
    }

    pub fn pending_events(&self) -> &[FigureEvent] {
        &self.pending
    }

    /// Puts a figure handed in from outside back into construction.
    pub fn mark_building(&mut self) {
        self.state = ConstructionState::Building;
    }

    pub fn add_listener(&mut self, listener: EventListener) {
        self.listeners.push(listener);
    }

    /// Returns `false` while the figure is still being built.
    pub fn request_repaint(&mut self) -> bool {
        if self.is_building() {
            self.repaint_deferred = true;
            return false;
        }
        self.repaints += 1;
        true
    }

    pub fn fire(&mut self, event: FigureEvent) {
        if self.is_building() || self.held {
            self.pending.push(event);
            return;
        }
        for listener in &self.listeners {
            listener(&event);
        }
    }

    /// Moves the figure to `Active` and delivers buffered events in the order
    /// they were raised. A second call is a no-op.
    pub fn activate(&mut self) -> bool {
        match self.take_activation() {
            Some(buffered) => {
                buffered.dispatch();
                true
            }
            None => false,
        }
    }

    /// Like [`FigureCore::activate`], but hands the buffered events back
    /// instead of delivering them.
    pub fn take_activation(&mut self) -> Option<EventBatch> {
        if !self.is_building() {
            return None;
        }
        self.state = ConstructionState::Active;
        self.repaint_deferred = false;
        Some(self.take_events())
    }

    /// Buffers events of an active figure until [`FigureCore::release_events`].
    pub fn hold_events(&mut self) {
        self.held = true;
    }

    /// Events of a building figure stay buffered for activation.
    pub fn release_events(&mut self) -> EventBatch {
        self.held = false;
        if self.is_building() {
            return EventBatch::default();
        }
        self.take_events()
    }

    fn take_events(&mut self) -> EventBatch {
        EventBatch {
            listeners: self.listeners.clone(),
            events: std::mem::take(&mut self.pending),
        }
    }

    pub fn restore(&mut self, record: &Record) -> Result<(), AttributeError> {
        if let Some(id) = record.str_attr("id")? {
            self.id = id.to_string();
        }
        if let Some(x) = record.f32_attr("x")? {
            self.bounds.x = x;
        }
        if let Some(y) = record.f32_attr("y")? {
            self.bounds.y = y;
        }
        if let Some(width) = record.f32_attr("width")? {
            self.bounds.width = non_negative("width", width)?;
        }
        if let Some(height) = record.f32_attr("height")? {
            self.bounds.height = non_negative("height", height)?;
        }
        if let Some(alpha) = record.f32_attr("alpha")? {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(AttributeError::invalid("alpha", alpha, "must be within 0..=1"));
            }
            self.alpha = alpha;
        }
        if let Some(angle) = record.f32_attr("angle")? {
            self.angle = angle;
        }
        if let Some(css_class) = record.str_attr("cssClass")? {
            self.css_class = Some(css_class.to_string());
        }
        if let Some(user_data) = record.get("userData") {
            self.user_data = Some(user_data.clone());
        }
        Ok(())
    }

    /// `type`, `id`, geometry and the generic keys, in writer order.
    pub fn persist(&self, type_name: &str, with_bounds: bool) -> Record {
        let mut record = Record::new(type_name, &self.id);
        if with_bounds {
            record.insert("x", self.bounds.x);
            record.insert("y", self.bounds.y);
            record.insert("width", self.bounds.width);
            record.insert("height", self.bounds.height);
        }
        record.insert("alpha", self.alpha);
        record.insert("angle", self.angle);
        if let Some(css_class) = &self.css_class {
            record.insert("cssClass", css_class.as_str());
        }
        if let Some(user_data) = &self.user_data {
            record.insert("userData", user_data.clone());
        }
        if let Some(composite) = &self.composite {
            record.insert("composite", composite.as_str());
        }
        record
    }
}

impl Default for FigureCore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FigureCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FigureCore")
            .field("id", &self.id)
            .field("bounds", &self.bounds)
            .field("composite", &self.composite)
            .field("state", &self.state)
            .field("repaints", &self.repaints)
            .field("pending", &self.pending.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

fn non_negative(key: &str, value: f32) -> Result<f32, AttributeError> {
    if value < 0.0 || !value.is_finite() {
        return Err(AttributeError::invalid(key, value, "must be a finite, non-negative number"));
    }
    Ok(value)
}

/// A live, graph-resident figure.
pub trait Figure: fmt::Debug {
    fn type_name(&self) -> &str;

    fn core(&self) -> &FigureCore;

    fn core_mut(&mut self) -> &mut FigureCore;

    /// Restores state from a persisted record. Keys the figure does not know
    /// are ignored; known keys with the wrong shape are errors.
    fn set_persistent_attributes(&mut self, record: &Record) -> Result<(), AttributeError>;

    fn persistent_attributes(&self) -> Record;

    fn id(&self) -> &str {
        self.core().id()
    }

    fn bounds(&self) -> Bounds {
        self.core().bounds()
    }

    fn port(&self, _name: &str) -> Option<Port> {
        None
    }

    fn ports(&self) -> Vec<Port> {
        Vec::new()
    }

    fn repaint(&mut self) -> bool {
        self.core_mut().request_repaint()
    }

    fn as_connectable(&self) -> Option<&dyn Connectable> {
        None
    }

    fn as_connectable_mut(&mut self) -> Option<&mut dyn Connectable> {
        None
    }

    fn as_composite(&self) -> Option<&dyn Composite> {
        None
    }

    fn as_composite_mut(&mut self) -> Option<&mut dyn Composite> {
        None
    }
}

/// Figures with a source/target endpoint pair.
pub trait Connectable {
    fn set_source(&mut self, port: Port);

    fn set_target(&mut self, port: Port);

    fn source(&self) -> Option<&Port>;

    fn target(&self) -> Option<&Port>;

    /// Intermediate bend points between source and target.
    fn vertices(&self) -> &[Point] {
        &[]
    }

    fn route(&self) -> &[Point];

    fn set_route(&mut self, route: Vec<Point>);

    fn crossings(&self) -> &[Crossing];

    fn set_crossings(&mut self, crossings: Vec<Crossing>);

    fn path(&self) -> Option<&str>;

    fn invalidate_path(&mut self);
}

/// Figures that can hold other figures as group members.
pub trait Composite {
    fn assign_figure(&mut self, member: &mut dyn Figure);

    fn members(&self) -> &[String];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_listener() -> (EventListener, Rc<RefCell<Vec<FigureEvent>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let listener: EventListener = Rc::new(move |event: &FigureEvent| {
            sink.borrow_mut().push(event.clone());
        });
        (listener, log)
    }

    fn assigned(member: &str) -> FigureEvent {
        FigureEvent::Assigned {
            group: "G".to_string(),
            member: member.to_string(),
        }
    }

    #[test]
    fn building_core_buffers_events_until_activation() {
        let (listener, log) = recording_listener();
        let mut core = FigureCore::new();
        core.add_listener(listener);
        core.fire(assigned("a"));
        core.fire(assigned("b"));
        assert!(log.borrow().is_empty());
        assert_eq!(core.pending_events().len(), 2);

        assert!(core.activate());
        assert_eq!(*log.borrow(), vec![assigned("a"), assigned("b")]);
        assert!(core.pending_events().is_empty());

        core.fire(assigned("c"));
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn repaint_is_deferred_while_building() {
        let mut core = FigureCore::new();
        assert!(!core.request_repaint());
        assert!(core.repaint_deferred());
        assert_eq!(core.repaint_count(), 0);
        core.activate();
        assert!(!core.repaint_deferred());
        assert!(core.request_repaint());
        assert_eq!(core.repaint_count(), 1);
        assert!(!core.activate());
    }

    #[test]
    fn held_events_are_handed_back_in_order() {
        let (listener, log) = recording_listener();
        let mut core = FigureCore::new();
        core.add_listener(listener);
        let buffered = core.take_activation().unwrap();
        assert!(buffered.is_empty());
        assert!(core.take_activation().is_none());

        core.hold_events();
        core.fire(assigned("a"));
        core.fire(assigned("b"));
        assert!(log.borrow().is_empty());
        let released = core.release_events();
        assert_eq!(released.len(), 2);
        released.dispatch();
        assert_eq!(*log.borrow(), vec![assigned("a"), assigned("b")]);

        core.fire(assigned("c"));
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn releasing_a_building_core_keeps_events_for_activation() {
        let (listener, log) = recording_listener();
        let mut core = FigureCore::new();
        core.add_listener(listener);
        core.hold_events();
        core.fire(assigned("a"));
        assert!(core.release_events().is_empty());
        assert_eq!(core.pending_events().len(), 1);
        core.activate();
        assert_eq!(*log.borrow(), vec![assigned("a")]);
    }

    #[test]
    fn restore_validates_geometry() {
        let mut core = FigureCore::new();
        let record = Record::new("Oval", "A")
            .with("x", 10)
            .with("y", 20)
            .with("width", 30)
            .with("height", 40)
            .with("cssClass", "node");
        core.restore(&record).unwrap();
        assert_eq!(core.id(), "A");
        assert_eq!(core.bounds(), Bounds::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(core.css_class(), Some("node"));

        let bad = Record::new("Oval", "A").with("width", -1);
        assert!(core.restore(&bad).is_err());
        let bad = Record::new("Oval", "A").with("alpha", 3);
        assert!(core.restore(&bad).is_err());
    }

    #[test]
    fn port_table_restores_from_records() {
        let mut table = PortTable::between();
        let record = Record::new("Rectangle", "B").with(
            "ports",
            json!([
                {"name": "in", "port": "draw2d.InputPort"},
                {"name": "out", "kind": "output", "x": 1.0, "y": 0.25},
            ]),
        );
        table.restore(&record).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.port("B", "input0").is_none());
        let out = table.port("B", "out").unwrap();
        assert_eq!(out.kind, PortKind::Output);
        assert_eq!(out.rel_y, 0.25);
        assert_eq!(out.owner, "B");
        assert_eq!(table.port("B", "in").unwrap().kind, PortKind::Input);
    }

    #[test]
    fn port_table_rejects_unknown_kinds() {
        let mut table = PortTable::empty();
        let record =
            Record::new("Rectangle", "B").with("ports", json!([{"name": "p", "kind": "sideways"}]));
        assert!(table.restore(&record).is_err());
    }
}
