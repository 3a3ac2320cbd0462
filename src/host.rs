use crate::config::CrossingConfig;
use crate::crossing::{LineRoute, compute_crossings};
use crate::error::LoadError;
use crate::figure::{EventListener, FigureEvent, FigureRef};
use crate::geometry::{Bounds, Point};
use log::debug;
use std::collections::HashMap;
use std::rc::Rc;

/// The container a document is loaded into.
///
/// Figures and lines live in separate registries: `get_figure` never returns a
/// line, which is why group restore falls back to `get_line`.
pub trait GraphHost {
    fn get_figure(&self, id: &str) -> Option<FigureRef>;

    fn get_line(&self, id: &str) -> Option<FigureRef>;

    fn add(&mut self, figure: FigureRef) -> Result<(), LoadError>;

    /// Every registered line, in registration order.
    fn get_lines(&self) -> Vec<FigureRef>;

    fn calculate_connection_intersection(&mut self) -> Result<(), LoadError>;

    fn show_decoration(&mut self);

    /// Drops cached path geometry on every line and asks it to repaint.
    fn invalidate_line_paths(&mut self) -> Result<(), LoadError> {
        for line in self.get_lines() {
            let mut line = line
                .try_borrow_mut()
                .map_err(|_| LoadError::Busy("line".to_string()))?;
            if let Some(connectable) = line.as_connectable_mut() {
                connectable.invalidate_path();
            }
            line.repaint();
        }
        Ok(())
    }
}

/// In-memory host with insertion-ordered registries.
#[derive(Default)]
pub struct Canvas {
    figures: Vec<FigureRef>,
    figure_index: HashMap<String, usize>,
    lines: Vec<FigureRef>,
    line_index: HashMap<String, usize>,
    listeners: Vec<EventListener>,
    crossing: CrossingConfig,
    lines_to_repaint: Vec<String>,
    decoration_passes: usize,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crossing_config(crossing: CrossingConfig) -> Self {
        Self {
            crossing,
            ..Self::default()
        }
    }

    /// Subscribes to events of every figure, present and future.
    ///
    /// During a load, events reach listeners only after the loader has released
    /// the figures involved, so a listener may borrow them.
    pub fn on_event(&mut self, listener: impl Fn(&FigureEvent) + 'static) {
        let listener: EventListener = Rc::new(listener);
        for figure in self.figures.iter().chain(self.lines.iter()) {
            if let Ok(mut figure) = figure.try_borrow_mut() {
                figure.core_mut().add_listener(listener.clone());
            }
        }
        self.listeners.push(listener);
    }

    pub fn figures(&self) -> &[FigureRef] {
        &self.figures
    }

    pub fn lines(&self) -> &[FigureRef] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.figures.len() + self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn crossing_config(&self) -> &CrossingConfig {
        &self.crossing
    }

    pub fn lines_to_repaint(&self) -> &[String] {
        &self.lines_to_repaint
    }

    pub fn decoration_passes(&self) -> usize {
        self.decoration_passes
    }

    fn bounds_of(&self, id: &str) -> Option<Bounds> {
        let idx = self.figure_index.get(id)?;
        let figure = self.figures[*idx].try_borrow().ok()?;
        Some(figure.bounds())
    }

    /// Source port, bend points, target port. Empty while an end is unresolved.
    fn route_of(&self, line: &FigureRef) -> Result<Vec<Point>, LoadError> {
        let line = line
            .try_borrow()
            .map_err(|_| LoadError::Busy("line".to_string()))?;
        let Some(connectable) = line.as_connectable() else {
            return Ok(Vec::new());
        };
        let (Some(source), Some(target)) = (connectable.source(), connectable.target()) else {
            return Ok(Vec::new());
        };
        let (Some(source_bounds), Some(target_bounds)) =
            (self.bounds_of(&source.owner), self.bounds_of(&target.owner))
        else {
            return Ok(Vec::new());
        };
        let mut route = Vec::with_capacity(connectable.vertices().len() + 2);
        route.push(source.position(&source_bounds));
        route.extend_from_slice(connectable.vertices());
        route.push(target.position(&target_bounds));
        Ok(route)
    }
}

impl GraphHost for Canvas {
    fn get_figure(&self, id: &str) -> Option<FigureRef> {
        self.figure_index.get(id).map(|idx| self.figures[*idx].clone())
    }

    fn get_line(&self, id: &str) -> Option<FigureRef> {
        self.line_index.get(id).map(|idx| self.lines[*idx].clone())
    }

    fn add(&mut self, figure: FigureRef) -> Result<(), LoadError> {
        let (id, is_line) = {
            let mut entity = figure
                .try_borrow_mut()
                .map_err(|_| LoadError::Busy("figure".to_string()))?;
            let id = entity.id().to_string();
            if id.is_empty() {
                return Err(LoadError::MalformedRecord("figure has no id".to_string()));
            }
            if self.figure_index.contains_key(&id) || self.line_index.contains_key(&id) {
                return Err(LoadError::DuplicateId(id));
            }
            for listener in &self.listeners {
                entity.core_mut().add_listener(listener.clone());
            }
            (id, entity.as_connectable().is_some())
        };
        if is_line {
            self.line_index.insert(id, self.lines.len());
            self.lines.push(figure);
        } else {
            self.figure_index.insert(id, self.figures.len());
            self.figures.push(figure);
        }
        Ok(())
    }

    fn get_lines(&self) -> Vec<FigureRef> {
        self.lines.clone()
    }

    fn calculate_connection_intersection(&mut self) -> Result<(), LoadError> {
        let mut routes = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let id = line
                .try_borrow()
                .map_err(|_| LoadError::Busy("line".to_string()))?
                .id()
                .to_string();
            routes.push(LineRoute {
                id,
                points: self.route_of(line)?,
            });
        }
        let crossings = compute_crossings(&routes, &self.crossing);
        let total: usize = crossings.iter().map(Vec::len).sum::<usize>() / 2;
        for ((line, route), crossings) in self.lines.iter().zip(routes).zip(crossings) {
            let mut line = line
                .try_borrow_mut()
                .map_err(|_| LoadError::Busy(route.id.clone()))?;
            if let Some(connectable) = line.as_connectable_mut() {
                connectable.set_route(route.points);
                connectable.set_crossings(crossings);
            }
        }
        debug!(lines = self.lines.len(), crossings = total; "Connection intersections recalculated");
        Ok(())
    }

    fn show_decoration(&mut self) {
        self.decoration_passes += 1;
        debug!(pass = self.decoration_passes; "Showing line decorations");
    }

    fn invalidate_line_paths(&mut self) -> Result<(), LoadError> {
        for line in &self.lines {
            let mut line = line
                .try_borrow_mut()
                .map_err(|_| LoadError::Busy("line".to_string()))?;
            if let Some(connectable) = line.as_connectable_mut() {
                connectable.invalidate_path();
            }
            line.repaint();
        }
        self.lines_to_repaint = self
            .lines
            .iter()
            .filter_map(|line| line.try_borrow().ok().map(|line| line.id().to_string()))
            .collect();
        Ok(())
    }
}
