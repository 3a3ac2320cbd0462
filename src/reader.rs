use crate::config::{GroupFailurePolicy, ReaderConfig};
use crate::error::{LoadError, json_kind};
use crate::figure::{FigureRef, Port};
use crate::host::GraphHost;
use crate::record::{Endpoint, IntoDocument, PortRef, Record, SOURCE_KEY, TARGET_KEY};
use crate::registry::{Factory, TypeRegistry};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::{Duration, Instant};

pub type RecordHook = Box<dyn Fn(&Record) -> Option<FigureRef>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Instantiate,
    Group,
}

/// A record the loader could not honour.
#[derive(Debug)]
pub struct Diagnostic {
    /// Position of the record in the document.
    pub index: usize,
    pub phase: Phase,
    pub id: String,
    pub type_name: String,
    pub record: Value,
    pub error: LoadError,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    /// Figures created by this load, in construction order.
    pub figures: Vec<FigureRef>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn figure(&self, id: &str) -> Option<&FigureRef> {
        self.figures
            .iter()
            .find(|figure| figure.try_borrow().is_ok_and(|figure| figure.id() == id))
    }

    fn reject(&mut self, index: usize, phase: Phase, record: Value, error: LoadError) {
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<missing>")
            .to_string();
        let type_name = record
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("<missing>")
            .to_string();
        match phase {
            Phase::Instantiate => error!(
                index, id = id.as_str(), type_name = type_name.as_str();
                "Unable to instantiate figure type '{type_name}' with id '{id}' during unmarshal by {}. Skipping figure: {error}",
                Reader::NAME
            ),
            Phase::Group => warn!(
                index, id = id.as_str();
                "Unable to restore group assignment of '{id}': {error}"
            ),
        }
        debug!(index; "Rejected record {record}");
        self.diagnostics.push(Diagnostic {
            index,
            phase,
            id,
            type_name,
            record,
            error,
        });
    }
}

#[derive(Debug, Default)]
struct PhaseTimings {
    create: Duration,
    restore: Duration,
    add: Duration,
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Loads documents into a [`GraphHost`].
///
/// A `Reader` resolves type names through its [`TypeRegistry`] and memoizes each
/// resolved factory for its own lifetime, so it is worth reusing one reader for
/// many documents.
pub struct Reader {
    registry: TypeRegistry,
    config: ReaderConfig,
    constructors: RefCell<HashMap<String, Factory>>,
    record_hook: Option<RecordHook>,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    pub const NAME: &'static str = "figload::Reader";

    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::builtin())
    }

    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self {
            registry,
            config: ReaderConfig::default(),
            constructors: RefCell::new(HashMap::new()),
            record_hook: None,
        }
    }

    /// Applies `config`, registering its type aliases.
    pub fn with_config(mut self, config: ReaderConfig) -> Result<Self, LoadError> {
        for (alias, target) in &config.type_aliases {
            self.registry.alias(alias, target)?;
        }
        self.config = config;
        Ok(self)
    }

    /// Installs a hook consulted before name-based resolution for every
    /// record. Returning `Some` bypasses the registry for that record.
    pub fn with_record_hook(
        mut self,
        hook: impl Fn(&Record) -> Option<FigureRef> + 'static,
    ) -> Self {
        self.record_hook = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn cached_types(&self) -> usize {
        self.constructors.borrow().len()
    }

    pub fn create_from_record(&self, record: &Record) -> Option<FigureRef> {
        self.record_hook.as_ref().and_then(|hook| hook(record))
    }

    pub fn resolve(&self, type_name: &str) -> Result<FigureRef, LoadError> {
        let cached = self.constructors.borrow().get(type_name).copied();
        let factory = match cached {
            Some(factory) => factory,
            None => {
                let factory = self.registry.lookup(type_name)?;
                self.constructors
                    .borrow_mut()
                    .insert(type_name.to_string(), factory);
                factory
            }
        };
        Ok(factory())
    }

    pub fn unmarshal<H, D>(&self, host: &mut H, document: D) -> Result<Vec<FigureRef>, LoadError>
    where
        H: GraphHost + ?Sized,
        D: IntoDocument,
    {
        Ok(self.unmarshal_with_report(host, document)?.figures)
    }

    pub fn unmarshal_with_report<H, D>(
        &self,
        host: &mut H,
        document: D,
    ) -> Result<LoadReport, LoadError>
    where
        H: GraphHost + ?Sized,
        D: IntoDocument,
    {
        let document = document.into_document()?;
        let started = Instant::now();
        info!(records = document.len(); "Unmarshalling document");

        let mut report = LoadReport::default();
        let mut records = Vec::with_capacity(document.len());
        for (index, entry) in document.into_entries().into_iter().enumerate() {
            match entry {
                Value::Object(map) => records.push((index, Record::from(map))),
                other => {
                    let error = LoadError::MalformedRecord(format!(
                        "expected an object, got {}",
                        json_kind(&other)
                    ));
                    report.reject(index, Phase::Instantiate, other, error);
                }
            }
        }

        self.instantiate_all(host, &records, &mut report);
        report.diagnostics.sort_by_key(|diagnostic| diagnostic.index);
        self.activate(&report.figures)?;

        let rejected: HashSet<usize> = report.diagnostics.iter().map(|d| d.index).collect();
        self.restore_groups(host, &records, &rejected, &mut report)?;

        let crossing_started = Instant::now();
        host.calculate_connection_intersection()?;
        host.invalidate_line_paths()?;
        debug!(elapsed_ms = millis(crossing_started.elapsed()); "Connection intersections recalculated");
        host.show_decoration();

        info!(
            created = report.figures.len(),
            failed = report.diagnostics.len(),
            elapsed_ms = millis(started.elapsed());
            "Document unmarshalled"
        );
        Ok(report)
    }

    fn instantiate_all<H>(&self, host: &mut H, records: &[(usize, Record)], report: &mut LoadReport)
    where
        H: GraphHost + ?Sized,
    {
        let started = Instant::now();
        let mut timings = PhaseTimings::default();
        let declared: HashSet<&str> = records
            .iter()
            .filter_map(|(_, record)| record.id().ok())
            .collect();

        let mut deferred = Vec::new();
        for (index, record) in records {
            if self.config.defer_forward_references
                && references_later_node(&*host, record, &declared)
            {
                debug!(index = *index, id = record.id_hint(); "Deferring record until referenced figures exist");
                deferred.push((*index, record));
                continue;
            }
            self.load_record(host, *index, record, &mut timings, report);
        }
        for (index, record) in deferred {
            self.load_record(host, index, record, &mut timings, report);
        }

        debug!(
            elapsed_ms = millis(started.elapsed()),
            create_ms = millis(timings.create),
            restore_ms = millis(timings.restore),
            add_ms = millis(timings.add);
            "Figures generated"
        );
    }

    fn load_record<H>(
        &self,
        host: &mut H,
        index: usize,
        record: &Record,
        timings: &mut PhaseTimings,
        report: &mut LoadReport,
    ) where
        H: GraphHost + ?Sized,
    {
        match self.instantiate(host, record, timings) {
            Ok(figure) => report.figures.push(figure),
            Err(error) => report.reject(index, Phase::Instantiate, record.clone().into(), error),
        }
    }

    fn instantiate<H>(
        &self,
        host: &mut H,
        record: &Record,
        timings: &mut PhaseTimings,
    ) -> Result<FigureRef, LoadError>
    where
        H: GraphHost + ?Sized,
    {
        let id = record.id()?;
        let type_name = record.type_name()?;

        let created = Instant::now();
        let figure = match self.create_from_record(record) {
            Some(figure) => {
                ensure_unregistered(&*host, &figure)?;
                figure
            }
            None => self.resolve(type_name)?,
        };
        {
            let mut entity = figure
                .try_borrow_mut()
                .map_err(|_| LoadError::Busy(id.to_string()))?;
            entity.core_mut().mark_building();
            entity.core_mut().set_id(id);
        }
        timings.create += created.elapsed();

        let mut source = None;
        let mut target = None;
        for key in record.keys() {
            match key {
                SOURCE_KEY => source = Some(resolve_endpoint(&*host, record, Endpoint::Source)?),
                TARGET_KEY => target = Some(resolve_endpoint(&*host, record, Endpoint::Target)?),
                _ => {}
            }
        }

        let restore_started = Instant::now();
        {
            let mut entity = figure
                .try_borrow_mut()
                .map_err(|_| LoadError::Busy(id.to_string()))?;
            let entity_type = entity.type_name().to_string();
            match (entity.as_connectable_mut(), source, target) {
                (Some(connectable), Some(source), Some(target)) => {
                    // Target strictly after source: listeners of the target
                    // assignment expect the source to be present already.
                    connectable.set_source(source);
                    connectable.set_target(target);
                }
                (Some(_), _, _) => {
                    return Err(LoadError::MalformedRecord(format!(
                        "connection '{id}' needs both '{SOURCE_KEY}' and '{TARGET_KEY}'"
                    )));
                }
                (None, Some(_), Some(_)) => {
                    return Err(LoadError::NotConnectable {
                        id: id.to_string(),
                        type_name: entity_type,
                    });
                }
                // A lone endpoint on a plain figure is resolved but never applied.
                (None, _, _) => {}
            }
            entity.set_persistent_attributes(record)?;
        }
        timings.restore += restore_started.elapsed();

        let add_started = Instant::now();
        host.add(figure.clone())?;
        timings.add += add_started.elapsed();
        Ok(figure)
    }

    fn activate(&self, figures: &[FigureRef]) -> Result<(), LoadError> {
        let started = Instant::now();
        for figure in figures {
            let buffered = figure
                .try_borrow_mut()
                .map_err(|_| LoadError::Busy("figure".to_string()))?
                .core_mut()
                .take_activation();
            // Listeners may borrow the figure, so it must not be held here.
            if let Some(buffered) = buffered {
                buffered.dispatch();
            }
            figure
                .try_borrow_mut()
                .map_err(|_| LoadError::Busy("figure".to_string()))?
                .repaint();
        }
        debug!(figures = figures.len(), elapsed_ms = millis(started.elapsed()); "Figures activated");
        Ok(())
    }

    fn restore_groups<H>(
        &self,
        host: &mut H,
        records: &[(usize, Record)],
        rejected: &HashSet<usize>,
        report: &mut LoadReport,
    ) -> Result<(), LoadError>
    where
        H: GraphHost + ?Sized,
    {
        let started = Instant::now();
        let mut assigned = 0usize;
        for (index, record) in records {
            if rejected.contains(index) {
                continue;
            }
            let Some(group_id) = record.composite() else {
                continue;
            };
            let outcome = group_id.and_then(|group_id| assign_to_group(&*host, record, group_id));
            match outcome {
                Ok(()) => assigned += 1,
                Err(error) => match self.config.group_failures {
                    GroupFailurePolicy::Abort => return Err(error),
                    GroupFailurePolicy::Isolate => {
                        report.reject(*index, Phase::Group, record.clone().into(), error)
                    }
                },
            }
        }
        debug!(assigned, elapsed_ms = millis(started.elapsed()); "Group assignments restored");
        Ok(())
    }
}

fn references_later_node<H>(host: &H, record: &Record, declared: &HashSet<&str>) -> bool
where
    H: GraphHost + ?Sized,
{
    let own_id = record.id().ok();
    [Endpoint::Source, Endpoint::Target].into_iter().any(|endpoint| {
        match record.endpoint(endpoint) {
            Some(Ok(port_ref)) => {
                Some(port_ref.node.as_str()) != own_id
                    && host.get_figure(&port_ref.node).is_none()
                    && declared.contains(port_ref.node.as_str())
            }
            _ => false,
        }
    })
}

/// Hook figures must be fresh: re-using a registered one would rename it in place.
fn ensure_unregistered<H>(host: &H, figure: &FigureRef) -> Result<(), LoadError>
where
    H: GraphHost + ?Sized,
{
    let current_id = figure
        .try_borrow()
        .map_err(|_| LoadError::Busy("figure".to_string()))?
        .id()
        .to_string();
    if current_id.is_empty() {
        return Ok(());
    }
    let registered = host
        .get_figure(&current_id)
        .or_else(|| host.get_line(&current_id))
        .is_some_and(|existing| Rc::ptr_eq(&existing, figure));
    if registered {
        return Err(LoadError::AlreadyRegistered(current_id));
    }
    Ok(())
}

fn resolve_endpoint<H>(host: &H, record: &Record, endpoint: Endpoint) -> Result<Port, LoadError>
where
    H: GraphHost + ?Sized,
{
    let port_ref: PortRef = match record.endpoint(endpoint) {
        Some(port_ref) => port_ref?,
        None => {
            return Err(LoadError::MalformedRecord(format!("missing '{endpoint}'")));
        }
    };
    let node = host.get_figure(&port_ref.node).ok_or_else(|| {
        LoadError::dangling(format!("{endpoint} figure {} not found", port_ref.node))
    })?;
    let node = node
        .try_borrow()
        .map_err(|_| LoadError::Busy(port_ref.node.clone()))?;
    node.port(&port_ref.port).ok_or_else(|| {
        LoadError::dangling(format!(
            "{endpoint} port {} on {} not found",
            port_ref.port, port_ref.node
        ))
    })
}

fn assign_to_group<H>(host: &H, record: &Record, group_id: &str) -> Result<(), LoadError>
where
    H: GraphHost + ?Sized,
{
    let member_id = record.id()?;
    let member = host
        .get_figure(member_id)
        .or_else(|| host.get_line(member_id))
        .ok_or_else(|| LoadError::dangling(format!("group member {member_id} not found")))?;
    let group = host
        .get_figure(group_id)
        .ok_or_else(|| LoadError::dangling(format!("group {group_id} not found")))?;
    if Rc::ptr_eq(&member, &group) {
        return Err(LoadError::SelfGroup(member_id.to_string()));
    }

    let (group_events, member_events) = {
        let mut group = group
            .try_borrow_mut()
            .map_err(|_| LoadError::Busy(group_id.to_string()))?;
        let mut member = member
            .try_borrow_mut()
            .map_err(|_| LoadError::Busy(member_id.to_string()))?;
        if group.as_composite().is_none() {
            return Err(LoadError::NotComposite {
                id: group_id.to_string(),
                type_name: group.type_name().to_string(),
            });
        }
        group.core_mut().hold_events();
        member.core_mut().hold_events();
        if let Some(composite) = group.as_composite_mut() {
            composite.assign_figure(&mut *member);
        }
        (
            group.core_mut().release_events(),
            member.core_mut().release_events(),
        )
    };
    group_events.dispatch();
    member_events.dispatch();
    Ok(())
}
