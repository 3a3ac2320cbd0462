use super::Style;
use crate::error::AttributeError;
use crate::figure::{Composite, Figure, FigureCore, FigureEvent, FigureRef, figure_ref};
use crate::record::Record;
use crate::registry::TypeRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Members move with the group and are selected as a unit.
    Group,
    /// Members stick to the raft but stay individually selectable.
    Raft,
}

impl GroupKind {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::Raft => "Raft",
        }
    }
}

#[derive(Debug)]
pub struct Group {
    kind: GroupKind,
    core: FigureCore,
    style: Style,
    members: Vec<String>,
}

impl Group {
    pub fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            core: FigureCore::with_size(100.0, 100.0),
            style: Style {
                bg_color: Some("#f0f0f0".to_string()),
                ..Style::default()
            },
            members: Vec::new(),
        }
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }
}

impl Figure for Group {
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
        self.style.restore(record)?;
        Ok(())
    }

    // Membership is not persisted here; members carry `composite` instead.
    fn persistent_attributes(&self) -> Record {
        let mut record = self.core.persist(self.type_name(), true);
        self.style.persist(&mut record);
        record
    }

    fn as_composite(&self) -> Option<&dyn Composite> {
        Some(self)
    }

    fn as_composite_mut(&mut self) -> Option<&mut dyn Composite> {
        Some(self)
    }
}

impl Composite for Group {
    fn assign_figure(&mut self, member: &mut dyn Figure) {
        let member_id = member.id().to_string();
        member.core_mut().set_composite(Some(self.core.id()));
        if !self.members.contains(&member_id) {
            self.members.push(member_id.clone());
        }
        self.core.fire(FigureEvent::Assigned {
            group: self.core.id().to_string(),
            member: member_id,
        });
        self.core.request_repaint();
    }

    fn members(&self) -> &[String] {
        &self.members
    }
}

fn group() -> FigureRef {
    figure_ref(Group::new(GroupKind::Group))
}

fn raft() -> FigureRef {
    figure_ref(Group::new(GroupKind::Raft))
}

pub(super) fn register(registry: &mut TypeRegistry) {
    registry.register("Group", group);
    registry.register("draw2d.shape.composite.Group", group);
    registry.register("Raft", raft);
    registry.register("draw2d.shape.composite.Raft", raft);
}
