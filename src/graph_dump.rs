use crate::crossing::Crossing;
use crate::error::LoadError;
use crate::figure::{Figure, FigureRef, PortKind};
use crate::geometry::Bounds;
use crate::host::Canvas;
use crate::reader::{Diagnostic, Phase};
use crate::record::PortRef;
use serde::Serialize;
use std::cell::Ref;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct GraphDump {
    pub figures: Vec<FigureDump>,
    pub lines: Vec<LineDump>,
    pub diagnostics: Vec<DiagnosticDump>,
}

#[derive(Debug, Serialize)]
pub struct FigureDump {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub bounds: Bounds,
    pub ports: Vec<PortDump>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PortDump {
    pub name: String,
    pub kind: PortKind,
}

#[derive(Debug, Serialize)]
pub struct LineDump {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub source: Option<PortRef>,
    pub target: Option<PortRef>,
    pub route: Vec<[f32; 2]>,
    pub path: Option<String>,
    pub crossings: Vec<Crossing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticDump {
    pub index: usize,
    pub phase: Phase,
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub error: String,
}

impl GraphDump {
    pub fn from_canvas(canvas: &Canvas, diagnostics: &[Diagnostic]) -> Result<Self, LoadError> {
        let mut figures = Vec::with_capacity(canvas.figures().len());
        for figure in canvas.figures() {
            let figure = borrow(figure)?;
            figures.push(FigureDump {
                id: figure.id().to_string(),
                type_name: figure.type_name().to_string(),
                bounds: figure.bounds(),
                ports: figure
                    .ports()
                    .into_iter()
                    .map(|port| PortDump {
                        name: port.name,
                        kind: port.kind,
                    })
                    .collect(),
                composite: figure.core().composite().map(str::to_string),
                members: figure
                    .as_composite()
                    .map(|group| group.members().to_vec())
                    .unwrap_or_default(),
            });
        }

        let mut lines = Vec::with_capacity(canvas.lines().len());
        for line in canvas.lines() {
            let line = borrow(line)?;
            let Some(connectable) = line.as_connectable() else {
                continue;
            };
            lines.push(LineDump {
                id: line.id().to_string(),
                type_name: line.type_name().to_string(),
                source: connectable
                    .source()
                    .map(|port| PortRef::new(&port.owner, &port.name)),
                target: connectable
                    .target()
                    .map(|port| PortRef::new(&port.owner, &port.name)),
                route: connectable
                    .route()
                    .iter()
                    .map(|point| [point.x, point.y])
                    .collect(),
                path: connectable.path().map(str::to_string),
                crossings: connectable.crossings().to_vec(),
                composite: line.core().composite().map(str::to_string),
            });
        }

        let diagnostics = diagnostics
            .iter()
            .map(|diagnostic| DiagnosticDump {
                index: diagnostic.index,
                phase: diagnostic.phase,
                id: diagnostic.id.clone(),
                type_name: diagnostic.type_name.clone(),
                error: diagnostic.error.to_string(),
            })
            .collect();

        Ok(GraphDump {
            figures,
            lines,
            diagnostics,
        })
    }
}

fn borrow(figure: &FigureRef) -> Result<Ref<'_, dyn Figure>, LoadError> {
    figure
        .try_borrow()
        .map_err(|_| LoadError::Busy("figure".to_string()))
}

/// Writes the dump as pretty JSON to `path`, or to stdout when no path is given.
pub fn write_graph_dump(
    path: Option<&Path>,
    canvas: &Canvas,
    diagnostics: &[Diagnostic],
) -> anyhow::Result<()> {
    let dump = GraphDump::from_canvas(canvas, diagnostics)?;
    match path {
        Some(path) => {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
