//! Loads persisted figure documents into a live graph of shapes and connections.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod crossing;
pub mod error;
pub mod figure;
pub mod geometry;
pub mod graph_dump;
pub mod host;
pub mod reader;
pub mod record;
pub mod registry;
pub mod shapes;

#[cfg(feature = "cli")]
pub use cli::{Args, run};
pub use config::{Config, CrossingConfig, GroupFailurePolicy, ReaderConfig};
pub use error::{AttributeError, LoadError};
pub use figure::{Composite, Connectable, Figure, FigureRef};
pub use host::{Canvas, GraphHost};
pub use reader::{Diagnostic, LoadReport, Reader};
pub use record::{Document, PortRef, Record};
pub use registry::TypeRegistry;
