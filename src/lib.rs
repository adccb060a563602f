//! tidegen - message schema compiler
//!
//! Parses ROS-style `.msg` / `.srv` definitions and generates serializable
//! data classes for several targets.
//!
//! # Example
//!
//! ```rust,no_run
//! use tidegen::{Generator, MsgFileProvider, PythonGenerator, Settings};
//! use tidegen::provider::InputUnit;
//!
//! fn main() -> tidegen::Result<()> {
//!     let units = vec![
//!         InputUnit::message("geo", "Point", "float64 x\nfloat64 y\n"),
//!         InputUnit::message("geo", "Path", "Header header\nPoint[] points\n"),
//!     ];
//!     let report = MsgFileProvider::new().load_units(units, false)?;
//!
//!     let selection: Vec<_> = report.database.iter().collect();
//!     let output = PythonGenerator::default().generate(&report.database, &selection, &Settings::new())?;
//!     output.write_out_files("generated".as_ref())?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod generator;
pub mod model;
pub mod options;
pub mod parser;
pub mod provider;
pub mod registry;
pub mod template;
pub mod writer;

pub use config::Config;
pub use cursor::Cursor;
pub use error::{Error, ParseError, ParseErrorKind, Position, Result};
pub use generator::{
    CSharpGenerator, GeneratedFile, GenerationOutput, Generator, MissingDependency, MsgFileGenerator, PythonGenerator,
};
pub use model::{ArrayKind, ConstantValue, Field, Message, MessageDatabase, ServicePair};
pub use options::{OptionSpec, OptionValue, Settings};
pub use parser::{MessageParser, ParsedUnit, UnitKind};
pub use provider::{DataProvider, LoadReport, MsgFileProvider};
pub use registry::Registry;

/// tidegen version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
