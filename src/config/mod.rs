//! Configuration loading, merging, and resolution.
//!
//! This module contains the configuration resolution engine: document
//! loading and include merging, the fixed-point variable interpolation, the
//! single-pass interpolator, and the [`Config`] façade that orchestrates a
//! full resolution run.

pub mod core;
pub mod document;
pub mod file;
pub mod interpolate;
pub mod overrides;
pub mod render;
pub mod resolver;
pub mod tags;
pub mod vars;

pub use self::core::{CoreSettings, DEFAULT_STACK_NAME_TEMPLATE};
pub use self::document::{ConfigDocument, RECOGNIZED_SECTIONS};
pub use self::file::{ConfigFile, ConfigFileSet};
pub use self::interpolate::interpolate_dict;
pub use self::overrides::{Overrides, parse_override};
pub use self::render::Renderer;
pub use self::resolver::{Config, DeployMetadata, ResolveRequest};
pub use self::tags::{Tag, Tags};
pub use self::vars::{MAX_INTERPOLATION_DEPTH, VarValue, Vars};
