//! Quote document generation.
//!
//! - `docx` - minimal DOCX package model
//! - `substitution` - `{{key}}` placeholder filling
//! - `projection` - quote → placeholder map per quote type
//! - `convert` - PDF conversion chain
//! - `renderer` - per-type orchestration with failure isolation
//! - `handlers` - document download endpoint

pub mod common;
pub mod convert;
pub mod docx;
pub mod handlers;
pub mod projection;
pub mod renderer;
pub mod substitution;

pub use convert::{CommandConverter, ConversionError, FallbackConverter, PdfConverter};
pub use docx::{DocxDocument, DocxError};
pub use projection::project;
pub use renderer::{DocumentOutcome, DocumentRenderer, DocumentState, RenderError};
pub use substitution::{residual_placeholders, substitute, PlaceholderMap, SENTINEL};
