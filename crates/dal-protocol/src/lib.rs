//! IVOA Data Access Layer query engine.
//!
//! This crate turns the parameters of an image (SIA), spectrum (SSA) or
//! cone search (SCS) request into a catalog query, refines the returned
//! rows on the sphere, and synthesizes the output records of the response.
//!
//! # Pipeline
//!
//! 1. [`ParamSet`] converts raw request parameters, parsing range lists.
//! 2. [`ConstraintCompiler`] builds a [`CompiledQuery`] with a coarse
//!    positional box and one predicate per supported axis.
//! 3. A [`QueryExecutor`] runs the query text against the catalog.
//! 4. [`SpatialRefiner`] applies the exact great-circle test to each row.
//! 5. [`RecordExpander`] emits one record per requested format variant,
//!    filled in by [`MetadataSynthesizer`] and, for cutouts, rewritten by
//!    [`VirtualImageEditor`].
//!
//! # Example
//!
//! ```rust
//! use dal_protocol::{ParamSet, Protocol, QueryEngine, RequestContext};
//!
//! let ctx = RequestContext::builder()
//!     .authority_id("ivo://example.org")
//!     .base_url("http://dal.example.org")
//!     .service_name("sia")
//!     .table_name("images")
//!     .build();
//!
//! let params = ParamSet::parse(Protocol::Image, [("POS", "180,0"), ("SIZE", "1")]).unwrap();
//! let query = QueryEngine::new(Protocol::Image, &ctx).compile(&params).unwrap();
//! assert!(query.text.starts_with("SELECT * FROM images WHERE"));
//! ```

pub mod constraints;
pub mod context;
pub mod cutout;
pub mod engine;
pub mod expand;
pub mod fields;
pub mod params;
pub mod protocol;
pub mod range;
pub mod records;
pub mod refine;
pub mod synthesis;
pub mod table;
pub mod variants;
pub mod virtual_image;

// Re-export commonly used types
pub use constraints::{
    CompiledQuery, Constraint, ConstraintCompiler, ConstraintKind, Interval, SpatialRegion,
};
pub use context::{RequestContext, RequestContextBuilder, DEFAULT_MAX_RECORDS};
pub use cutout::ProcessCutoutTask;
pub use engine::{QueryEngine, QueryExecutor, QueryResponse, QueryStats, RowCursor};
pub use expand::{RecordExpander, RecordSink};
pub use fields::{FieldDescriptor, FieldDirectory};
pub use params::{Param, ParamKind, ParamLevel, ParamSet, ParamSpec, ParamValue};
pub use protocol::{Axis, Protocol};
pub use range::{Range, RangeKind, RangeSet, RangeValue, ValueType};
pub use records::{CatalogRow, OutputRecord, ProductKind};
pub use refine::SpatialRefiner;
pub use synthesis::MetadataSynthesizer;
pub use table::{CustomField, TableConfig, TableConfiguration};
pub use variants::{FormatSelection, FormatVariant, ModeSelection};
pub use virtual_image::{
    CutoutRequest, CutoutTask, DatasetLocator, EditOutcome, KeywordMap, VirtualImageEditor,
};

pub use dal_common::{DalError, DalResult};
