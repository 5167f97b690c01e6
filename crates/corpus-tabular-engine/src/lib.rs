pub mod convert;
pub mod error;
pub mod io;
pub mod model;
pub mod resolve;
pub mod schema;

// Re-export key types for easier usage
pub use convert::{ConvertOptions, ConvertReport, ShortRowPolicy, TableConverter};
pub use error::{ConvertError, SchemaError};
pub use model::{ConversionTarget, MemoryCorpus};
pub use schema::{
    AttributeSchema, BlockSchema, ColumnSchema, ResolverId, ResolverSpec, Separator, TableSchema,
};
