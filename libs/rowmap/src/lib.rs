//! Row-to-value mapping for database result sets.
//!
//! A [`DecoderRegistry`] turns a window of fields from a [`RowSource`] into a
//! typed value. The decoding strategy of each target type is chosen once, from
//! the shape the type declares through [`Mappable`], and cached.
//!
//! ```ignore
//! use rowmap::{DecoderRegistry, Mappable, MemoryRow};
//!
//! #[derive(Mappable)]
//! struct User {
//!     id: i64,
//!     name: Option<String>,
//! }
//!
//! let registry = DecoderRegistry::new();
//! let row = MemoryRow::new().with("id", 1i64).with("name", "ann");
//! let user: User = registry.decode_row(&row)?;
//! ```

pub mod bulk;
pub mod config;
pub mod decoder;
pub mod error;
mod impls;
pub mod normalize;
pub mod params;
pub mod registry;
pub mod row;
pub mod shape;
pub mod strategy;
pub mod stream;
pub mod value;
mod window;

pub use rowmap_derive::{Mappable, ToParams};

pub use bulk::{BulkInsert, InsertBatch};
pub use config::{BulkConfig, RowMapConfig};
pub use decoder::{Decoder, ErasedDecoder, TypeDescriptor};
pub use error::MapError;
pub use normalize::normalize_name;
pub use params::{Parameter, ToParams, ToValue};
pub use registry::DecoderRegistry;
pub use row::{MemoryRow, RowSource};
pub use shape::{Args, CompositeShape, CtorParam, Mappable, NullableShape, Shape, TupleShape};
pub use strategy::{MemberInfo, ShapeKind, Strategy, TypeInfo, classify};
pub use stream::ColumnStream;
pub use value::{Decimal, RowMap, Timestamp, Value};
