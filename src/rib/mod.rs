//! RIB stream encoding.
//!
//! - [`config`]: per-stream format, compression, precision and declaration mode
//! - [`stream`]: byte sink with optional gzip
//! - [`binary`]: binary token codes
//! - [`format`]: ASCII float and string formatting
//! - [`declare`]: declared-name bookkeeping
//! - [`encoder`]: the request-level [`RibEncoder`]

pub mod binary;
pub mod config;
pub mod declare;
pub mod encoder;
pub mod format;
pub mod stream;

pub use config::{DeclarationMode, EncoderConfig, RibCompression, RibFormat, DEFAULT_PRECISION};
pub use declare::DeclarationTable;
pub use encoder::{
    Block, LightHandle, NuPatchArgs, ObjectHandle, RibEncoder, RibParam, RibValue, SubdivArgs,
    TrimCurveArgs,
};
pub use stream::{RibStream, RibTarget};
