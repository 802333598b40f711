//! Serialization codec for InfluxDB-style line-oriented time-series databases.
//!
//! The write path turns untyped points, schema-bound records and columnar
//! frames into line protocol text; the read path turns JSON query
//! responses, complete or chunked, back into typed rows and frames. The
//! codec is transport-agnostic: it only ever sees in-memory values, byte
//! buffers and parsed JSON trees.
//!
//! ```
//! use influxdb_codec_rs::line::{encode_point, EncodeOptions};
//! use influxdb_codec_rs::model::Point;
//!
//! let point = Point::new()
//!     .measurement("cpu")
//!     .tag("host", "server01")
//!     .tag("region", "us-west")
//!     .field_float("value", 0.64)
//!     .time("2009-11-10T23:00:00Z");
//!
//! let line = encode_point(&point, &EncodeOptions::new()).unwrap();
//! assert_eq!("cpu,host=server01,region=us-west value=0.64 1257894000000000000", line);
//! ```

pub mod error;
pub mod escape;
pub mod frame;
pub mod line;
pub mod model;
pub mod query;
pub mod schema;

#[cfg(test)]
pub mod test_util;

pub use error::CodecError;

pub type CodecResult<T> = Result<T, CodecError>;
