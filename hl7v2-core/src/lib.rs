//! HL7 v2 Core
//!
//! Wire-format codec for HL7 version 2.x: delimiter discovery, the escape
//! codec, an immutable value tree, and message, batch and streaming parsers
//! with configurable error recovery.
//!
//! ```
//! use hl7v2_core::Parser;
//!
//! let text = "MSH|^~\\&|A|B|C|D|20240101||ADT^A01|1|P|2.5\rPID|1||123^^^H^MR||Doe^Jane";
//! let msg = Parser::new().parse(text).unwrap();
//! assert_eq!(msg.segments_by_id("PID")[0][2].serialize(), "123^^^H^MR");
//! assert_eq!(msg.serialize(), text);
//! ```
//!
//! # Architecture
//!
//! - **delimiters.rs** - DelimiterSet and discovery from the header line
//! - **escape.rs** - `\F\`, `\S\`, `\Xhh\` ... escape codec
//! - **value.rs** - Arc-shared value tree, Message down to Subcomponent
//! - **segment_id.rs** - Inline 3-byte identifiers and the standard catalogue
//! - **segment.rs** - One line → one Segment
//! - **parser.rs** - Message parser, line splitting, `parse_all`
//! - **batch.rs** - FHS/BHS containers
//! - **streaming.rs** - Frame scanner and pull-driven streaming parsers
//! - **diagnostics.rs** - Warnings, absorbed errors, recovery-mode sink
//! - **config.rs** / **encoding.rs** / **pool.rs** / **path.rs** - Settings,
//!   byte decoding, buffer reuse, positional lookup
//!
//! Logging goes through `tracing`; install a subscriber to see it.

pub mod batch;
pub mod config;
pub mod delimiters;
pub mod diagnostics;
pub mod encoding;
pub mod error;
pub mod escape;
pub mod parser;
pub mod path;
pub mod pool;
pub mod segment;
pub mod segment_id;
pub mod streaming;
pub mod value;

pub use batch::{Batch, BatchItem, ContainerKind, CountMismatch};
pub use config::{CharacterEncoding, ErrorRecoveryMode, LineTerminator, ParserConfig};
pub use delimiters::DelimiterSet;
pub use diagnostics::{ParseDiagnostics, Parsed, SegmentError, Warning, WarningKind};
pub use error::{Error, Result};
pub use parser::Parser;
pub use path::FieldPath;
pub use pool::{BufferPool, PoolStats, PooledBuffer};
pub use segment::parse_segment;
pub use segment_id::SegmentId;
pub use streaming::{BatchStreamingParser, Pull, StreamingParser};
pub use value::{Component, Field, Message, Repetition, Segment, SegmentKind, Subcomponent};
