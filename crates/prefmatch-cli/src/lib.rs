//! Command-line front end for prefmatch: flag parsing, subscriber setup,
//! snapshot files and the NDJSON request loop.

pub mod cli;
pub mod logging;
pub mod protocol;
pub mod source;

pub use cli::{CliInput, USAGE, parse_cli_args};
pub use logging::{LogSettings, filter_directive, install as install_logging};
pub use protocol::{Envelope, ErrorBody, Request, ServeSummary, decode_request, dispatch, handle_line, serve};
pub use source::JsonFileSource;
