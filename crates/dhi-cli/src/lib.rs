//! Library side of the `dhi` command-line tool.

pub mod logging;
pub mod pipeline;
