// Command-line surface for hypod
//
// Dotted-path token parsing, the layered launcher, and logging setup for
// binaries built on the library.

pub use self::launcher::{LaunchArgs, Launcher};
pub use self::logging::init_logging;
pub use self::parser::{parse_tokens, Assignment};

pub mod launcher;
pub mod logging;
pub mod parser;
