//! # CLI Module
//!
//! The `brrtgate` command line: inspect a contract and try requests against
//! it without wiring up a service.
//!
//! ## Commands
//!
//! ### `lint`
//!
//! Load a contract and report structural issues, schemas that fail to
//! compile, and security requirements naming undeclared schemes:
//!
//! ```bash
//! brrtgate lint --spec openapi.yaml
//! ```
//!
//! ### `routes`
//!
//! Print the declared servers and one line per operation:
//!
//! ```bash
//! brrtgate routes --spec openapi.yaml
//! ```
//!
//! ### `check`
//!
//! Run one request through the validator and print the outcome as JSON:
//!
//! ```bash
//! brrtgate check --spec openapi.yaml \
//!     --method POST --url http://api.example.com/resource \
//!     --header 'X-Trace: 1' --body '{"name":"Marcin"}'
//! ```
//!
//! Secured operations are denied unless `--assume-authenticated` is given.
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | success / request allowed |
//! | 1 | contract or invocation error |
//! | 2 | request denied |

mod commands;


pub use commands::{run_cli, Cli, Commands, EXIT_DENIED, EXIT_FAILURE};
