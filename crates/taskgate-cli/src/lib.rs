//! # taskgate-cli: CLI Tool for taskgate
//!
//! Provides the `taskgate` command-line interface.
//!
//! ## Subcommands
//!
//! - `taskgate schema check`: definition order and descriptor of a schema.
//! - `taskgate schema validate`: validate a message against a schema.
//! - `taskgate schema args`: preview the arguments a job would receive.
//!
//! ```bash
//! taskgate schema check params.schema.json
//! taskgate schema validate params.schema.json message.yaml --strict
//! taskgate schema args params.schema.json message.json --job-id 67e55044-10b1-426f-9247-bb680e5fe0c8
//! ```

pub mod schema;
