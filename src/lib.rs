//! Batch bridge between a script store and a relational warehouse: resolve a
//! SQL script, run it, normalize the rows into warehouse-safe text and bulk
//! load them into a target table with row-level failure isolation.

pub mod bridge;
pub mod config;
pub mod duck;
pub mod error;
pub mod fetch;
pub mod process;
pub mod schema;
pub mod upload;
pub mod warehouse;

pub use bridge::Bridge;
pub use config::{Config, ConnectionProfile, CredentialsProfile, Target};
pub use error::{BatchError, ConnectError, ExecError};
pub use upload::{Plan, UploadReport};
pub use warehouse::{Row, Value};
