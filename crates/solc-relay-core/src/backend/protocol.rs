//! Worker wire protocol.
//!
//! Messages are JSON objects tagged by `cmd`. Out-of-process workers receive
//! one message per line on stdin and answer one per line on stdout.
//!
//! ```text
//! -> {"cmd":"loadVersion","data":"https://.../soljson-v0.4.11.js"}
//! <- {"cmd":"versionLoaded","data":"0.4.11","acceptsMultipleFiles":true}
//! -> {"cmd":"compile","job":0,"source":"{\"sources\":{...}}","optimize":1}
//! <- {"cmd":"compiled","job":0,"data":"{...}","missingInputs":[]}
//! <- {"cmd":"error","data":"..."}
//! ```

use serde::{Deserialize, Serialize};

/// Requests sent to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum WorkerCommand {
    LoadVersion {
        /// Compiler release URL.
        data: String,
    },
    Compile {
        job: u64,
        /// JSON-encoded [`CompilerInput`](crate::bundle::CompilerInput).
        source: String,
        /// `1` to optimise, `0` otherwise.
        optimize: u8,
    },
}

/// Notifications sent by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum WorkerMessage {
    VersionLoaded {
        /// Compiler version string.
        data: String,
        #[serde(rename = "acceptsMultipleFiles", default)]
        accepts_multiple_files: bool,
    },
    Compiled {
        job: u64,
        /// JSON-encoded result payload.
        data: String,
        #[serde(rename = "missingInputs", default)]
        missing_inputs: Vec<String>,
    },
    Error {
        data: String,
    },
}
