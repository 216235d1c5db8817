/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use thiserror::Error;

pub type Result<T> = std::result::Result<T,OdinFlightError>;

/// nothing in here is fatal for the process. Fetch related errors end up as a status string while
/// the last known good aircraft set stays published
#[derive(Error,Debug)]
pub enum OdinFlightError {

    #[error("authentication failed: {0}")]
    AuthError(String),

    #[error("rate limit exceeded")]
    RateLimitError,

    #[error("server error (status {0})")]
    ServerError(u16),

    #[error("network error {0}")]
    NetworkError(String),

    #[error("parse error {0}")]
    ParseError(String),

    #[error("config error {0}")]
    ConfigError(String),

    #[error("unknown provider {0}")]
    UnknownProvider(String),

    #[error("IO error {0}")]
    IOError( #[from] std::io::Error),

    #[error("RON error {0}")]
    RonError( #[from] ron::error::SpannedError),

    #[error("operation failed {0}")]
    OpFailedError(String)
}

impl OdinFlightError {
    /// the user visible status text for a failed fetch cycle
    pub fn status_message (&self)->String {
        match self {
            OdinFlightError::RateLimitError => "rate limited by provider - retrying on next update".to_string(),
            OdinFlightError::ServerError(status) => format!("provider returned status {status}"),
            OdinFlightError::NetworkError(msg) => format!("network error: {msg}"),
            OdinFlightError::AuthError(msg) => format!("authentication failed: {msg}"),
            other => other.to_string()
        }
    }

    /// errors that the next scheduled refresh is expected to heal
    pub fn is_transient (&self)->bool {
        matches!( self, OdinFlightError::RateLimitError | OdinFlightError::ServerError(_) | OdinFlightError::NetworkError(_))
    }
}

// timeouts and connection failures are both reported as NetworkError. Status codes are classified before
// we ever get a reqwest::Error for them
impl From<reqwest::Error> for OdinFlightError {
    fn from (e: reqwest::Error)->Self {
        if e.is_decode() {
            OdinFlightError::ParseError( e.to_string())
        } else if e.is_timeout() {
            OdinFlightError::NetworkError( format!("timeout: {e}"))
        } else {
            OdinFlightError::NetworkError( e.to_string())
        }
    }
}

impl From<serde_json::Error> for OdinFlightError {
    fn from (e: serde_json::Error)->Self { OdinFlightError::ParseError( e.to_string()) }
}

macro_rules! parse_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        OdinFlightError::ParseError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use parse_error;

macro_rules! op_failed {
    ($fmt:literal $(, $arg:expr )* ) => {
        OdinFlightError::OpFailedError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use op_failed;
