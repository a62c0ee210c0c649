// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use std::fmt;

/// Failure classes surfaced by insert destinations. All of them abort
/// the owning query; none are silently recoverable at this layer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StorageErrorKind {
    /// Serialized descriptor is malformed; raised at construction.
    ValidationFailure,
    /// A tuple does not fit in a maximally empty block.
    OversizedTuple,
    /// The storage manager cannot allocate or load a block.
    StorageUnavailable,
    /// A pipeline notification was rejected twice by the bus.
    BusSendFailure,
}

#[derive(Debug, Clone)]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::ValidationFailure,
            message: message.into(),
        }
    }

    pub fn oversized_tuple(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::OversizedTuple,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::StorageUnavailable,
            message: message.into(),
        }
    }

    pub fn bus_send(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::BusSendFailure,
            message: message.into(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            StorageErrorKind::ValidationFailure => "validation failure",
            StorageErrorKind::OversizedTuple => "oversized tuple",
            StorageErrorKind::StorageUnavailable => "storage unavailable",
            StorageErrorKind::BusSendFailure => "bus send failure",
        };
        write!(f, "{}: {}", kind, self.message)
    }
}

impl std::error::Error for StorageError {}

pub type Result<T> = std::result::Result<T, StorageError>;
