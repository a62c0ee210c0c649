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
pub mod catalog;
pub mod common;
pub mod query_execution;
pub mod storage;
pub mod types;

// Engine-layout folder structure, with `stonework_*` convenience aliases.
pub use common::logging as stonework_logging;

pub use common::ids::{AttributeId, BlockId, ClientId, PartitionId, RelationId};
pub use storage::error::{StorageError, StorageErrorKind};
pub use storage::insert_destination::{InsertDestination, RawBlockAccess};
pub use storage::storage_manager::{BlockHandle, StorageManager};
