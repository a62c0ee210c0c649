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

/// Reserved message-type codes, in the order of a query's life cycle.
///
/// The whole code space is reserved across the engine; this crate only
/// emits `CatalogRelationNewBlock` and `DataPipeline`, both from insert
/// destinations to the foreman.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum QueryExecutionMessageType {
    /// Requesting query admission, from the main thread to the foreman.
    AdmitRequest = 0,
    /// From foreman to worker.
    WorkOrder = 1,
    /// From worker to foreman.
    WorkOrderComplete = 2,
    /// From insert destination to foreman: a block was created.
    CatalogRelationNewBlock = 3,
    /// From insert destination (or some work orders) to foreman: a
    /// block was sealed.
    DataPipeline = 4,
    /// From some work orders to foreman on behalf of their operators.
    WorkOrderFeedback = 5,
    /// From foreman to worker.
    RebuildWorkOrder = 6,
    /// From worker to foreman.
    RebuildWorkOrderComplete = 7,
    /// From foreman to the main thread.
    WorkloadCompletion = 8,
    /// From the main thread to foreman and workers.
    Poison = 9,
}

impl QueryExecutionMessageType {
    pub const fn as_code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        use QueryExecutionMessageType::*;
        Some(match code {
            0 => AdmitRequest,
            1 => WorkOrder,
            2 => WorkOrderComplete,
            3 => CatalogRelationNewBlock,
            4 => DataPipeline,
            5 => WorkOrderFeedback,
            6 => RebuildWorkOrder,
            7 => RebuildWorkOrderComplete,
            8 => WorkloadCompletion,
            9 => Poison,
            _ => return None,
        })
    }
}
