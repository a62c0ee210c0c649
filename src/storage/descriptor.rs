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
//! Serialized insert-destination descriptor.
//!
//! The optimizer emits these protobuf records when it plans an
//! output-producing operator. The structs keep only the fields this
//! crate consumes.

use prost::Message;

/// Checkout policy selector carried in the descriptor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum InsertDestinationKind {
    AlwaysCreate = 0,
    BlockPool = 1,
    PartitionAware = 2,
}

impl InsertDestinationKind {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::AlwaysCreate),
            1 => Some(Self::BlockPool),
            2 => Some(Self::PartitionAware),
            _ => None,
        }
    }
}

/// Layout for newly created blocks; absent means the relation default.
#[derive(Clone, PartialEq, Message)]
pub struct BlockLayoutPb {
    #[prost(uint64, optional, tag = "1")]
    pub capacity_bytes: Option<u64>,
}

/// Hash partition scheme; required for `PartitionAware` descriptors.
#[derive(Clone, PartialEq, Message)]
pub struct PartitionSchemePb {
    #[prost(uint32, optional, tag = "1")]
    pub partitioning_attribute: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub num_partitions: Option<u32>,
}

/// Serialized form of one insert destination.
#[derive(Clone, PartialEq, Message)]
pub struct InsertDestinationPb {
    /// `InsertDestinationKind` discriminant.
    #[prost(int32, optional, tag = "1")]
    pub kind: Option<i32>,
    #[prost(uint32, optional, tag = "2")]
    pub relation_id: Option<u32>,
    #[prost(message, optional, tag = "3")]
    pub layout: Option<BlockLayoutPb>,
    #[prost(uint32, optional, tag = "4")]
    pub relational_op_index: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub foreman_client_id: Option<u32>,
    #[prost(message, optional, tag = "6")]
    pub partition_scheme: Option<PartitionSchemePb>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_round_trips_through_prost() {
        let pb = InsertDestinationPb {
            kind: Some(InsertDestinationKind::PartitionAware as i32),
            relation_id: Some(12),
            layout: Some(BlockLayoutPb {
                capacity_bytes: Some(1 << 20),
            }),
            relational_op_index: Some(4),
            foreman_client_id: Some(2),
            partition_scheme: Some(PartitionSchemePb {
                partitioning_attribute: Some(1),
                num_partitions: Some(16),
            }),
        };
        let bytes = pb.encode_to_vec();
        let decoded = InsertDestinationPb::decode(bytes.as_slice()).expect("decode");
        assert_eq!(decoded, pb);
    }

    #[test]
    fn unknown_kind_discriminant_is_rejected() {
        assert!(InsertDestinationKind::from_i32(3).is_none());
        assert_eq!(
            InsertDestinationKind::from_i32(2),
            Some(InsertDestinationKind::PartitionAware)
        );
    }
}
