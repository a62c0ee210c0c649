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
//! Hash partitioning of a relation on a single attribute.
//!
//! The mapping is a total function: every value of the partitioning
//! attribute lands in exactly one of `num_partitions` slices, and equal
//! values always land in the same slice.

use crate::common::ids::{AttributeId, PartitionId};
use crate::types::tuple::{Datum, Tuple};

const FNV_SEED: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_SEED;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Partitioning description attached to a relation.
#[derive(Clone, Debug)]
pub struct PartitionScheme {
    partitioning_attribute: AttributeId,
    num_partitions: u32,
}

impl PartitionScheme {
    pub fn new(partitioning_attribute: AttributeId, num_partitions: u32) -> Self {
        debug_assert!(num_partitions > 0);
        Self {
            partitioning_attribute,
            num_partitions,
        }
    }

    pub fn partitioning_attribute(&self) -> AttributeId {
        self.partitioning_attribute
    }

    pub fn num_partitions(&self) -> u32 {
        self.num_partitions
    }

    /// Partition that holds the given partitioning-attribute value.
    pub fn partition_for_value(&self, value: &Datum) -> PartitionId {
        let mut bytes = Vec::with_capacity(16);
        value.hash_bytes(&mut bytes);
        PartitionId::new((fnv1a(&bytes) % self.num_partitions as u64) as u32)
    }

    /// Partition that holds the given tuple, read through the
    /// partitioning attribute.
    pub fn partition_for_tuple(&self, tuple: &Tuple) -> PartitionId {
        self.partition_for_value(tuple.value(self.partitioning_attribute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_map_to_equal_partitions() {
        let scheme = PartitionScheme::new(AttributeId::new(0), 8);
        let a = scheme.partition_for_value(&Datum::Int(1234));
        let b = scheme.partition_for_value(&Datum::Long(1234));
        assert_eq!(a, b);
    }

    #[test]
    fn partitions_stay_in_range() {
        let scheme = PartitionScheme::new(AttributeId::new(0), 4);
        for i in 0..1000 {
            let p = scheme.partition_for_value(&Datum::Int(i));
            assert!(p.as_u32() < 4);
        }
    }

    #[test]
    fn tuple_routing_reads_partitioning_attribute() {
        let scheme = PartitionScheme::new(AttributeId::new(1), 4);
        let t = Tuple::new(vec![Datum::Int(7), Datum::Int(99)]);
        assert_eq!(
            scheme.partition_for_tuple(&t),
            scheme.partition_for_value(&Datum::Int(99))
        );
    }
}
