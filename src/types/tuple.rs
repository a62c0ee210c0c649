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

use crate::common::ids::AttributeId;

/// Type of a single attribute as seen by the storage layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TypeKind {
    Int,
    Long,
    Double,
    Varchar,
}

/// One attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    Int(i32),
    Long(i64),
    Double(f64),
    Varchar(String),
}

impl Datum {
    pub fn kind(&self) -> TypeKind {
        match self {
            Datum::Int(_) => TypeKind::Int,
            Datum::Long(_) => TypeKind::Long,
            Datum::Double(_) => TypeKind::Double,
            Datum::Varchar(_) => TypeKind::Varchar,
        }
    }

    /// Stored size of this value inside a block, including the length
    /// prefix for variable-width values.
    pub fn byte_size(&self) -> u64 {
        match self {
            Datum::Int(_) => 4,
            Datum::Long(_) => 8,
            Datum::Double(_) => 8,
            Datum::Varchar(s) => 4 + s.len() as u64,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Datum::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Datum::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Datum::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Varchar(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical byte representation used for hash partitioning. Integral
    /// values of different widths that compare equal must hash equal, so
    /// both widths canonicalize to 64-bit little-endian.
    pub fn hash_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Datum::Int(v) => out.extend_from_slice(&(*v as i64).to_le_bytes()),
            Datum::Long(v) => out.extend_from_slice(&v.to_le_bytes()),
            Datum::Double(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
            Datum::Varchar(s) => out.extend_from_slice(s.as_bytes()),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Int(v) => write!(f, "{}", v),
            Datum::Long(v) => write!(f, "{}", v),
            Datum::Double(v) => write!(f, "{}", v),
            Datum::Varchar(s) => write!(f, "{}", s),
        }
    }
}

/// One row in the order of the destination relation's schema.
#[derive(Clone, Debug, PartialEq)]
pub struct Tuple {
    values: Vec<Datum>,
}

impl Tuple {
    pub fn new(values: Vec<Datum>) -> Self {
        Self { values }
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, attr: AttributeId) -> &Datum {
        &self.values[attr.as_usize()]
    }

    pub fn values(&self) -> &[Datum] {
        &self.values
    }

    /// Stored size of the whole tuple, excluding the block's per-slot
    /// overhead (the block adds that itself).
    pub fn byte_size(&self) -> u64 {
        self.values.iter().map(Datum::byte_size).sum()
    }

    /// Reorder this tuple through an attribute map: output attribute `i`
    /// takes the value of input attribute `map[i]`.
    pub fn project(&self, attribute_map: &[AttributeId]) -> Tuple {
        Tuple {
            values: attribute_map
                .iter()
                .map(|attr| self.values[attr.as_usize()].clone())
                .collect(),
        }
    }
}
