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
//! Resettable tuple cursors handed to bulk insert paths.
//!
//! A consumer advances with `next()` and reads the row through
//! `current()`. A row that cannot be placed (destination block full) is
//! un-consumed with `rewind_to(position())`, so a caller observing
//! `is_exhausted() == false` after a bulk call knows exactly where the
//! next attempt resumes.

use crate::types::tuple::Tuple;

/// Cursor over a batch of tuples produced by an upstream operator.
pub trait ValueAccessor: Send {
    /// Restart iteration from the first tuple.
    fn reset(&mut self);

    /// Advance to the next tuple. Returns false when the batch is
    /// exhausted; `current()` must not be called afterwards.
    fn next(&mut self) -> bool;

    /// The tuple most recently yielded by `next()`.
    fn current(&self) -> &Tuple;

    /// Index of the tuple most recently yielded by `next()`.
    fn position(&self) -> usize;

    /// Make `next()` resume at `cursor`, un-consuming everything from
    /// `cursor` onward.
    fn rewind_to(&mut self, cursor: usize);

    /// True once every tuple has been consumed.
    fn is_exhausted(&self) -> bool;

    /// Total tuples in the batch.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accessor over a materialized vector of tuples.
pub struct TupleVectorValueAccessor {
    tuples: Vec<Tuple>,
    next_pos: usize,
    current: Option<usize>,
}

impl TupleVectorValueAccessor {
    pub fn new(tuples: Vec<Tuple>) -> Self {
        Self {
            tuples,
            next_pos: 0,
            current: None,
        }
    }
}

impl ValueAccessor for TupleVectorValueAccessor {
    fn reset(&mut self) {
        self.next_pos = 0;
        self.current = None;
    }

    fn next(&mut self) -> bool {
        if self.next_pos >= self.tuples.len() {
            self.current = None;
            return false;
        }
        self.current = Some(self.next_pos);
        self.next_pos += 1;
        true
    }

    fn current(&self) -> &Tuple {
        let idx = self.current.expect("value accessor current");
        &self.tuples[idx]
    }

    fn position(&self) -> usize {
        self.current.expect("value accessor position")
    }

    fn rewind_to(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.tuples.len());
        self.next_pos = cursor;
        self.current = None;
    }

    fn is_exhausted(&self) -> bool {
        self.next_pos >= self.tuples.len()
    }

    fn len(&self) -> usize {
        self.tuples.len()
    }
}
