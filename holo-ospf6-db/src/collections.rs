//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use generational_arena::Index;

pub type LsaEntryIndex = Index;
pub type RouteIndex = Index;

#[derive(Debug)]
pub struct Arena<T>(generational_arena::Arena<T>);

// ===== impl Arena =====

impl<T> Arena<T> {
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn insert(&mut self, value: T) -> Index {
        self.0.insert(value)
    }

    pub(crate) fn remove(&mut self, index: Index) -> Option<T> {
        self.0.remove(index)
    }

    pub(crate) fn get(&self, index: Index) -> Option<&T> {
        self.0.get(index)
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Arena<T> {
        Arena(Default::default())
    }
}

impl<T> std::ops::Index<Index> for Arena<T> {
    type Output = T;

    fn index(&self, index: Index) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> std::ops::IndexMut<Index> for Arena<T> {
    fn index_mut(&mut self, index: Index) -> &mut Self::Output {
        &mut self.0[index]
    }
}
