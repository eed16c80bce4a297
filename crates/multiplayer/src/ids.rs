//! Strongly typed identifiers for connections and sessions.

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Incrementing id source, local to one coordinator.
#[derive(Debug)]
pub struct IdGenerator {
    counter: Cell<u64>,
}

impl IdGenerator {
    pub fn new(start: u64) -> Self {
        Self {
            counter: Cell::new(start),
        }
    }

    #[inline]
    pub fn next(&self) -> u64 {
        let value = self.counter.get();
        self.counter.set(value.wrapping_add(1));
        value
    }
}

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self(0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(ConnectionId);
id_type!(SessionId);
