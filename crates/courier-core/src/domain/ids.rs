//! Strongly-typed identifiers.
//!
//! All ids share one ULID-backed `Id<T>`; the marker type `T` only exists at
//! compile time, so an `ItemId` can never be passed where a `RunId` is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait supplying the display prefix of an id type.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed id.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for queue items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Item {}

impl IdMarker for Item {
    fn prefix() -> &'static str {
        "item-"
    }
}

/// Marker for scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Run {}

impl IdMarker for Run {
    fn prefix() -> &'static str {
        "run-"
    }
}

/// Identifier of one queue item (one recipient within a run).
pub type ItemId = Id<Item>;

/// Identifier of one scheduler run.
pub type RunId = Id<Run>;
