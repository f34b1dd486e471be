//! Feed scopes and the forgiving paginator shared by every feed view.

use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};

pub const PAGE_SIZE: u64 = 10;

/// Which posts a feed draws from. Every scope is ordered newest-first.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum FeedScope {
    Global,
    Author(Id<UserMarker>),
    /// Posts by everyone the given user follows.
    FollowedBy(Id<UserMarker>),
}

/// A 1-based page number as requested by a client.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageNumber(u64);

impl PageNumber {
    pub const FIRST: Self = Self(1);

    /// Missing, unparsable, zero or negative input all request the first page.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|raw| raw.trim().parse::<u64>().ok())
            .map_or(Self::FIRST, Self::new)
    }

    #[must_use]
    pub fn new(number: u64) -> Self {
        Self(number.max(1))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

/// The slice of a feed that a request resolves to once the total is known.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub offset: u64,
    pub limit: u64,
}

impl PageWindow {
    /// Clamps the requested page into `1..=num_pages`. An empty feed still has one page.
    #[must_use]
    pub fn resolve(requested: PageNumber, total: u64) -> Self {
        let num_pages = total.div_ceil(PAGE_SIZE).max(1);
        let number = requested.get().min(num_pages);

        Self {
            number,
            num_pages,
            offset: (number - 1) * PAGE_SIZE,
            limit: PAGE_SIZE,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(window: PageWindow, total: u64, items: Vec<T>) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total,
            has_previous: window.number > 1,
            has_next: window.number < window.num_pages,
        }
    }
}
