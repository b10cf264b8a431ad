//! The method bitmask used for callback binding: GET=1, PUT=2, POST=4, DELETE=8.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use http::Method;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Methods(u8);

impl Methods {
    pub const NONE: Methods = Methods(0);
    pub const GET: Methods = Methods(1);
    pub const PUT: Methods = Methods(2);
    pub const POST: Methods = Methods(4);
    pub const DELETE: Methods = Methods(8);
    pub const ALL: Methods = Methods(0x0f);

    const TABLE: [(Methods, Method); 4] =
        [(Methods::GET, Method::GET), (Methods::PUT, Method::PUT), (Methods::POST, Method::POST), (Methods::DELETE, Method::DELETE)];

    /// Builds a mask from raw bits, `None` if any bit outside [`Methods::ALL`] is set.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL.0 == 0 { Some(Methods(bits)) } else { None }
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// The single-method mask for `method`, `None` for methods outside the mask.
    pub fn from_method(method: &Method) -> Option<Self> {
        Self::TABLE.iter().find(|(_, candidate)| candidate == method).map(|(mask, _)| *mask)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Methods) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Methods) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn union(self, other: Methods) -> Methods {
        Methods(self.0 | other.0)
    }

    #[must_use]
    pub const fn intersection(self, other: Methods) -> Methods {
        Methods(self.0 & other.0)
    }

    #[must_use]
    pub const fn difference(self, other: Methods) -> Methods {
        Methods(self.0 & !other.0)
    }

    /// The HTTP methods in this mask, in GET, PUT, POST, DELETE order.
    pub fn iter(self) -> impl Iterator<Item = Method> {
        Self::TABLE.into_iter().filter(move |(mask, _)| self.contains(*mask)).map(|(_, method)| method)
    }
}

impl BitOr for Methods {
    type Output = Methods;

    fn bitor(self, rhs: Methods) -> Methods {
        self.union(rhs)
    }
}

impl BitOrAssign for Methods {
    fn bitor_assign(&mut self, rhs: Methods) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for Methods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
