//! The field-mask bitset governing masked entry updates.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Selects which [`Entry`](crate::Entry) fields a masked update touches.
///
/// A `modify-entry` instruction carries a value record plus a mask; only
/// masked fields are merged into the target entry. The empty mask selects
/// nothing and encoders must not emit instructions for it.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldMask(u64);

macro_rules! field_flags {
    ($($(#[$doc:meta])* $name:ident = $bit:expr;)+) => {
        impl FieldMask {
            $(
                $(#[$doc])*
                pub const $name: FieldMask = FieldMask(1 << $bit);
            )+

            /// Every defined field.
            pub const ALL: FieldMask = FieldMask($((1 << $bit))|+);

            const NAMES: &'static [(u64, &'static str)] = &[
                $((1 << $bit, stringify!($name)),)+
            ];
        }
    };
}

field_flags! {
    /// `revision`
    REVISION = 0;
    /// `url`
    URL = 1;
    /// `repos`
    REPOS = 2;
    /// `uuid`
    UUID = 3;
    /// `kind`
    KIND = 4;
    /// `schedule`
    SCHEDULE = 5;
    /// `copied`
    COPIED = 6;
    /// `deleted`
    DELETED = 7;
    /// `absent`
    ABSENT = 8;
    /// `incomplete`
    INCOMPLETE = 9;
    /// `copyfrom-url`
    COPYFROM_URL = 10;
    /// `copyfrom-rev`
    COPYFROM_REV = 11;
    /// `conflict-old`
    CONFLICT_OLD = 12;
    /// `conflict-new`
    CONFLICT_NEW = 13;
    /// `conflict-wrk`
    CONFLICT_WRK = 14;
    /// `prejfile`
    PREJFILE = 15;
    /// `text-time`
    TEXT_TIME = 16;
    /// `prop-time`
    PROP_TIME = 17;
    /// `checksum`
    CHECKSUM = 18;
    /// `committed-rev`
    CMT_REV = 19;
    /// `committed-date`
    CMT_DATE = 20;
    /// `committed-author`
    CMT_AUTHOR = 21;
    /// `lock-token`
    LOCK_TOKEN = 22;
    /// `lock-owner`
    LOCK_OWNER = 23;
    /// `lock-comment`
    LOCK_COMMENT = 24;
    /// `lock-creation-date`
    LOCK_CREATION_DATE = 25;
    /// `has-props`
    HAS_PROPS = 26;
    /// `has-prop-mods`
    HAS_PROP_MODS = 27;
    /// `cachable-props`
    CACHABLE_PROPS = 28;
    /// `present-props`
    PRESENT_PROPS = 29;
}

impl FieldMask {
    /// The empty mask.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Reports whether no field is selected.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Reports whether every field in `other` is selected.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// The mask with every field of `other` deselected.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// All four lock fields at once.
    #[must_use]
    pub const fn lock_fields() -> Self {
        Self(
            Self::LOCK_TOKEN.0
                | Self::LOCK_OWNER.0
                | Self::LOCK_COMMENT.0
                | Self::LOCK_CREATION_DATE.0,
        )
    }
}

impl BitOr for FieldMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FieldMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for (bit, name) in Self::NAMES {
            if self.0 & bit != 0 {
                set.entry(&name);
            }
        }
        set.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_contains_nothing() {
        assert!(FieldMask::empty().is_empty());
        assert!(!FieldMask::empty().contains(FieldMask::REVISION));
        assert!(FieldMask::ALL.contains(FieldMask::PRESENT_PROPS));
    }

    #[test]
    fn union_accumulates() {
        let mut mask = FieldMask::REVISION;
        mask |= FieldMask::KIND | FieldMask::SCHEDULE;
        assert!(mask.contains(FieldMask::KIND));
        assert!(!mask.contains(FieldMask::URL));
        let mask = mask.without(FieldMask::KIND);
        assert!(!mask.contains(FieldMask::KIND));
        assert!(mask.contains(FieldMask::REVISION));
    }

    #[test]
    fn lock_fields_cover_all_four() {
        let mask = FieldMask::lock_fields();
        assert!(mask.contains(FieldMask::LOCK_TOKEN));
        assert!(mask.contains(FieldMask::LOCK_CREATION_DATE));
        assert!(!mask.contains(FieldMask::CHECKSUM));
    }
}
