//! Reservation method packed into a single integer stored on a copy.
//!
//! Bit layout: the attribute class lives in the low nibble (`0x0F`), the
//! reserve-by-filesystem flag is `0x10` and the reserve-by-set flag is
//! `0x20`. Negative codes are the archiver's "unset" marker and decode to no
//! reservation.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Mask covering the attribute class bits.
pub const ATTRIBUTE_MASK: i32 = 0x0F;
/// Reserve by directory.
pub const ATTRIBUTE_DIRECTORY: u8 = 0x01;
/// Reserve by user.
pub const ATTRIBUTE_USER: u8 = 0x02;
/// Reserve by group.
pub const ATTRIBUTE_GROUP: u8 = 0x04;
/// Reserve by filesystem flag.
pub const RESERVE_FS: i32 = 0x10;
/// Reserve by volume set flag.
pub const RESERVE_SET: i32 = 0x20;

/// Decoded reservation method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationMethod {
    attribute: u8,
    reserve_set: bool,
    reserve_fs: bool,
}

impl ReservationMethod {
    /// No reservation at all.
    pub const NONE: Self = Self {
        attribute: 0,
        reserve_set: false,
        reserve_fs: false,
    };

    /// Assemble a method from its components; the attribute is masked to
    /// the attribute bits.
    #[must_use]
    pub const fn new(attribute: u8, reserve_set: bool, reserve_fs: bool) -> Self {
        Self {
            attribute: attribute & (ATTRIBUTE_MASK as u8),
            reserve_set,
            reserve_fs,
        }
    }

    /// Restricted form used when adding a single copy to an existing policy:
    /// either reserve by volume set or nothing.
    #[must_use]
    pub const fn from_set_toggle(reserve_set: bool) -> Self {
        Self::new(0, reserve_set, false)
    }

    /// Unpack a stored code.
    #[must_use]
    pub const fn decode(code: i32) -> Self {
        if code < 0 {
            return Self::NONE;
        }
        Self {
            attribute: (code & ATTRIBUTE_MASK) as u8,
            reserve_set: code & RESERVE_SET != 0,
            reserve_fs: code & RESERVE_FS != 0,
        }
    }

    /// Pack into a stored code.
    #[must_use]
    pub const fn encode(&self) -> i32 {
        let mut code = self.attribute as i32 & ATTRIBUTE_MASK;
        if self.reserve_set {
            code |= RESERVE_SET;
        }
        if self.reserve_fs {
            code |= RESERVE_FS;
        }
        code
    }

    /// Raw attribute code; 0 means no attribute.
    #[must_use]
    pub const fn attribute(&self) -> u8 {
        self.attribute
    }

    /// Attribute choice for display; `None` is the distinguished "none" option.
    #[must_use]
    pub const fn attribute_choice(&self) -> Option<u8> {
        if self.attribute == 0 {
            None
        } else {
            Some(self.attribute)
        }
    }

    /// Whether reserve-by-volume-set is enabled.
    #[must_use]
    pub const fn reserve_set(&self) -> bool {
        self.reserve_set
    }

    /// Whether reserve-by-filesystem is enabled.
    #[must_use]
    pub const fn reserve_fs(&self) -> bool {
        self.reserve_fs
    }

    /// True when nothing is reserved.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.attribute == 0 && !self.reserve_set && !self.reserve_fs
    }
}

impl Display for ReservationMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("none");
        }
        let mut parts = Vec::new();
        match self.attribute_choice() {
            None => {}
            Some(ATTRIBUTE_DIRECTORY) => parts.push("directory".to_string()),
            Some(ATTRIBUTE_USER) => parts.push("user".to_string()),
            Some(ATTRIBUTE_GROUP) => parts.push("group".to_string()),
            Some(other) => parts.push(format!("attribute:{other}")),
        }
        if self.reserve_set {
            parts.push("set".to_string());
        }
        if self.reserve_fs {
            parts.push("fs".to_string());
        }
        f.write_str(&parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_codes_are_none() {
        assert!(ReservationMethod::decode(0).is_none());
        assert!(ReservationMethod::decode(-1).is_none());
        assert_eq!(ReservationMethod::decode(-1).to_string(), "none");
    }

    #[test]
    fn components_decode_independently() {
        let method = ReservationMethod::decode(RESERVE_SET | i32::from(ATTRIBUTE_USER));
        assert_eq!(method.attribute_choice(), Some(ATTRIBUTE_USER));
        assert!(method.reserve_set());
        assert!(!method.reserve_fs());
        assert_eq!(method.to_string(), "user,set");
    }

    #[test]
    fn flags_without_attribute_render_none_choice() {
        let method = ReservationMethod::new(0, true, true);
        assert_eq!(method.attribute_choice(), None);
        assert!(!method.is_none());
        assert_eq!(method.to_string(), "set,fs");
    }

    #[test]
    fn attribute_is_masked_on_construction() {
        let method = ReservationMethod::new(0xF2, false, true);
        assert_eq!(method.attribute(), 0x02);
        assert_eq!(method.encode(), 0x12);
    }

    #[test]
    fn set_toggle_is_set_or_nothing() {
        assert_eq!(ReservationMethod::from_set_toggle(true).encode(), RESERVE_SET);
        assert!(ReservationMethod::from_set_toggle(false).is_none());
    }
}
