//! Pointer and identifier plausibility checks.
//!
//! These predicates are the first line of defence against garbage memory. They are pure and
//! cheap; every link of a class-metadata chain is run through them before it is dereferenced.

use crate::{memory::PointerWidth, Error, Result};

/// Bits the runtime never sets in a genuine class pointer (bits 47 through 63).
pub const DISALLOWED_POINTER_MASK: u64 = 0xFFFF_8000_0000_0000;

/// `true` if `value` is aligned to `width`, or is one of the explicitly permitted exceptions.
///
/// * Zero is accepted only when `allow_null` is set.
/// * Odd values are accepted when `allow_tagged` is set, since tagged references carry their tag
///   in the low bit.
/// * Everything else must be a multiple of the pointer width.
#[must_use]
pub fn is_valid_pointer(
    value: u64,
    width: PointerWidth,
    allow_tagged: bool,
    allow_null: bool,
) -> bool {
    if value == 0 {
        return allow_null;
    }
    if allow_tagged && value % 2 == 1 {
        return true;
    }
    value % width.bytes() == 0
}

/// `true` if none of bits 47 through 63 of `value` are set.
#[must_use]
pub fn is_allowed_pointer(value: u64) -> bool {
    value & DISALLOWED_POINTER_MASK == 0
}

/// `true` if `name` is non-empty and made only of ASCII letters, digits and `$ % _ . -`.
///
/// The runtime itself does not restrict class names; this is the set seen in practice and is
/// what separates a real name from a dereferenced pointer to unrelated bytes. Class names
/// outside this set are reported as corrupt.
#[must_use]
pub fn is_valid_identifier(name: &[u8]) -> bool {
    !name.is_empty()
        && name
            .iter()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, b'$' | b'%' | b'_' | b'.' | b'-'))
}

/// Checks a structure field as a non-tagged, aligned pointer.
///
/// A zero value passes only when `nullable` is set.
///
/// # Errors
///
/// Returns [`Error::MisalignedOrDisallowedPointer`] naming `field` when the value is rejected.
pub fn check_aligned(
    field: &'static str,
    value: u64,
    width: PointerWidth,
    nullable: bool,
) -> Result<u64> {
    if is_valid_pointer(value, width, false, nullable) {
        Ok(value)
    } else {
        Err(Error::MisalignedOrDisallowedPointer { field, value })
    }
}

/// Checks a structure field as a non-tagged, aligned, allowed pointer.
///
/// A zero value passes only when `nullable` is set; it then skips the remaining checks.
///
/// # Errors
///
/// Returns [`Error::MisalignedOrDisallowedPointer`] naming `field` when the value is rejected.
pub fn check_field(
    field: &'static str,
    value: u64,
    width: PointerWidth,
    nullable: bool,
) -> Result<u64> {
    if value == 0 && nullable {
        return Ok(value);
    }
    check_aligned(field, value, width, false)?;
    if is_allowed_pointer(value) {
        Ok(value)
    } else {
        Err(Error::MisalignedOrDisallowedPointer { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_pointers_are_aligned_and_non_null() {
        for width in [PointerWidth::Four, PointerWidth::Eight] {
            for p in 0u64..=64 {
                let expected = p != 0 && p % width.bytes() == 0;
                assert_eq!(is_valid_pointer(p, width, false, false), expected, "{p} {width}");
            }
        }
        assert!(is_valid_pointer(0x1_0000_0000, PointerWidth::Eight, false, false));
        assert!(!is_valid_pointer(0x1_0000_0004, PointerWidth::Eight, false, false));
        assert!(is_valid_pointer(0x1_0000_0004, PointerWidth::Four, false, false));
    }

    #[test]
    fn null_and_tagged_exceptions() {
        assert!(is_valid_pointer(0, PointerWidth::Eight, false, true));
        assert!(!is_valid_pointer(0, PointerWidth::Eight, true, false));

        for p in [1u64, 3, 0x1234_5677, 0xFFFF_FFFF_FFFF_FFFF] {
            assert!(is_valid_pointer(p, PointerWidth::Eight, true, false));
            assert!(!is_valid_pointer(p, PointerWidth::Eight, false, false));
        }

        // Even but misaligned values are not rescued by allow_tagged.
        assert!(!is_valid_pointer(2, PointerWidth::Eight, true, false));
    }

    #[test]
    fn allowed_pointer_high_bits() {
        assert!(is_allowed_pointer(0));
        assert!(is_allowed_pointer(0x0000_7FFF_FFFF_FFF8));
        for bit in 47..64 {
            assert!(!is_allowed_pointer(1u64 << bit), "bit {bit}");
            assert!(!is_allowed_pointer(0x1000 | (1u64 << bit)), "bit {bit}");
        }
        for bit in 0..47 {
            assert!(is_allowed_pointer(1u64 << bit), "bit {bit}");
        }
    }

    #[test]
    fn identifiers() {
        assert!(!is_valid_identifier(b""));
        assert!(is_valid_identifier(b"NSObject"));
        assert!(is_valid_identifier(b"_TtC5Hello$Wor%ld.v2-x"));
        assert!(!is_valid_identifier(b"NS\x00Bad"));
        assert!(!is_valid_identifier(b"NS Object"));
        assert!(!is_valid_identifier(&[0xC3, 0xA9]));
        assert!(!is_valid_identifier(&[0xFF; 128]));
    }

    #[test]
    fn field_checks() {
        assert_eq!(
            check_field("isa", 0x1000, PointerWidth::Eight, false),
            Ok(0x1000)
        );
        assert_eq!(check_field("superclass", 0, PointerWidth::Eight, true), Ok(0));
        assert_eq!(
            check_field("cache", 0, PointerWidth::Eight, false),
            Err(Error::MisalignedOrDisallowedPointer {
                field: "cache",
                value: 0
            })
        );
        assert!(check_field("data", 0x1004, PointerWidth::Eight, false).is_err());
        assert!(check_field("data", 0x8000_0000_0000, PointerWidth::Eight, false).is_err());

        // Alignment alone does not look at the high bits.
        assert!(check_aligned("name", 0x8000_0000_0000, PointerWidth::Eight, false).is_ok());
        assert!(check_aligned("name", 0, PointerWidth::Eight, false).is_err());
        assert!(check_aligned("super", 0, PointerWidth::Four, true).is_ok());
    }
}
