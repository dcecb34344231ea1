//! Modern runtime class layout.
//!
//! A class structure on the modern runtime does not hold its name or size directly. They sit
//! two indirections away:
//!
//! ```text
//! class_t                    class_rw_t            class_ro_t
//! +----------------+         +-----------+         +------------------------+
//! | isa            |   +---> | flags u32 |   +---> | flags          u32     |
//! | superclass     |   |     | version   |   |     | instance_start u32     |
//! | cache          |   |     | ro -------+---+     | instance_size  u32     |
//! | vtable         |   |     +-----------+         | ...                    |
//! | data ----------+---+                           | name  (+24 / +16) -----+--> "NSFoo\0"
//! +----------------+                               +------------------------+
//! ```
//!
//! Each pointer is validated before it is followed. The name pointer is exempt from the
//! alignment check since name strings are packed; it is validated by dereferencing it instead.

use bitflags::bitflags;

use crate::{
    config::IntrospectorConfig,
    memory::{MemoryView, PointerWidth, StructReader},
    runtime::{
        descriptor::read_class_name,
        pointer::{check_aligned, check_field},
        SystemParameters,
    },
    Result,
};

/// Offset of the read-only data pointer inside the read-write data.
const RW_RO_OFFSET: u64 = 8;

bitflags! {
    /// Flags word at the start of the read-only class data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassRoFlags: u32 {
        /// The structure describes a metaclass
        const META = 0x1;
        /// The class is a root class
        const ROOT = 0x2;
        /// The class has C++ constructors / destructors
        const HAS_CXX_STRUCTORS = 0x4;
    }
}

/// A class resolved through the modern runtime layout.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassDataV2 {
    /// Address of the class structure
    pub address: u64,
    /// The class structure's own isa (its metaclass)
    pub isa: u64,
    /// Superclass structure address; zero for a root class
    pub superclass: u64,
    /// Method cache pointer
    pub cache: u64,
    /// Dispatch table pointer
    pub vtable: u64,
    /// Read-write class data pointer
    pub rw_data: u64,
    /// Read-only class data pointer
    pub ro_data: u64,
    /// Flags from the read-only data
    pub flags: ClassRoFlags,
    /// Offset of the first instance variable
    pub instance_start: u32,
    /// Unaligned instance size
    pub instance_size: u64,
    /// Class name
    pub name: String,
    /// Pointer width of the process the class was read from
    pub pointer_width: PointerWidth,
}

impl ClassDataV2 {
    /// Parses the class structure at `address`.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable field, invalid pointer or corrupt name in the chain.
    pub fn parse(
        memory: &dyn MemoryView,
        params: &SystemParameters,
        config: &IntrospectorConfig,
        address: u64,
    ) -> Result<Self> {
        let width = params.pointer_width;
        check_aligned("class", address, width, false)?;

        let mut class = StructReader::new(memory, address);
        let isa = check_field("isa", class.read_pointer()?, width, false)?;
        let superclass = check_field("superclass", class.read_pointer()?, width, true)?;
        let cache = check_field("cache", class.read_pointer()?, width, false)?;
        let vtable = check_field("vtable", class.read_pointer()?, width, false)?;
        let rw_data = check_field("data", class.read_pointer()?, width, false)?;

        let mut rw = StructReader::new(memory, rw_data);
        rw.seek(RW_RO_OFFSET);
        let ro_data = check_field("ro", rw.read_pointer()?, width, false)?;

        let mut ro = StructReader::new(memory, ro_data);
        let flags = ClassRoFlags::from_bits_retain(ro.read_u32()?);
        let instance_start = ro.read_u32()?;
        let instance_size = u64::from(ro.read_u32()?);
        ro.seek(if params.is_64_bit() { 24 } else { 16 });
        let name_pointer = ro.read_pointer()?;
        let name = read_class_name(memory, name_pointer, config.max_name_length)?;

        Ok(ClassDataV2 {
            address,
            isa,
            superclass,
            cache,
            vtable,
            rw_data,
            ro_data,
            flags,
            instance_start,
            instance_size,
            name,
            pointer_width: width,
        })
    }

    /// `true` if the read-only data is flagged as a metaclass.
    #[must_use]
    pub fn is_metaclass(&self) -> bool {
        self.flags.contains(ClassRoFlags::META)
    }

    /// `true` if the read-only data is flagged as a root class.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.flags.contains(ClassRoFlags::ROOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::{ClassSpec, ProcessBuilder},
        Error,
    };

    #[test]
    fn parse_64_bit() {
        let mut process = ProcessBuilder::modern(PointerWidth::Eight);
        let class = process.add_class(
            ClassSpec::new("NSObject")
                .instance_size(8)
                .flags(ClassRoFlags::ROOT.bits()),
        );
        let (memory, params) = process.build();

        let data = ClassDataV2::parse(&memory, &params, &IntrospectorConfig::default(), class)
            .unwrap();
        assert_eq!(data.address, class);
        assert_eq!(data.name, "NSObject");
        assert_eq!(data.superclass, 0);
        assert_eq!(data.instance_size, 8);
        assert!(data.is_root());
        assert!(!data.is_metaclass());
    }

    #[test]
    fn parse_32_bit_uses_short_name_offset() {
        let mut process = ProcessBuilder::modern(PointerWidth::Four);
        let root = process.add_class(ClassSpec::new("NSObject").instance_size(4));
        let class = process.add_class(
            ClassSpec::new("NSView")
                .superclass(root)
                .instance_size(13),
        );
        let (memory, params) = process.build();

        let data = ClassDataV2::parse(&memory, &params, &IntrospectorConfig::default(), class)
            .unwrap();
        assert_eq!(data.name, "NSView");
        assert_eq!(data.superclass, root);
        assert_eq!(data.instance_size, 13);
    }

    #[test]
    fn every_class_field_is_validated() {
        let config = IntrospectorConfig::default();
        for (index, field) in ["isa", "superclass", "cache", "vtable", "data"]
            .into_iter()
            .enumerate()
        {
            let mut process = ProcessBuilder::modern(PointerWidth::Eight);
            let class = process.add_class(ClassSpec::new("NSObject"));
            process.write_pointer(class + 8 * index as u64, 0x1003);
            let (memory, params) = process.build();

            assert_eq!(
                ClassDataV2::parse(&memory, &params, &config, class),
                Err(Error::MisalignedOrDisallowedPointer {
                    field,
                    value: 0x1003
                })
            );
        }
    }

    #[test]
    fn disallowed_high_bits_are_rejected() {
        let mut process = ProcessBuilder::modern(PointerWidth::Eight);
        let class = process.add_class(ClassSpec::new("NSObject"));
        process.write_pointer(class + 16, 0x8000_0000_1000);
        let (memory, params) = process.build();

        assert!(ClassDataV2::parse(&memory, &params, &IntrospectorConfig::default(), class)
            .is_err());
    }

    #[test]
    fn null_non_superclass_fields_are_rejected() {
        let mut process = ProcessBuilder::modern(PointerWidth::Eight);
        let class = process.add_class(ClassSpec::new("NSObject"));
        process.write_pointer(class + 24, 0);
        let (memory, params) = process.build();

        assert!(ClassDataV2::parse(&memory, &params, &IntrospectorConfig::default(), class)
            .is_err());
    }

    #[test]
    fn bad_ro_pointer_is_rejected() {
        let mut process = ProcessBuilder::modern(PointerWidth::Eight);
        let class = process.add_class(ClassSpec::new("NSObject"));
        let rw = process.read_pointer(class + 32);
        process.write_pointer(rw + 8, 0x2002);
        let (memory, params) = process.build();

        assert_eq!(
            ClassDataV2::parse(&memory, &params, &IntrospectorConfig::default(), class),
            Err(Error::MisalignedOrDisallowedPointer {
                field: "ro",
                value: 0x2002
            })
        );
    }

    #[test]
    fn misaligned_class_address_is_rejected() {
        let process = ProcessBuilder::modern(PointerWidth::Eight);
        let (memory, params) = process.build();
        assert!(ClassDataV2::parse(&memory, &params, &IntrospectorConfig::default(), 0x1004)
            .is_err());
    }
}
