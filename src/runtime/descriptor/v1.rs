//! Legacy runtime class layout.
//!
//! The legacy runtime stores everything directly in the class structure, six consecutive
//! pointer-sized fields: isa, superclass, name, version, info, instance size.

use bitflags::bitflags;

use crate::{
    config::IntrospectorConfig,
    memory::{MemoryView, PointerWidth, StructReader},
    runtime::{descriptor::read_class_name, pointer::check_aligned, SystemParameters},
    Result,
};

bitflags! {
    /// The legacy class `info` word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassInfoFlags: u64 {
        /// The structure describes a class
        const CLASS = 0x1;
        /// The structure describes a metaclass
        const META = 0x2;
    }
}

/// A class resolved through the legacy runtime layout.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassDataV1 {
    /// Address of the class structure
    pub address: u64,
    /// The class structure's own isa (its metaclass)
    pub isa: u64,
    /// Superclass structure address; zero for a root class
    pub superclass: u64,
    /// Address of the class name string
    pub name_pointer: u64,
    /// Class version field
    pub version: u64,
    /// Class info word
    pub info: ClassInfoFlags,
    /// Unaligned instance size
    pub instance_size: u64,
    /// Class name
    pub name: String,
    /// Pointer width of the process the class was read from
    pub pointer_width: PointerWidth,
}

impl ClassDataV1 {
    /// Parses the class structure at `address`.
    ///
    /// Unlike the modern layout, the name pointer must be pointer-aligned here. A legacy class
    /// whose name string sits at a misaligned address is rejected, even though the string
    /// itself may be readable.
    ///
    /// # Errors
    ///
    /// Fails if a field is unreadable, the isa / superclass / name pointers are misaligned, or
    /// the name is not an identifier.
    pub fn parse(
        memory: &dyn MemoryView,
        params: &SystemParameters,
        config: &IntrospectorConfig,
        address: u64,
    ) -> Result<Self> {
        let width = params.pointer_width;
        check_aligned("class", address, width, false)?;

        let mut class = StructReader::new(memory, address);
        let isa = check_aligned("isa", class.read_pointer()?, width, false)?;
        let superclass = check_aligned("superclass", class.read_pointer()?, width, true)?;
        let name_pointer = check_aligned("name", class.read_pointer()?, width, false)?;
        let version = class.read_pointer()?;
        let info = ClassInfoFlags::from_bits_retain(class.read_pointer()?);
        let instance_size = class.read_pointer()?;

        let name = read_class_name(memory, name_pointer, config.max_name_length)?;

        Ok(ClassDataV1 {
            address,
            isa,
            superclass,
            name_pointer,
            version,
            info,
            instance_size,
            name,
            pointer_width: width,
        })
    }

    /// `true` if the info word marks a metaclass.
    #[must_use]
    pub fn is_metaclass(&self) -> bool {
        self.info.contains(ClassInfoFlags::META)
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
    fn parse_flat_layout() {
        let mut process = ProcessBuilder::legacy(PointerWidth::Four);
        let root = process.add_class(ClassSpec::new("Object").instance_size(4));
        let class = process.add_class(
            ClassSpec::new("NSString")
                .superclass(root)
                .instance_size(10)
                .flags(ClassInfoFlags::CLASS.bits() as u32),
        );
        let (memory, params) = process.build();

        let data =
            ClassDataV1::parse(&memory, &params, &IntrospectorConfig::default(), class).unwrap();
        assert_eq!(data.name, "NSString");
        assert_eq!(data.superclass, root);
        assert_eq!(data.instance_size, 10);
        assert!(data.info.contains(ClassInfoFlags::CLASS));
        assert!(!data.is_metaclass());
    }

    #[test]
    fn null_name_pointer_is_rejected() {
        let mut process = ProcessBuilder::legacy(PointerWidth::Eight);
        let class = process.add_class(ClassSpec::new("Object"));
        process.write_pointer(class + 16, 0);
        let (memory, params) = process.build();

        assert_eq!(
            ClassDataV1::parse(&memory, &params, &IntrospectorConfig::default(), class),
            Err(Error::MisalignedOrDisallowedPointer {
                field: "name",
                value: 0
            })
        );
    }

    #[test]
    fn readable_misaligned_name_is_rejected() {
        let mut process = ProcessBuilder::legacy(PointerWidth::Eight);
        let class = process.add_class(ClassSpec::new("Object"));
        let packed = process.alloc_c_string("_Packed") + 1;
        process.write_pointer(class + 16, packed);
        let (memory, params) = process.build();

        assert_eq!(
            ClassDataV1::parse(&memory, &params, &IntrospectorConfig::default(), class),
            Err(Error::MisalignedOrDisallowedPointer {
                field: "name",
                value: packed
            })
        );
    }

    #[test]
    fn misaligned_superclass_is_rejected() {
        let mut process = ProcessBuilder::legacy(PointerWidth::Eight);
        let class = process.add_class(ClassSpec::new("Object"));
        process.write_pointer(class + 8, 0x2004);
        let (memory, params) = process.build();

        assert!(
            ClassDataV1::parse(&memory, &params, &IntrospectorConfig::default(), class).is_err()
        );
    }

    #[test]
    fn garbage_name_is_rejected() {
        let mut process = ProcessBuilder::legacy(PointerWidth::Eight);
        let class = process.add_class(ClassSpec::new("Object"));
        let garbage = process.alloc_bytes(&[0x7F; 32]);
        process.write_pointer(class + 16, garbage);
        let (memory, params) = process.build();

        assert_eq!(
            ClassDataV1::parse(&memory, &params, &IntrospectorConfig::default(), class),
            Err(Error::CorruptIdentifier { address: garbage })
        );
    }
}
