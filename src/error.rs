use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Nearly every variant describes a reason why a piece of inspected memory could not be trusted.
/// The resolution engine absorbs these locally: a failed parse becomes
/// [`crate::ClassDescriptor::Invalid`] and the error itself is only logged. The variants stay
/// public so that callers driving the lower layers (e.g. [`crate::StructReader`] or
/// [`crate::runtime::TaggedValueDecoder`]) can tell the failure modes apart.
///
/// # Error Categories
///
/// ## Memory Errors
/// - [`Error::AbsentMemory`] - A read failed (unmapped, process gone, process running)
///
/// ## Structural Errors
/// - [`Error::MisalignedOrDisallowedPointer`] - A field failed pointer validation
/// - [`Error::CorruptIdentifier`] - A class name dereferenced to non-identifier bytes
/// - [`Error::UnknownTagClass`] - Tag bits outside the known tagged-class table
/// - [`Error::Malformed`] - Any other structural oddity
///
/// ## Environment Errors
/// - [`Error::UnknownRuntimeGeneration`] - The runtime library could not be located
///
/// # Examples
///
/// ```rust
/// use objscope::{Error, MemorySnapshot, MemoryView, PointerWidth, ProcessId};
///
/// let snapshot = MemorySnapshot::new(ProcessId::new(1), PointerWidth::Eight);
/// match snapshot.read_pointer(0x1000) {
///     Err(Error::AbsentMemory { address }) => assert_eq!(address, 0x1000),
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A memory read returned nothing.
    ///
    /// The address is unmapped, the process exited, or it is running and cannot be read. Treated
    /// like a null value by every consumer.
    #[error("No readable memory at 0x{address:x}")]
    AbsentMemory {
        /// The address that could not be read
        address: u64,
    },

    /// A structure field holds a value that can not be a genuine runtime pointer.
    ///
    /// Either it is not aligned to the process pointer width, it is null where null is not
    /// permitted, or it uses one of the high bits the runtime never sets in class pointers.
    #[error("Field '{field}' holds an invalid pointer 0x{value:x}")]
    MisalignedOrDisallowedPointer {
        /// Name of the structure field that failed validation
        field: &'static str,
        /// The offending raw value
        value: u64,
    },

    /// A class name pointer dereferenced to bytes outside the identifier character set.
    #[error("Class name at 0x{address:x} is not a valid identifier")]
    CorruptIdentifier {
        /// Address the name was read from
        address: u64,
    },

    /// The class bits of a tagged value are not present in the active tagged-class table.
    #[error("Unknown tagged class bits {class_bits}")]
    UnknownTagClass {
        /// The extracted 3-bit class index
        class_bits: u8,
    },

    /// The runtime library or its sections could not be found in the inspected process.
    #[error("Could not determine the object runtime generation")]
    UnknownRuntimeGeneration,

    /// The inspected memory is damaged or in a state that can not be interpreted.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_macro_records_location() {
        let err = malformed_error!("isa sentinel {}", 1);
        match err {
            Error::Malformed {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "isa sentinel 1");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            Error::AbsentMemory { address: 0x10 }.to_string(),
            "No readable memory at 0x10"
        );
        assert_eq!(
            Error::MisalignedOrDisallowedPointer {
                field: "superclass",
                value: 0x13
            }
            .to_string(),
            "Field 'superclass' holds an invalid pointer 0x13"
        );
        assert_eq!(
            Error::UnknownTagClass { class_bits: 2 }.to_string(),
            "Unknown tagged class bits 2"
        );
    }
}
