use thiserror::Error;

use crate::proxy::Hresult;

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

macro_rules! out_of_bounds_error {
    ($offset:expr, $len:expr) => {
        crate::Error::OutOfBounds {
            offset: $offset,
            len: $len,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into three families that mirror the three stages of the pipeline:
///
/// ## Format errors
/// - [`Error::Malformed`] - Corrupted or invalid archive / object structure
/// - [`Error::OutOfBounds`] - A read would have crossed the end of the input
///
/// Both are always fatal to the unit being parsed (an archive, or a single member), see
/// [`Error::is_format`].
///
/// ## Linking errors
/// - [`Error::UnresolvedInterface`] - A base interface is not among the known signatures
/// - [`Error::InheritanceCycle`] - The base chain of an interface loops back on itself
/// - [`Error::InvalidSignature`] - A supplied interface description contradicts itself
///
/// ## Invocation errors
/// - [`Error::Invocation`] - The native method returned a failing `HRESULT`
/// - [`Error::ArgumentMismatch`], [`Error::UnknownMethod`] - The caller passed values that
///   do not fit the method signature
/// - [`Error::NullSlot`], [`Error::Released`] - The vtable can not, or may no longer, be used
///
/// # Examples
///
/// ```rust,no_run
/// use comlink::{archive::ArchiveReader, Error};
/// use std::path::Path;
///
/// match ArchiveReader::default().read_file(Path::new("uuid.lib")) {
///     Ok(library) => println!("{} members", library.archive().members().len()),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed archive: {} ({}:{})", message, file, line);
///     }
///     Err(Error::FileError(io_err)) => eprintln!("I/O error: {}", io_err),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Format errors
    /// The input is damaged and could not be parsed.
    ///
    /// The message names the offending offset or name; `file` and `line` record where in
    /// this crate the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the input.
    #[error("Out of bound read of {len} bytes at offset {offset}")]
    OutOfBounds {
        /// Offset at which the read started
        offset: usize,
        /// Number of bytes that were requested
        len: usize,
    },

    /// This input, or a feature it uses, is not supported.
    #[error("Not supported - {0}")]
    NotSupported(String),

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    // Linking errors
    /// An interface names a base interface that no signature describes.
    #[error("Interface '{interface}' derives from unknown interface '{missing}'")]
    UnresolvedInterface {
        /// The interface whose layout was requested
        interface: String,
        /// The base interface that could not be found
        missing: String,
    },

    /// The base chain of the named interface contains a cycle.
    #[error("Inheritance cycle through interface '{0}'")]
    InheritanceCycle(String),

    /// An interface description handed in by the IDL front end is inconsistent.
    #[error("Invalid signature for '{interface}' - {message}")]
    InvalidSignature {
        /// The interface being described
        interface: String,
        /// What is wrong with it
        message: String,
    },

    // Invocation errors
    /// A native method returned a failure status.
    ///
    /// This is a routine outcome of a COM call and carries the raw status so the caller
    /// can inspect it.
    #[error("{interface}::{method} failed with {status}")]
    Invocation {
        /// Interface the method belongs to
        interface: String,
        /// Method that was invoked
        method: String,
        /// The raw `HRESULT` returned by the call
        status: Hresult,
    },

    /// The values supplied for a call do not match the method signature.
    #[error("{method}: argument {index} - {message}")]
    ArgumentMismatch {
        /// Method that was invoked
        method: String,
        /// Zero-based position of the offending argument
        index: usize,
        /// What was expected
        message: String,
    },

    /// The layout has no method of this name.
    #[error("Interface '{interface}' has no method '{method}'")]
    UnknownMethod {
        /// Interface that was searched
        interface: String,
        /// The requested method name
        method: String,
    },

    /// The vtable of a live object holds a null pointer in a slot the layout declares.
    #[error("Slot {index} of '{interface}' holds a null function pointer")]
    NullSlot {
        /// Interface whose vtable was read
        interface: String,
        /// The vtable index
        index: usize,
    },

    /// The owning object was released; the proxy may no longer touch its vtable.
    #[error("Proxy for '{0}' was invalidated, the object has been released")]
    Released(String),
}

impl Error {
    /// Returns `true` for errors caused by malformed or truncated binary input.
    #[must_use]
    pub fn is_format(&self) -> bool {
        matches!(self, Error::Malformed { .. } | Error::OutOfBounds { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_family() {
        assert!(malformed_error!("bad magic").is_format());
        assert!(out_of_bounds_error!(12, 4).is_format());
        assert!(!Error::InheritanceCycle("IFoo".to_string()).is_format());
        assert!(!Error::Empty.is_format());
    }

    #[test]
    fn messages_keep_context() {
        let error = malformed_error!("Bad member header at offset {}", 68);
        assert!(error.to_string().contains("offset 68"));

        let error = Error::Invocation {
            interface: "IFoo".to_string(),
            method: "Bar".to_string(),
            status: Hresult(0x8000_4005_u32 as i32),
        };
        assert_eq!(error.to_string(), "IFoo::Bar failed with 0x80004005");
    }
}
