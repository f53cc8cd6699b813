use alloc::borrow::Cow;
use core::fmt::Display;

/// Error types used throughout the `elf_relocator` library.
///
/// Relocation failures are load-time and terminal for the affected image:
/// nothing is retried and writes already performed are not rolled back.
#[derive(Debug)]
pub enum Error {
    /// The binary's structure is inconsistent with the requested operation.
    ///
    /// Typical causes:
    /// * A static-TLS access in a module with no assigned TLS block
    /// * An unresolved symbol reaching the apply step
    /// * A relocation site outside the object's image
    InvalidBinary {
        /// A descriptive message about the inconsistency.
        msg: Cow<'static, str>,
    },

    /// A computed value cannot be represented in its destination field.
    ///
    /// Raised by truncating writes whose value does not survive the
    /// configured zero- or sign-extension check.
    Operation {
        /// A descriptive message about the failed operation.
        msg: Cow<'static, str>,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidBinary { msg } => write!(f, "Invalid binary: {msg}"),
            Error::Operation { msg } => write!(f, "Operation error: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

/// Creates an [`Error::InvalidBinary`] with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn invalid_binary_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::InvalidBinary { msg: msg.into() }
}

/// Creates an [`Error::Operation`] with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn operation_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Operation { msg: msg.into() }
}
