//! # Byte Sources
//!
//! The receiver pulls raw bytes from a [`ByteSource`]: a dongle on a serial
//! port ([`serial::SerialSource`], feature `serial`) or a recorded capture
//! ([`replay::ReplaySource`]). Sources report how many bytes can be read
//! without blocking and may return zero bytes at any time.

pub mod replay;
#[cfg(feature = "serial")]
pub mod serial;

use std::io;

pub use replay::ReplaySource;
#[cfg(feature = "serial")]
pub use serial::SerialSource;

pub trait ByteSource: Send {
    /// Bytes that can be read right now.
    fn available(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes. Zero is a valid answer.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the underlying device. Reads after close return zero bytes.
    fn close(&mut self) {}

    /// True once the source can never produce more bytes.
    fn is_exhausted(&self) -> bool {
        false
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn available(&mut self) -> io::Result<usize> {
        (**self).available()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}
