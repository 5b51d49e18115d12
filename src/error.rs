//-
// Copyright (c) 2016, Jason Lingle
//
// This file is part of PGPWrap.
//
// PGPWrap is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// PGPWrap is distributed  in the hope that  it will be useful,  but WITHOUT
// ANY WARRANTY; without even the implied  warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// PGPWrap. If not, see <http://www.gnu.org/licenses/>.

//! Error types shared by the whole filter.

use std::io;

/// Result type alias used throughout PGPWrap.
pub type Result<T> = std::result::Result<T, Error>;

// sysexits(3)
pub const EX_USAGE : i32 = 64;
pub const EX_DATAERR : i32 = 65;
pub const EX_IOERR : i32 = 71;
pub const EX_TEMPFAIL : i32 = 75;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading the message or writing the result failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// GPGME itself reported an error.
    #[error("GPG error: {0}")]
    Gpg(#[from] gpgme::Error),

    /// The input could not be understood as an email message.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// No key able to encrypt was found for a recipient.
    #[error("No usable key for recipient: {0}")]
    KeyNotFound(String),

    /// GPGME accepted a key but then refused to encrypt to it.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    /// An engine operation failed and the failure policy is fail-closed.
    #[error("{operation} failed: {reason}")]
    Engine {
        operation: &'static str,
        reason: String,
    },
}

impl Error {
    /// The process exit status appropriate for this error.
    pub fn exit_code(&self) -> i32 {
        match *self {
            Error::Io(_) => EX_IOERR,
            Error::Gpg(_) |
            Error::Malformed(_) |
            Error::KeyNotFound(_) |
            Error::InvalidRecipient(_) => EX_DATAERR,
            // Make the MTA retry rather than deliver anything.
            Error::Engine { .. } => EX_TEMPFAIL,
        }
    }
}
