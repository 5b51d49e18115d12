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

//! Builds the protected-headers structure.
//!
//! Before a message is signed or encrypted, its content is wrapped so that a
//! copy of the sensitive headers travels inside the protected body:
//!
//! ```text
//! multipart/mixed; protected-headers="v1"
//! ├── text/rfc822-headers; protected-headers="v1"   (Subject: ..., etc)
//! └── <original content type and body>
//! ```
//!
//! All other headers of the message stay on the wrapper.

use tracing::debug;

use crate::mime::{self,ContentType,EntityBuilder,MimeEntity,SeparatorGen};
use crate::policy::copy_headers;

/// Headers whose values are copied into the protected part, in the order they
/// are written there.
pub const PROTECTED_HEADERS : [&'static str; 10] = [
    "CC",
    "Date",
    "Followup-To",
    "From",
    "Message-ID",
    "Newsgroups",
    "References",
    "Reply-To",
    "Subject",
    "To",
];

pub const PROTECTED_HEADERS_PARAM : &'static str = "protected-headers";
pub const PROTECTED_HEADERS_VERSION : &'static str = "v1";

const RFC822_HEADERS : &'static str = "rfc822-headers";
const MIXED : &'static str = "mixed";

/// Returns whether `mail` already declares `protected-headers="v1"`.
pub fn is_wrapped(mail: &MimeEntity) -> bool {
    mail.content_type().map_or(false, |ct| {
        ct.param(PROTECTED_HEADERS_PARAM) == Some(PROTECTED_HEADERS_VERSION)
    })
}

/// Renders the protected headers present on `mail`, one `Name: Value` line
/// each.
fn protected_header_listing(mail: &MimeEntity) -> String {
    let mut listing = String::new();
    for name in PROTECTED_HEADERS.iter() {
        if let Some(value) = mail.headers().get(name) {
            listing.push_str(name);
            listing.push_str(": ");
            listing.push_str(value);
            listing.push('\n');
        }
    }
    listing
}

/// Wraps `mail` in a protected-headers structure.
///
/// A message which is already wrapped is returned as-is. `mail` itself is
/// never modified; its `Content-Transfer-Encoding`, if any, moves to the
/// part holding the original content and is absent from the wrapper.
pub fn wrap<G : SeparatorGen + ?Sized>(mail: &MimeEntity, sgen: &mut G)
                                       -> MimeEntity {
    if is_wrapped(mail) {
        debug!("message already carries protected headers");
        return mail.clone();
    }

    let mut remaining = mail.to_builder();
    let transfer_encoding =
        remaining.take_header(mime::CONTENT_TRANSFER_ENCODING);

    let header_part = EntityBuilder::new()
        .header(mime::CONTENT_TYPE,
                ContentType::new(mime::TEXT, RFC822_HEADERS)
                .with_param(PROTECTED_HEADERS_PARAM,
                            PROTECTED_HEADERS_VERSION)
                .to_string())
        .header(mime::CONTENT_DISPOSITION, "inline")
        .body(protected_header_listing(mail))
        .build();

    let mut content_part = EntityBuilder::new()
        .header(mime::CONTENT_TYPE,
                mail.headers().get(mime::CONTENT_TYPE)
                .unwrap_or(mime::DEFAULT_CONTENT_TYPE));
    if let Some(encoding) = transfer_encoding {
        content_part = content_part.header(
            mime::CONTENT_TRANSFER_ENCODING, encoding);
    }
    let content_part = content_part
        .payload(mail.payload().clone())
        .build();

    let mut wrapper = EntityBuilder::new()
        .multipart(ContentType::new(mime::MULTIPART, MIXED)
                   .with_param(PROTECTED_HEADERS_PARAM,
                               PROTECTED_HEADERS_VERSION),
                   None, vec![header_part, content_part], sgen)
        .header(mime::MIME_VERSION, "1.0");
    copy_headers(remaining.headers(), wrapper.headers_mut());
    wrapper.build()
}
