//-
// Copyright (c) 2016, Jason Lingle
//
// Permission to  use, copy,  modify, and/or distribute  this software  for any
// purpose  with or  without fee  is hereby  granted, provided  that the  above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE  IS PROVIDED "AS  IS" AND  THE AUTHOR DISCLAIMS  ALL WARRANTIES
// WITH  REGARD   TO  THIS  SOFTWARE   INCLUDING  ALL  IMPLIED   WARRANTIES  OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT  SHALL THE AUTHOR BE LIABLE FOR ANY
// SPECIAL,  DIRECT,   INDIRECT,  OR  CONSEQUENTIAL  DAMAGES   OR  ANY  DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN ACTION
// OF  CONTRACT, NEGLIGENCE  OR OTHER  TORTIOUS ACTION,  ARISING OUT  OF OR  IN
// CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.

//! Implements the MIME <=> PGP/MIME transformations.
//!
//! This module itself does not know how to sign or encrypt anything; this is
//! found in the `crypt` module.
//!
//! Relevant standards:
//!   [RFC 1847] Security multiparts
//!   [RFC 3156] PGP/MIME
//!   [RFC 4880] OpenPGP

use tracing::{debug,info,warn};

use crate::crypt::{Engine,SIGNATURE_CREATED};
use crate::error::{Error,Result};
use crate::mime::{self,ContentType,EntityBuilder,MimeEntity,SeparatorGen};
use crate::policy::copy_headers;
use crate::wrap::wrap;

/// Replaces the outer Subject when the real one should only be visible after
/// decryption.
pub const ENCRYPTED_SUBJECT : &'static str = "...";

const ENCRYPTED : &'static str = "encrypted";
const OCTET_STREAM : &'static str = "octet-stream";
const PGP_ENCRYPTED : &'static str = "pgp-encrypted";
const PGP_SIGNATURE : &'static str = "pgp-signature";
const SIGNED : &'static str = "signed";

const MICALG : &'static str = "pgp-sha512";
const SIGNATURE_FILENAME : &'static str = "signature.asc";
const ENCRYPTED_FILENAME : &'static str = "encrypted.asc";

const SIGNED_PREAMBLE : &'static str =
    "This is an OpenPGP/MIME signed message (RFC 4880 and 3156)";
const ENCRYPTED_PREAMBLE : &'static str =
    "This is an OpenPGP/MIME encrypted message (RFC 4880 and 3156)";

/// Which transformation to apply.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Mode {
    Sign,
    Encrypt,
    SignEncrypt,
    Decrypt,
}

/// What to do when the engine fails.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum FailurePolicy {
    /// Emit the original message unchanged.
    Open,
    /// Report an error and emit nothing.
    Closed,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Open
    }
}

/// Per-invocation parameters of the transformations.
#[derive(Clone,Debug,Default)]
pub struct Settings {
    /// Signing key; the engine default if `None`.
    pub key: Option<String>,
    pub passphrase: Option<String>,
    pub recipients: Vec<String>,
    /// Whether to hide the Subject of encrypted messages.
    pub encrypt_subject: bool,
    pub failure_policy: FailurePolicy,
}

/// The result of a transformation.
#[derive(Clone,Debug,PartialEq,Eq)]
pub enum Outcome {
    /// The message was signed, encrypted or decrypted.
    Transformed(Vec<u8>),
    /// The message needed no transformation and is passed through as-is.
    Unchanged(Vec<u8>),
    /// The engine failed. `original` is the untransformed message.
    Failed {
        operation: &'static str,
        original: Vec<u8>,
        reason: String,
    },
}

impl Outcome {
    /// Returns the text to emit under the given failure policy.
    pub fn into_output(self, policy: FailurePolicy) -> Result<Vec<u8>> {
        match self {
            Outcome::Transformed(text) | Outcome::Unchanged(text) => Ok(text),
            Outcome::Failed { original, .. } if FailurePolicy::Open == policy =>
                Ok(original),
            Outcome::Failed { operation, reason, .. } =>
                Err(Error::Engine { operation: operation, reason: reason }),
        }
    }

    pub fn is_failed(&self) -> bool {
        match *self {
            Outcome::Failed { .. } => true,
            _ => false,
        }
    }
}

/// Returns whether `mail` is already a PGP/MIME encrypted message.
pub fn is_encrypted(mail: &MimeEntity) -> bool {
    mail.has_mime_type(mime::MULTIPART, ENCRYPTED)
}

/// Runs one transformation per call against an engine.
pub struct Pipeline<ENG : Engine, SGEN : SeparatorGen> {
    engine: ENG,
    sgen: SGEN,
    settings: Settings,
}

impl<ENG : Engine, SGEN : SeparatorGen> Pipeline<ENG, SGEN> {
    pub fn new(engine: ENG, sgen: SGEN, settings: Settings) -> Self {
        Pipeline { engine: engine, sgen: sgen, settings: settings }
    }

    /// Parses `input` and applies `mode` to it.
    ///
    /// Input which is already `multipart/encrypted` is passed through
    /// byte-for-byte when encrypting.
    pub fn process(&mut self, mode: Mode, input: &[u8]) -> Result<Outcome> {
        let mail = MimeEntity::parse(input)?;
        Ok(match mode {
            Mode::Encrypt | Mode::SignEncrypt if is_encrypted(&mail) => {
                info!("message is already encrypted, passing through");
                Outcome::Unchanged(input.to_vec())
            },
            Mode::Sign => self.sign(&mail),
            Mode::Encrypt => self.encrypt(&mail, false),
            Mode::SignEncrypt => self.encrypt(&mail, true),
            Mode::Decrypt => self.decrypt(&mail),
        })
    }

    /// Produces a `multipart/signed` message, or the reason signing failed.
    fn sign_entity(&mut self, mail: &MimeEntity)
                   -> std::result::Result<MimeEntity, String> {
        let wrapped = wrap(mail, &mut self.sgen);
        // [RFC 3156] section 5: the signature is over the CRLF form.
        let canonical = mime::canonicalize_line_endings(&wrapped.to_bytes());
        let res = self.engine.sign_detached(
            &canonical, self.settings.key.as_ref().map(|k| &k[..]),
            self.settings.passphrase.as_ref().map(|p| &p[..]));
        if SIGNATURE_CREATED != res.status {
            return Err(res.status);
        }

        let signature = EntityBuilder::new()
            .header(mime::CONTENT_TYPE,
                    ContentType::new(mime::APPLICATION, PGP_SIGNATURE)
                    .with_param("name", SIGNATURE_FILENAME)
                    .to_string())
            .header(mime::CONTENT_DESCRIPTION, "OpenPGP digital signature")
            .header(mime::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"",
                            SIGNATURE_FILENAME))
            .body(res.payload)
            .build();

        let headers = wrapped.headers().clone();
        let mut signed = EntityBuilder::new()
            .multipart(ContentType::new(mime::MULTIPART, SIGNED)
                       .with_param("micalg", MICALG)
                       .with_param("protocol", format!(
                           "{}/{}", mime::APPLICATION, PGP_SIGNATURE)),
                       Some(SIGNED_PREAMBLE), vec![wrapped, signature],
                       &mut self.sgen)
            .header(mime::MIME_VERSION, "1.0");
        copy_headers(&headers, signed.headers_mut());
        Ok(signed.build())
    }

    /// Wraps and signs `mail`.
    pub fn sign(&mut self, mail: &MimeEntity) -> Outcome {
        match self.sign_entity(mail) {
            Ok(signed) => {
                debug!("message signed");
                Outcome::Transformed(signed.to_bytes())
            },
            Err(reason) => {
                warn!(%reason, "signing failed");
                Outcome::Failed {
                    operation: "sign",
                    original: mail.to_bytes(),
                    reason: reason,
                }
            },
        }
    }

    /// Wraps, optionally signs, and encrypts `mail`.
    pub fn encrypt(&mut self, mail: &MimeEntity, also_sign: bool) -> Outcome {
        if is_encrypted(mail) {
            return Outcome::Unchanged(mail.to_bytes());
        }

        let payload = if also_sign {
            match self.sign_entity(mail) {
                Ok(signed) => signed,
                Err(reason) => {
                    warn!(%reason, "signing failed");
                    if FailurePolicy::Closed == self.settings.failure_policy {
                        return Outcome::Failed {
                            operation: "sign",
                            original: mail.to_bytes(),
                            reason: reason,
                        };
                    }
                    // Fail open: encrypt what we were given, unsigned.
                    mail.clone()
                },
            }
        } else {
            wrap(mail, &mut self.sgen)
        };

        let res = self.engine.encrypt(&payload.to_bytes(),
                                      &self.settings.recipients);
        if !res.ok {
            warn!(reason = %res.status, "encryption failed");
            return Outcome::Failed {
                operation: "encrypt",
                original: mail.to_bytes(),
                reason: res.status,
            };
        }

        let version = EntityBuilder::new()
            .header(mime::CONTENT_TYPE,
                    format!("{}/{}", mime::APPLICATION, PGP_ENCRYPTED))
            .header(mime::CONTENT_DESCRIPTION,
                    "PGP/MIME version identification")
            .body("Version: 1\n")
            .build();
        let ciphertext = EntityBuilder::new()
            .header(mime::CONTENT_TYPE,
                    ContentType::new(mime::APPLICATION, OCTET_STREAM)
                    .with_param("name", ENCRYPTED_FILENAME)
                    .to_string())
            .header(mime::CONTENT_DESCRIPTION, "OpenPGP encrypted message")
            .header(mime::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}\"", ENCRYPTED_FILENAME))
            .body(res.payload)
            .build();

        let mut encrypted = EntityBuilder::new()
            .multipart(ContentType::new(mime::MULTIPART, ENCRYPTED)
                       .with_param("protocol", format!(
                           "{}/{}", mime::APPLICATION, PGP_ENCRYPTED)),
                       Some(ENCRYPTED_PREAMBLE), vec![version, ciphertext],
                       &mut self.sgen)
            .header(mime::MIME_VERSION, "1.0");
        // Must precede the header copy, which never overrides.
        if self.settings.encrypt_subject {
            encrypted = encrypted.header(mime::SUBJECT, ENCRYPTED_SUBJECT);
        }
        copy_headers(payload.headers(), encrypted.headers_mut());

        debug!(recipients = self.settings.recipients.len(),
               signed = also_sign, "message encrypted");
        Outcome::Transformed(encrypted.build().to_bytes())
    }

    /// Decrypts `mail`.
    ///
    /// The plaintext is returned exactly as the engine produced it; protected
    /// headers inside it are not promoted back to the outer header block.
    pub fn decrypt(&mut self, mail: &MimeEntity) -> Outcome {
        let res = self.engine.decrypt(
            &mail.to_bytes(),
            self.settings.passphrase.as_ref().map(|p| &p[..]));
        if res.ok {
            debug!("message decrypted");
            Outcome::Transformed(res.payload)
        } else {
            warn!(reason = %res.status, "decryption failed");
            Outcome::Failed {
                operation: "decrypt",
                original: mail.to_bytes(),
                reason: res.status,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::from_utf8;

    use crate::crypt::CryptoResult;
    use crate::mime::DetSeparatorGen;
    use crate::wrap::is_wrapped;
    use super::*;

    /// Engine which "encrypts" by bracketing the text in `<<<` `>>>` and
    /// "signs" by describing what it was given.
    #[derive(Debug,Default)]
    struct DummyEngine {
        fail: bool,
        calls: u32,
        signed_text: Vec<u8>,
        recipients: Vec<String>,
    }

    impl Engine for DummyEngine {
        fn sign_detached(&mut self, text: &[u8], key: Option<&str>,
                         _passphrase: Option<&str>) -> CryptoResult {
            self.calls += 1;
            self.signed_text = text.to_vec();
            if self.fail {
                CryptoResult::failure("no secret key")
            } else {
                CryptoResult::success(
                    SIGNATURE_CREATED,
                    format!("SIG[{}]\n", key.unwrap_or("default"))
                        .into_bytes())
            }
        }

        fn encrypt(&mut self, text: &[u8], recipients: &[String])
                   -> CryptoResult {
            self.calls += 1;
            self.recipients = recipients.to_vec();
            if self.fail {
                return CryptoResult::failure("no public key");
            }
            let mut dst = b"<<<".to_vec();
            dst.extend_from_slice(text);
            dst.extend_from_slice(b">>>\n");
            CryptoResult::success("encryption ok", dst)
        }

        fn decrypt(&mut self, text: &[u8], _passphrase: Option<&str>)
                   -> CryptoResult {
            self.calls += 1;
            let text = from_utf8(text).unwrap();
            match (text.find("<<<"), text.rfind(">>>")) {
                (Some(start), Some(end)) if !self.fail && start < end =>
                    CryptoResult::success(
                        "decryption ok", text[start + 3..end].as_bytes().to_vec()),
                _ => CryptoResult::failure("no valid OpenPGP data found"),
            }
        }
    }

    fn settings() -> Settings {
        Settings {
            key: Some("ABCD".to_owned()),
            passphrase: Some("hunter2".to_owned()),
            recipients: vec!["b@x".to_owned()],
            encrypt_subject: false,
            failure_policy: FailurePolicy::Open,
        }
    }

    fn pipeline(engine: DummyEngine, settings: Settings)
                -> Pipeline<DummyEngine, DetSeparatorGen> {
        Pipeline::new(engine, DetSeparatorGen::default(), settings)
    }

    fn failing() -> DummyEngine {
        DummyEngine { fail: true, ..DummyEngine::default() }
    }

    fn parse(s: &str) -> MimeEntity {
        MimeEntity::parse(s.as_bytes()).unwrap()
    }

    fn transformed(outcome: Outcome) -> MimeEntity {
        match outcome {
            Outcome::Transformed(text) => MimeEntity::parse(&text).unwrap(),
            other => panic!("Not transformed: {:?}", other),
        }
    }

    const HELLO : &'static str =
        "From: a@x\n\
         To: b@x\n\
         Subject: Hello\n\
         Content-Type: text/plain; charset=utf-8\n\
         Content-Transfer-Encoding: 8bit\n\
         \n\
         hello world\n";

    #[test]
    fn sign_simple_message() {
        let mut pipe = pipeline(DummyEngine::default(), settings());
        let outcome = pipe.sign(&parse(HELLO));
        let text = match outcome {
            Outcome::Transformed(ref text) => from_utf8(text).unwrap().to_owned(),
            ref other => panic!("Not transformed: {:?}", other),
        };

        assert_eq!(
            "Content-Type: multipart/signed; micalg=\"pgp-sha512\"; \
             protocol=\"application/pgp-signature\"; \
             boundary=\"PGPWrap-2\"\n\
             MIME-Version: 1.0\n\
             From: a@x\n\
             To: b@x\n\
             Subject: Hello\n\
             \n\
             This is an OpenPGP/MIME signed message (RFC 4880 and 3156)\n\
             --PGPWrap-2\n\
             Content-Type: multipart/mixed; protected-headers=\"v1\"; \
             boundary=\"PGPWrap-1\"\n\
             MIME-Version: 1.0\n\
             From: a@x\n\
             To: b@x\n\
             Subject: Hello\n\
             \n\
             --PGPWrap-1\n\
             Content-Type: text/rfc822-headers; protected-headers=\"v1\"\n\
             Content-Disposition: inline\n\
             \n\
             From: a@x\n\
             Subject: Hello\n\
             To: b@x\n\
             \n\
             --PGPWrap-1\n\
             Content-Type: text/plain; charset=utf-8\n\
             Content-Transfer-Encoding: 8bit\n\
             \n\
             hello world\n\
             \n\
             --PGPWrap-1--\n\
             \n\
             --PGPWrap-2\n\
             Content-Type: application/pgp-signature; name=\"signature.asc\"\n\
             Content-Description: OpenPGP digital signature\n\
             Content-Disposition: attachment; filename=\"signature.asc\"\n\
             \n\
             SIG[ABCD]\n\
             \n\
             --PGPWrap-2--\n",
            text);
    }

    #[test]
    fn signature_covers_first_part_in_crlf_form() {
        let mut pipe = pipeline(DummyEngine::default(), settings());
        let signed = transformed(pipe.sign(&parse(HELLO)));
        let first = signed.parts()[0].to_bytes();
        assert_eq!(mime::canonicalize_line_endings(&first),
                   pipe.engine.signed_text);
        assert!(!pipe.engine.signed_text.windows(2)
                .any(|w| w[1] == b'\n' && w[0] != b'\r'));
    }

    #[test]
    fn signed_structure_has_two_parts_in_order() {
        let mut pipe = pipeline(DummyEngine::default(), settings());
        let signed = transformed(pipe.sign(&parse(HELLO)));

        assert!(signed.has_mime_type("multipart", "signed"));
        let ct = signed.content_type().unwrap();
        assert_eq!(Some("pgp-sha512"), ct.param("micalg"));
        assert_eq!(Some("application/pgp-signature"), ct.param("protocol"));
        assert_eq!(2, signed.parts().len());
        assert!(is_wrapped(&signed.parts()[0]));
        assert!(signed.parts()[1]
                .has_mime_type("application", "pgp-signature"));
    }

    #[test]
    fn sign_failure_passes_original_through() {
        let mail = parse(HELLO);
        let mut pipe = pipeline(failing(), settings());
        let outcome = pipe.sign(&mail);

        assert!(outcome.is_failed());
        let text = outcome.into_output(FailurePolicy::Open).unwrap();
        assert_eq!(HELLO, from_utf8(&text).unwrap());
        assert!(!from_utf8(&text).unwrap().contains("multipart/signed"));
    }

    #[test]
    fn sign_failure_reported_when_closed() {
        let mut pipe = pipeline(failing(), settings());
        match pipe.sign(&parse(HELLO)).into_output(FailurePolicy::Closed) {
            Err(Error::Engine { operation, reason }) => {
                assert_eq!("sign", operation);
                assert_eq!("no secret key", reason);
            },
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn encrypt_simple_message() {
        let mut pipe = pipeline(DummyEngine::default(), settings());
        let encrypted = transformed(pipe.encrypt(&parse(HELLO), false));

        assert!(encrypted.has_mime_type("multipart", "encrypted"));
        assert_eq!(Some("application/pgp-encrypted"),
                   encrypted.content_type().unwrap().param("protocol"));
        assert_eq!(Some("Hello"), encrypted.headers().get("Subject"));
        assert_eq!(Some("a@x"), encrypted.headers().get("From"));
        assert!(!encrypted.headers()
                .contains(mime::CONTENT_TRANSFER_ENCODING));

        let parts = encrypted.parts();
        assert_eq!(2, parts.len());
        assert!(parts[0].has_mime_type("application", "pgp-encrypted"));
        assert_eq!(Some(&b"Version: 1\n"[..]), parts[0].body());
        assert!(parts[1].has_mime_type("application", "octet-stream"));
        assert_eq!(Some("encrypted.asc"),
                   parts[1].content_type().unwrap().param("name"));
        assert_eq!(Some("inline; filename=\"encrypted.asc\""),
                   parts[1].headers().get(mime::CONTENT_DISPOSITION));

        // The ciphertext is the wrapped message.
        let body = from_utf8(parts[1].body().unwrap()).unwrap();
        assert!(body.starts_with("<<<Content-Type: multipart/mixed; \
                                  protected-headers=\"v1\""));
        assert_eq!(vec!["b@x".to_owned()], pipe.engine.recipients);
    }

    #[test]
    fn sign_then_encrypt_has_same_outer_structure() {
        let mut pipe = pipeline(DummyEngine::default(), settings());
        let encrypted = transformed(pipe.encrypt(&parse(HELLO), true));

        assert!(encrypted.has_mime_type("multipart", "encrypted"));
        assert_eq!(2, encrypted.parts().len());
        assert!(encrypted.parts()[0]
                .has_mime_type("application", "pgp-encrypted"));
        assert!(encrypted.parts()[1]
                .has_mime_type("application", "octet-stream"));
        assert_eq!(2, pipe.engine.calls);

        let body = from_utf8(encrypted.parts()[1].body().unwrap()).unwrap();
        assert!(body.starts_with("<<<Content-Type: multipart/signed;"));
    }

    #[test]
    fn decrypt_recovers_protected_headers() {
        let mut settings = settings();
        settings.encrypt_subject = true;
        let mut pipe = pipeline(DummyEngine::default(), settings);
        let ciphertext = match pipe.process(Mode::Encrypt, HELLO.as_bytes())
            .unwrap()
        {
            Outcome::Transformed(text) => text,
            other => panic!("Not transformed: {:?}", other),
        };

        let plaintext = match pipe.process(Mode::Decrypt, &ciphertext).unwrap() {
            Outcome::Transformed(text) => text,
            other => panic!("Not transformed: {:?}", other),
        };
        let decrypted = MimeEntity::parse(&plaintext).unwrap();
        assert!(is_wrapped(&decrypted));
        let listing = from_utf8(decrypted.parts()[0].body().unwrap()).unwrap();
        assert!(listing.contains("Subject: Hello\n"));
        assert!(listing.contains("From: a@x\n"));
        assert!(listing.contains("To: b@x\n"));
        assert_eq!(Some(&b"hello world\n"[..]), decrypted.parts()[1].body());
    }

    #[test]
    fn encrypt_subject_replaced_with_placeholder() {
        let mut settings = settings();
        settings.encrypt_subject = true;
        let mut pipe = pipeline(DummyEngine::default(), settings);
        let encrypted = transformed(pipe.encrypt(&parse(HELLO), false));

        assert_eq!(Some(ENCRYPTED_SUBJECT),
                   encrypted.headers().get(mime::SUBJECT));
        assert_eq!(1, encrypted.headers().iter()
                   .filter(|h| h.is(mime::SUBJECT)).count());
        // The real subject only exists inside the ciphertext.
        let ciphertext = encrypted.parts()[1].body().unwrap();
        assert!(from_utf8(ciphertext).unwrap().contains("Subject: Hello"));
    }

    #[test]
    fn already_encrypted_passed_through_untouched() {
        let input =
            "From: a@x\r\n\
             Content-Type: multipart/encrypted; boundary=foo;\r\n\
             \tprotocol=\"application/pgp-encrypted\"\r\n\
             \r\n\
             --foo\r\n\
             Stuff.\r\n\
             --foo--\r\n";
        for &mode in &[Mode::Encrypt, Mode::SignEncrypt] {
            let mut pipe = pipeline(DummyEngine::default(), settings());
            assert_eq!(Outcome::Unchanged(input.as_bytes().to_vec()),
                       pipe.process(mode, input.as_bytes()).unwrap());
            assert_eq!(0, pipe.engine.calls);
        }
    }

    #[test]
    fn encrypt_failure_passes_original_through() {
        let mail = parse(HELLO);
        let mut pipe = pipeline(failing(), settings());
        let outcome = pipe.encrypt(&mail, false);
        match outcome {
            Outcome::Failed { operation, ref original, ref reason } => {
                assert_eq!("encrypt", operation);
                assert_eq!(HELLO.as_bytes(), &original[..]);
                assert_eq!("no public key", *reason);
            },
            ref other => panic!("Not failed: {:?}", other),
        }
    }

    #[test]
    fn sign_then_encrypt_fails_open_to_unsigned_encryption() {
        #[derive(Default)]
        struct NoSigning(DummyEngine);
        impl Engine for NoSigning {
            fn sign_detached(&mut self, _: &[u8], _: Option<&str>,
                             _: Option<&str>) -> CryptoResult {
                CryptoResult::failure("no secret key")
            }
            fn encrypt(&mut self, text: &[u8], recipients: &[String])
                       -> CryptoResult {
                self.0.encrypt(text, recipients)
            }
            fn decrypt(&mut self, text: &[u8], passphrase: Option<&str>)
                       -> CryptoResult {
                self.0.decrypt(text, passphrase)
            }
        }

        let mut pipe = Pipeline::new(NoSigning::default(),
                                     DetSeparatorGen::default(), settings());
        let encrypted = transformed(pipe.encrypt(&parse(HELLO), true));
        let body = from_utf8(encrypted.parts()[1].body().unwrap()).unwrap();
        assert_eq!(format!("<<<{}>>>\n", HELLO), body);

        let mut settings = settings();
        settings.failure_policy = FailurePolicy::Closed;
        let mut pipe = Pipeline::new(NoSigning::default(),
                                     DetSeparatorGen::default(), settings);
        assert!(pipe.encrypt(&parse(HELLO), true).is_failed());
        assert_eq!(0, pipe.engine.0.calls);
    }

    #[test]
    fn decrypt_failure_passes_ciphertext_through() {
        let input = "Subject: x\n\nnot encrypted at all\n";
        let mut pipe = pipeline(DummyEngine::default(), settings());
        let outcome = pipe.process(Mode::Decrypt, input.as_bytes()).unwrap();
        assert!(outcome.is_failed());
        assert_eq!(input.as_bytes(),
                   &outcome.into_output(FailurePolicy::Open).unwrap()[..]);
    }

    #[test]
    fn process_rejects_empty_input() {
        let mut pipe = pipeline(DummyEngine::default(), settings());
        match pipe.process(Mode::Sign, b"") {
            Err(Error::Malformed(_)) => (),
            other => panic!("Unexpected result: {:?}", other),
        }
        assert_eq!(0, pipe.engine.calls);
    }

    #[test]
    fn resigning_signed_wrapper_does_not_rewrap() {
        let mut pipe = pipeline(DummyEngine::default(), settings());
        // Share the generator so the signed container gets a fresh boundary.
        let wrapped = wrap(&parse(HELLO), &mut pipe.sgen);
        let signed = transformed(pipe.sign(&wrapped));

        assert_eq!(Some("PGPWrap-2"),
                   signed.content_type().unwrap().boundary());
        assert_eq!(wrapped, signed.parts()[0]);
        assert_eq!(mime::canonicalize_line_endings(&wrapped.to_bytes()),
                   pipe.engine.signed_text);
    }
}
