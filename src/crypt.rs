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

//! Implements the actual cryptography through GPG.

use std::io::Write;

use gpgme::{self,Context,EncryptFlags,HashAlgorithm,PassphraseRequest,
            PinentryMode,Protocol};
use tracing::{debug,warn};

use crate::error::{Error,Result};

/// Status reported by a successful signing operation. Signing is only
/// considered successful if the status is exactly this.
pub const SIGNATURE_CREATED : &'static str = "signature created";

/// The outcome of a single engine operation.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct CryptoResult {
    pub ok: bool,
    /// Human-readable diagnostic.
    pub status: String,
    /// Signature, ciphertext or plaintext, depending on the operation. Empty
    /// on failure.
    pub payload: Vec<u8>,
}

impl CryptoResult {
    pub fn success<S : Into<String>>(status: S, payload: Vec<u8>) -> Self {
        CryptoResult { ok: true, status: status.into(), payload: payload }
    }

    pub fn failure<S : Into<String>>(status: S) -> Self {
        CryptoResult { ok: false, status: status.into(), payload: Vec::new() }
    }
}

/// Abstracts away the OpenPGP engine.
///
/// Every call is synchronous and attempted exactly once.
pub trait Engine {
    /// Makes an ASCII-armoured detached signature over `text`.
    ///
    /// `key` selects the signing key; `None` uses the engine default.
    fn sign_detached(&mut self, text: &[u8], key: Option<&str>,
                     passphrase: Option<&str>) -> CryptoResult;

    /// Encrypts `text` to all of `recipients`, producing ASCII armour.
    fn encrypt(&mut self, text: &[u8], recipients: &[String]) -> CryptoResult;

    /// Decrypts an armoured message or a whole PGP/MIME message.
    fn decrypt(&mut self, text: &[u8], passphrase: Option<&str>)
               -> CryptoResult;
}

/// The GPGME-based implementation of `Engine`.
pub struct GpgEngine {
    ctx: Context,
}

impl GpgEngine {
    /// Creates a new `GpgEngine`.
    ///
    /// If `home` is given, it is used as the GnuPG home directory instead of
    /// the default.
    pub fn new(home: Option<&str>) -> gpgme::Result<GpgEngine> {
        let mut ctx = Context::from_protocol(Protocol::OpenPgp)?;
        if let Some(home) = home {
            ctx.set_engine_home_dir(home)?;
        }
        ctx.set_armor(true);
        Ok(GpgEngine { ctx: ctx })
    }

    /// Runs `f` with the passphrase, if any, supplied through loopback
    /// pinentry instead of asking the agent.
    fn with_passphrase<R, F>(&mut self, passphrase: Option<&str>, f: F)
                             -> gpgme::Result<R>
    where F : FnOnce(&mut Context) -> gpgme::Result<R> {
        match passphrase {
            None => f(&mut self.ctx),
            Some(passphrase) => {
                self.ctx.set_pinentry_mode(PinentryMode::Loopback)?;
                let passphrase = passphrase.to_owned();
                self.ctx.with_passphrase_provider(
                    move |_: PassphraseRequest<'_>, out: &mut dyn Write| {
                        out.write_all(passphrase.as_bytes())?;
                        Ok(())
                    },
                    f)
            },
        }
    }

    fn sign_impl(&mut self, text: &[u8], key: Option<&str>,
                 passphrase: Option<&str>) -> Result<Option<Vec<u8>>> {
        self.ctx.clear_signers();
        if let Some(key) = key {
            let key = self.ctx.get_secret_key(key)?;
            self.ctx.add_signer(&key)?;
        }

        let mut signature = Vec::new();
        let result = self.with_passphrase(
            passphrase, |ctx| ctx.sign_detached(text, &mut signature))?;

        let mut created = 0;
        for sig in result.new_signatures() {
            created += 1;
            // The outer structure always declares micalg=pgp-sha512.
            if HashAlgorithm::Sha512 != sig.hash_algorithm() {
                warn!(algorithm = ?sig.hash_algorithm(),
                      "signature does not use SHA-512; \
                       set personal-digest-preferences in gpg.conf");
            }
        }

        Ok(if created > 0 { Some(signature) } else { None })
    }

    fn encrypt_impl(&mut self, text: &[u8], recipients: &[String])
                    -> Result<Vec<u8>> {
        let mut keys = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let key = self.ctx.find_keys(Some(recipient.as_str()))?
                .filter_map(|k| k.ok())
                .find(|k| k.can_encrypt())
                .ok_or_else(|| Error::KeyNotFound(recipient.clone()))?;
            debug!(recipient = %recipient,
                   fingerprint = key.fingerprint().unwrap_or("???"),
                   "resolved recipient");
            keys.push(key);
        }

        let mut ciphertext = Vec::new();
        let result = self.ctx.encrypt_with_flags(
            &keys, text, &mut ciphertext, EncryptFlags::ALWAYS_TRUST)?;

        if let Some(ik) = result.invalid_recipients().next() {
            let fingerprint = ik.fingerprint().unwrap_or("???");
            return Err(Error::InvalidRecipient(match ik.reason() {
                Some(reason) => format!("{}: {}", fingerprint, reason),
                None => format!("{}: unknown reason", fingerprint),
            }));
        }

        Ok(ciphertext)
    }

    fn decrypt_impl(&mut self, text: &[u8], passphrase: Option<&str>)
                    -> Result<Vec<u8>> {
        let mut plaintext = Vec::new();
        self.with_passphrase(
            passphrase, |ctx| ctx.decrypt(text, &mut plaintext))?;
        Ok(plaintext)
    }
}

impl Engine for GpgEngine {
    fn sign_detached(&mut self, text: &[u8], key: Option<&str>,
                     passphrase: Option<&str>) -> CryptoResult {
        match self.sign_impl(text, key, passphrase) {
            Ok(Some(signature)) =>
                CryptoResult::success(SIGNATURE_CREATED, signature),
            Ok(None) => CryptoResult::failure("no signature created"),
            Err(err) => CryptoResult::failure(err.to_string()),
        }
    }

    fn encrypt(&mut self, text: &[u8], recipients: &[String])
               -> CryptoResult {
        match self.encrypt_impl(text, recipients) {
            Ok(ciphertext) => CryptoResult::success("encryption ok", ciphertext),
            Err(err) => CryptoResult::failure(err.to_string()),
        }
    }

    fn decrypt(&mut self, text: &[u8], passphrase: Option<&str>)
               -> CryptoResult {
        match self.decrypt_impl(text, passphrase) {
            Ok(plaintext) => CryptoResult::success("decryption ok", plaintext),
            Err(err) => CryptoResult::failure(err.to_string()),
        }
    }
}
