//! Encryption Envelope — a thin seam around the `age` crate's
//! passphrase-based (scrypt) recipient/identity, keeping every caller's
//! contract to "opaque blob in, opaque blob out" rather than reimplementing
//! any cryptography here.

use std::io::{Read, Write};

use age::secrecy::Secret;

use crate::error::{BackupError, Result};

/// Whether a bundle on disk should be treated as plaintext or `age`-encrypted,
/// derived purely from the `.age` suffix — never content-sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Plaintext,
    Encrypted,
}

pub fn mode_for_path(path: &std::path::Path) -> Mode {
    match path.extension().and_then(|e| e.to_str()) {
        Some("age") => Mode::Encrypted,
        _ => Mode::Plaintext,
    }
}

/// Encrypt `bytes` under `passphrase`, producing an opaque `age`-format blob.
pub fn encrypt(bytes: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let encryptor = age::Encryptor::with_user_passphrase(Secret::new(passphrase.to_owned()));
    let mut out = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut out)
        .map_err(|e| BackupError::encryption(format!("failed to start age encryption: {e}")))?;
    writer
        .write_all(bytes)
        .map_err(|e| BackupError::encryption(format!("failed to write plaintext into age stream: {e}")))?;
    writer
        .finish()
        .map_err(|e| BackupError::encryption(format!("failed to finalise age stream: {e}")))?;
    Ok(out)
}

/// Decrypt an `age`-format blob under `passphrase`.
///
/// A wrong passphrase and a truncated/corrupt blob both surface from the
/// `age` crate as a generic decryption error, so both map to
/// [`crate::error::ErrorKind::EncryptionFailure`] here. Callers that need the
/// corrupt-artifact distinction for quarantine purposes (e.g.
/// [`crate::ref_probe::probe_bundle`]) make that call based on context, not
/// on this function's error kind alone.
pub fn decrypt(blob: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let decryptor = match age::Decryptor::new(blob)
        .map_err(|e| BackupError::encryption(format!("not a valid age stream: {e}")))?
    {
        age::Decryptor::Passphrase(d) => d,
        age::Decryptor::Recipients(_) => {
            return Err(BackupError::encryption(
                "bundle was encrypted for recipients, not a passphrase",
            ));
        }
    };
    let mut reader = decryptor
        .decrypt(&Secret::new(passphrase.to_owned()), None)
        .map_err(|e| BackupError::encryption(format!("age decryption failed: {e}")))?;
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .map_err(|e| BackupError::encryption(format!("failed to read decrypted stream: {e}")))?;
    Ok(out)
}
