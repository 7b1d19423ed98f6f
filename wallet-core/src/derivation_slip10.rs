//! SLIP-0010 master key generation and Ed25519 derivation.
//!
//! Implementation of SLIP-0010 hierarchical deterministic wallets,
//! as defined at <https://github.com/satoshilabs/slips/blob/master/slip-0010.md>.
//!
//! Key differences from BIP32:
//! - Each curve has its own HMAC key for master key generation
//! - Ed25519 only supports hardened derivation (no public key derivation)
//! - Ed25519 public keys are serialized as `0x00 || point` for fingerprints

use crate::bip32::{ChainCode, ChildNumber, Error, ExtendedPrivKey, hmac_sha512, split_i};
use crate::keys::{Curve, PrivateKey};

/// HMAC key used for master key generation on `curve`
pub fn hmac_key(curve: Curve) -> &'static [u8] {
    match curve {
        Curve::Secp256k1 => b"Bitcoin seed",
        Curve::Ed25519 => b"ed25519 seed",
        Curve::Nist256p1 => b"Nist256p1 seed",
    }
}

/// Master private key and chain code for `seed` on `curve`
pub(crate) fn master_key(curve: Curve, seed: &[u8]) -> Result<(PrivateKey, ChainCode), Error> {
    let key = hmac_key(curve);
    let mut i = hmac_sha512(key, &[seed]);
    loop {
        let (il, chain_code) = split_i(&i);
        match PrivateKey::new(&il, curve) {
            Ok(private_key) => return Ok((private_key, chain_code)),
            // BIP32 treats this as an invalid seed
            Err(_) if curve == Curve::Secp256k1 => return Err(Error::InvalidMasterKey),
            Err(_) => {
                tracing::debug!(%curve, "master key out of range, rehashing");
                i = hmac_sha512(key, &[&i]);
            }
        }
    }
}

/// Child key derivation (always hardened for Ed25519)
pub(crate) fn ed25519_ckd_priv(
    parent: &ExtendedPrivKey,
    child: ChildNumber,
) -> Result<ExtendedPrivKey, Error> {
    if !child.is_hardened() {
        return Err(Error::NonHardenedNotSupported);
    }
    let depth = parent.depth.checked_add(1).ok_or(Error::MaximumDepthExceeded)?;

    // data = 0x00 || private_key || index
    let secret = zeroize::Zeroizing::new(parent.private_key.secret_bytes());
    let hmac = hmac_sha512(
        parent.chain_code.as_ref(),
        &[&[0x00], secret.as_ref(), &u32::from(child).to_be_bytes()],
    );
    let (il, chain_code) = split_i(&hmac);
    let private_key =
        PrivateKey::new(&il, Curve::Ed25519).map_err(|e| Error::InvalidKey(e.to_string()))?;

    Ok(ExtendedPrivKey {
        curve: Curve::Ed25519,
        depth,
        parent_fingerprint: parent.fingerprint(),
        child_number: child,
        private_key,
        chain_code,
    })
}
