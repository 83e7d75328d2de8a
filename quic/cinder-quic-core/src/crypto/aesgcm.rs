// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! AES-128-GCM packet protection derived from a traffic secret.
//!
//! This backs the Initial epoch (whose secrets come from the connection
//! id) and any key installed directly from a raw secret. The key, iv,
//! and header protection key are expanded with the "quic key",
//! "quic iv", and "quic hp" labels.

use crate::crypto::{
    apply_mask, label, packet_protection::Error, Open, Seal, HEADER_PROTECTION_SAMPLE_LEN,
};
use ring::{aead, hkdf};

const KEY_LEN: usize = 16;
const IV_LEN: usize = 12;

struct Keys {
    key: aead::LessSafeKey,
    iv: [u8; IV_LEN],
    header: aead::quic::HeaderProtectionKey,
}

impl Keys {
    fn from_secret(secret: &[u8]) -> Self {
        let prk = hkdf::Prk::new_less_safe(hkdf::HKDF_SHA256, secret);

        let key = label::expand_label(&prk, b"quic key", KEY_LEN);
        let key = aead::UnboundKey::new(&aead::AES_128_GCM, &key)
            .expect("expanded key length matches the algorithm");
        let key = aead::LessSafeKey::new(key);

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&label::expand_label(&prk, b"quic iv", IV_LEN));

        let hp = label::expand_label(&prk, b"quic hp", KEY_LEN);
        let header = aead::quic::HeaderProtectionKey::new(&aead::quic::AES_128, &hp)
            .expect("expanded key length matches the algorithm");

        Self { key, iv, header }
    }

    /// The nonce is the iv xored with the packet number in the low bytes
    fn nonce(&self, packet_number: u64) -> aead::Nonce {
        let mut nonce = self.iv;
        for (nonce_byte, pn_byte) in nonce[IV_LEN - 8..]
            .iter_mut()
            .zip(packet_number.to_be_bytes())
        {
            *nonce_byte ^= pn_byte;
        }
        aead::Nonce::assume_unique_for_key(nonce)
    }

    fn mask(&self, sample: &[u8]) -> Result<[u8; 5], Error> {
        self.header
            .new_mask(&sample[..HEADER_PROTECTION_SAMPLE_LEN])
            .map_err(|_| Error::INTERNAL_ERROR)
    }
}

pub struct AesGcmSeal(Keys);

impl AesGcmSeal {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self(Keys::from_secret(secret))
    }
}

impl Seal for AesGcmSeal {
    fn seal_in_place(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &mut Vec<u8>,
    ) -> Result<(), Error> {
        let nonce = self.0.nonce(packet_number);
        let tag = self
            .0
            .key
            .seal_in_place_separate_tag(nonce, aead::Aad::from(header), payload.as_mut_slice())
            .map_err(|_| Error::INTERNAL_ERROR)?;
        payload.extend_from_slice(tag.as_ref());
        Ok(())
    }

    fn protect_header(
        &self,
        sample: &[u8],
        first_byte: &mut u8,
        packet_number_bytes: &mut [u8],
    ) -> Result<(), Error> {
        let mask = self.0.mask(sample)?;
        apply_mask(mask, first_byte, packet_number_bytes, true);
        Ok(())
    }

    fn tag_len(&self) -> usize {
        aead::AES_128_GCM.tag_len()
    }

    fn sample_len(&self) -> usize {
        HEADER_PROTECTION_SAMPLE_LEN
    }
}

pub struct AesGcmOpen(Keys);

impl AesGcmOpen {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self(Keys::from_secret(secret))
    }
}

impl Open for AesGcmOpen {
    fn open_in_place<'a>(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &'a mut [u8],
    ) -> Result<&'a [u8], Error> {
        let nonce = self.0.nonce(packet_number);
        let plaintext = self
            .0
            .key
            .open_in_place(nonce, aead::Aad::from(header), payload)
            .map_err(|_| Error::DECRYPT_ERROR)?;
        Ok(plaintext)
    }

    fn unprotect_header(
        &self,
        sample: &[u8],
        first_byte: &mut u8,
        packet_number_bytes: &mut [u8],
    ) -> Result<(), Error> {
        let mask = self.0.mask(sample)?;
        apply_mask(mask, first_byte, packet_number_bytes, false);
        Ok(())
    }

    fn sample_len(&self) -> usize {
        HEADER_PROTECTION_SAMPLE_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_protection_round_trip_test() {
        let seal = AesGcmSeal::from_secret(&[1u8; 32]);
        let open = AesGcmOpen::from_secret(&[1u8; 32]);

        let sample = [0x5au8; HEADER_PROTECTION_SAMPLE_LEN];
        let mut first = 0xc1u8; // long header, 2-byte packet number
        let mut pn = [0x00u8, 0x2a, 0xff, 0xff];
        let original_first = first;
        let original_pn = pn;

        seal.protect_header(&sample, &mut first, &mut pn[..2]).unwrap();
        assert_ne!((first, pn), (original_first, original_pn));

        open.unprotect_header(&sample, &mut first, &mut pn).unwrap();
        assert_eq!(first, original_first);
        assert_eq!(pn, original_pn);
    }

    #[test]
    fn tampered_payload_fails_test() {
        let seal = AesGcmSeal::from_secret(&[2u8; 32]);
        let open = AesGcmOpen::from_secret(&[2u8; 32]);

        let header = [0x40u8, 0, 1];
        let mut payload = b"payload".to_vec();
        seal.seal_in_place(1, &header, &mut payload).unwrap();

        let mut tampered = payload.clone();
        tampered[0] ^= 0x80;
        assert!(open.open_in_place(1, &header, &mut tampered).is_err());

        // packet number mismatch changes the nonce
        assert!(open
            .open_in_place(2, &header, &mut payload.clone())
            .is_err());

        let plaintext = open.open_in_place(1, &header, &mut payload).unwrap();
        assert_eq!(plaintext, b"payload");
    }

    #[test]
    fn distinct_secrets_distinct_keys_test() {
        let seal = AesGcmSeal::from_secret(&[3u8; 32]);
        let open = AesGcmOpen::from_secret(&[4u8; 32]);

        let header = [0x40u8];
        let mut payload = b"data".to_vec();
        seal.seal_in_place(0, &header, &mut payload).unwrap();
        assert!(open.open_in_place(0, &header, &mut payload).is_err());
    }
}
