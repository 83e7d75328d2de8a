// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use ring::hkdf;

/// Computes the HkdfLabel structure for HKDF-Expand-Label
pub fn compute_label(len: usize, label: &[u8]) -> Vec<u8> {
    const TLS_LABEL: &[u8] = b"tls13 ";
    let label_len = TLS_LABEL.len() + label.len();
    debug_assert!(label_len <= u8::MAX as usize, "label is too long");

    let mut out = Vec::with_capacity(4 + label_len);
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.push(label_len as u8);
    out.extend_from_slice(TLS_LABEL);
    out.extend_from_slice(label);
    out.push(0);
    out
}

struct OutputLen(usize);

impl hkdf::KeyType for OutputLen {
    fn len(&self) -> usize {
        self.0
    }
}

/// HKDF-Expand-Label over a pseudorandom key
pub fn expand_label(prk: &hkdf::Prk, label: &[u8], len: usize) -> Vec<u8> {
    let info = compute_label(len, label);
    let mut out = vec![0u8; len];
    prk.expand(&[info.as_slice()], OutputLen(len))
        .expect("output length is always within the hkdf limit")
        .fill(&mut out)
        .expect("buffer length matches the requested output");
    out
}
