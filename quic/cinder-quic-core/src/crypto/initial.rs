// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    crypto::{
        aesgcm::{AesGcmOpen, AesGcmSeal},
        label,
    },
    endpoint,
};
use hex_literal::hex;
use ring::hkdf;

//= https://tools.ietf.org/html/draft-ietf-quic-tls-20#section-5.2
//# initial_salt = 0xef4fb0abb47470c41befcf8031334fae485e09a0
//# initial_secret = HKDF-Extract(initial_salt,
//#                               client_dst_connection_id)
//#
//# client_initial_secret = HKDF-Expand-Label(initial_secret,
//#                                           "client in", "",
//#                                           Hash.length)
//# server_initial_secret = HKDF-Expand-Label(initial_secret,
//#                                           "server in", "",
//#                                           Hash.length)

/// The salt shared by drafts 17 through 20
pub const INITIAL_SALT: [u8; 20] = hex!("ef4fb0abb47470c41befcf8031334fae485e09a0");

pub const INITIAL_CLIENT_LABEL: &[u8] = b"client in";
pub const INITIAL_SERVER_LABEL: &[u8] = b"server in";

/// Derives the client and server initial traffic secrets from the
/// client's original destination connection id
pub fn initial_secrets(dcid: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let initial_secret = hkdf::Salt::new(hkdf::HKDF_SHA256, &INITIAL_SALT).extract(dcid);
    let client = label::expand_label(&initial_secret, INITIAL_CLIENT_LABEL, 32);
    let server = label::expand_label(&initial_secret, INITIAL_SERVER_LABEL, 32);
    (client, server)
}

/// Derives the send and receive Initial keys for `local`
pub fn initial_keys(dcid: &[u8], local: endpoint::Type) -> (AesGcmSeal, AesGcmOpen) {
    let (client, server) = initial_secrets(dcid);
    let (send_secret, recv_secret) = match local {
        endpoint::Type::Client => (client, server),
        endpoint::Type::Server => (server, client),
    };
    (
        AesGcmSeal::from_secret(&send_secret),
        AesGcmOpen::from_secret(&recv_secret),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Open, Seal};

    #[test]
    fn secrets_are_deterministic_test() {
        let dcid = [0x83u8, 0x94, 0xc8, 0xf0, 0x3e, 0x51, 0x57, 0x08];
        let (client_a, server_a) = initial_secrets(&dcid);
        let (client_b, server_b) = initial_secrets(&dcid);
        assert_eq!(client_a, client_b);
        assert_eq!(server_a, server_b);
        assert_ne!(client_a, server_a);

        let (_, other_server) = initial_secrets(&[0u8; 8]);
        assert_ne!(server_a, other_server);
    }

    #[test]
    fn keys_pair_up_test() {
        let dcid = [7u8; 8];
        let (client_seal, _) = initial_keys(&dcid, endpoint::Type::Client);
        let (_, server_open) = initial_keys(&dcid, endpoint::Type::Server);

        let header = [0xc3u8, 0, 0, 1];
        let mut payload = b"client hello".to_vec();
        client_seal.seal_in_place(0, &header, &mut payload).unwrap();
        assert_eq!(payload.len(), 12 + client_seal.tag_len());

        let plaintext = server_open.open_in_place(0, &header, &mut payload).unwrap();
        assert_eq!(plaintext, b"client hello");
    }

    #[test]
    fn wrong_direction_fails_test() {
        let dcid = [7u8; 8];
        let (client_seal, client_open) = initial_keys(&dcid, endpoint::Type::Client);

        let header = [0xc3u8, 0, 0, 1];
        let mut payload = b"echo".to_vec();
        client_seal.seal_in_place(0, &header, &mut payload).unwrap();

        // a client cannot open its own packets
        assert!(client_open.open_in_place(0, &header, &mut payload).is_err());
    }
}
