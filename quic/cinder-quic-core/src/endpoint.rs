// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

/// The role of an endpoint in a connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Client,
    Server,
}

impl Type {
    /// Returns the type of the peer
    #[inline]
    pub fn peer_type(self) -> Self {
        match self {
            Type::Client => Type::Server,
            Type::Server => Type::Client,
        }
    }

    #[inline]
    pub fn is_client(self) -> bool {
        matches!(self, Type::Client)
    }

    #[inline]
    pub fn is_server(self) -> bool {
        matches!(self, Type::Server)
    }
}
