//! Identifiers and scalar aliases shared by the coordinator and the consumers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Height of a block on whichever chain is executing.
pub type BlockHeight = u64;

/// Unix timestamp in nanoseconds.
pub type Timestamp = i64;

/// Per-(channel, port) packet sequence number assigned by the messenger.
pub type Sequence = u64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps the given string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Borrows the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// An account on some chain: a user, a module account, an operator or an agent.
    Address
);

string_id!(
    /// Identifies a consumer chain.
    ChainId
);

string_id!(
    /// Identity of a validator on a consumer chain.
    ValidatorId
);

string_id!(
    /// A token denomination.
    Denom
);

string_id!(
    /// A channel identifier on the local end of a connection.
    ChannelId
);

string_id!(
    /// A port identifier on the local end of a connection.
    PortId
);

/// A channel end, i.e. a `(channel, port)` pair.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelEnd {
    /// The channel id.
    pub channel: ChannelId,

    /// The port bound to the channel.
    pub port: PortId,
}

impl ChannelEnd {
    /// Creates a new channel end.
    pub fn new(channel: impl Into<ChannelId>, port: impl Into<PortId>) -> Self {
        Self {
            channel: channel.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for ChannelEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.channel)
    }
}

/// The `(channel, port, sequence)` triple that identifies an outbound packet.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketKey {
    /// The channel end the packet left from.
    pub end: ChannelEnd,

    /// The sequence the messenger assigned.
    pub sequence: Sequence,
}

impl PacketKey {
    /// Creates a new packet key.
    pub const fn new(end: ChannelEnd, sequence: Sequence) -> Self {
        Self { end, sequence }
    }
}

impl fmt::Display for PacketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.end, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let denom = Denom::new("ustake");
        assert_eq!(serde_json::to_string(&denom).unwrap(), "\"ustake\"");

        let parsed: Address = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(parsed, Address::from("alice"));
    }

    #[test]
    fn packet_key_display() {
        let key = PacketKey::new(ChannelEnd::new("channel-0", "restaking"), 7);
        assert_eq!(key.to_string(), "restaking/channel-0/7");
    }
}
