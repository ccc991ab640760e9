//! Packet message types.
//!
//! A sender emits a [`PacketRequest`], the path delivers (or fails to deliver)
//! it, and the counterparty answers with a [`PacketReply`]. A reply carries the
//! amount that actually arrived whenever the receiver saw the packet, even if
//! it then rejected it.

use pathrate_common::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Outgoing packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRequest {
    /// Sequence number, unique within a payment.
    pub sequence: u64,
    /// Amount sent from the source.
    pub source_amount: Amount,
    /// Minimum amount the receiver must get for the packet to be accepted.
    pub minimum_destination_amount: Amount,
}

impl PacketRequest {
    /// Create a request with no minimum destination amount.
    pub fn new(sequence: u64, source_amount: Amount) -> Self {
        Self {
            sequence,
            source_amount,
            minimum_destination_amount: Amount::zero(),
        }
    }

    /// Require at least this amount to arrive.
    pub fn with_minimum_destination(mut self, minimum: Amount) -> Self {
        self.minimum_destination_amount = minimum;
        self
    }
}

/// Reply to a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketReply {
    /// Sequence of the request this answers.
    pub sequence: u64,
    /// Whether the packet was fulfilled or rejected.
    pub outcome: ReplyOutcome,
    /// Amount the receiver saw arrive, if it saw the packet at all.
    pub destination_amount: Option<Amount>,
}

impl PacketReply {
    /// A fulfilled packet that delivered `destination_amount`.
    pub fn fulfill(sequence: u64, destination_amount: Amount) -> Self {
        Self {
            sequence,
            outcome: ReplyOutcome::Fulfill,
            destination_amount: Some(destination_amount),
        }
    }

    /// A rejected packet. `destination_amount` is set when the receiver got the
    /// packet but refused it.
    pub fn reject(sequence: u64, code: RejectCode, destination_amount: Option<Amount>) -> Self {
        Self {
            sequence,
            outcome: ReplyOutcome::Reject(code),
            destination_amount,
        }
    }

    /// Check if the packet was fulfilled.
    pub fn is_fulfill(&self) -> bool {
        matches!(self.outcome, ReplyOutcome::Fulfill)
    }

    /// The reject code, if rejected.
    pub fn reject_code(&self) -> Option<RejectCode> {
        match self.outcome {
            ReplyOutcome::Fulfill => None,
            ReplyOutcome::Reject(code) => Some(code),
        }
    }
}

/// Result of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplyOutcome {
    /// Packet delivered and accepted.
    Fulfill,
    /// Packet refused somewhere on the path or by the receiver.
    Reject(RejectCode),
}

/// Why a packet was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectCode {
    /// Receiver got less than the request's minimum destination amount.
    InsufficientDestinationAmount,
    /// An intermediary lacked liquidity to forward the packet.
    InsufficientLiquidity,
    /// No route to the receiver.
    Unreachable,
    /// Packet expired in flight.
    Expired,
}

impl RejectCode {
    /// Protocol code string.
    pub fn code(&self) -> &'static str {
        match self {
            RejectCode::InsufficientDestinationAmount => "F99",
            RejectCode::InsufficientLiquidity => "T04",
            RejectCode::Unreachable => "F02",
            RejectCode::Expired => "R00",
        }
    }

    /// Final errors will not succeed on retry with the same packet.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            RejectCode::InsufficientDestinationAmount | RejectCode::Unreachable
        )
    }
}

impl fmt::Display for RejectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for RejectCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "F99" => Ok(RejectCode::InsufficientDestinationAmount),
            "T04" => Ok(RejectCode::InsufficientLiquidity),
            "F02" => Ok(RejectCode::Unreachable),
            "R00" => Ok(RejectCode::Expired),
            other => Err(ProtocolError::UnknownRejectCode(other.to_string())),
        }
    }
}

/// A completed round trip: the request and, if one came back, its reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTrip {
    /// The packet that was sent.
    pub request: PacketRequest,
    /// Reply, absent when the packet was lost or timed out locally.
    pub reply: Option<PacketReply>,
}

impl RoundTrip {
    /// Pair a request with its reply, checking the sequence numbers agree.
    pub fn new(request: PacketRequest, reply: Option<PacketReply>) -> Result<Self, ProtocolError> {
        if let Some(reply) = &reply {
            if reply.sequence != request.sequence {
                return Err(ProtocolError::SequenceMismatch {
                    request: request.sequence,
                    reply: reply.sequence,
                });
            }
        }
        Ok(Self { request, reply })
    }

    /// The `(sent, received)` pair when the reply reported a delivered amount.
    pub fn delivered(&self) -> Option<(&Amount, &Amount)> {
        let received = self.reply.as_ref()?.destination_amount.as_ref()?;
        Some((&self.request.source_amount, received))
    }

    /// Check if the packet was fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        self.reply.as_ref().map(PacketReply::is_fulfill).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_delivered() {
        let request = PacketRequest::new(1, Amount::from(1000u64));
        let reply = PacketReply::fulfill(1, Amount::from(920u64));

        let trip = RoundTrip::new(request, Some(reply)).unwrap();

        assert!(trip.is_fulfilled());
        assert_eq!(
            trip.delivered(),
            Some((&Amount::from(1000u64), &Amount::from(920u64)))
        );
    }

    #[test]
    fn test_reject_with_amount_is_delivered() {
        let request = PacketRequest::new(7, Amount::from(100u64))
            .with_minimum_destination(Amount::from(95u64));
        let reply = PacketReply::reject(
            7,
            RejectCode::InsufficientDestinationAmount,
            Some(Amount::from(90u64)),
        );

        let trip = RoundTrip::new(request, Some(reply)).unwrap();

        assert!(!trip.is_fulfilled());
        assert_eq!(trip.delivered().map(|(_, r)| r.clone()), Some(Amount::from(90u64)));
    }

    #[test]
    fn test_no_amount_without_reply() {
        let request = PacketRequest::new(2, Amount::from(100u64));
        let lost = RoundTrip::new(request.clone(), None).unwrap();
        assert!(lost.delivered().is_none());

        let reply = PacketReply::reject(2, RejectCode::InsufficientLiquidity, None);
        let rejected = RoundTrip::new(request, Some(reply)).unwrap();
        assert!(rejected.delivered().is_none());
    }

    #[test]
    fn test_sequence_mismatch() {
        let request = PacketRequest::new(3, Amount::from(100u64));
        let reply = PacketReply::fulfill(4, Amount::from(100u64));

        assert_eq!(
            RoundTrip::new(request, Some(reply)),
            Err(ProtocolError::SequenceMismatch { request: 3, reply: 4 })
        );
    }

    #[test]
    fn test_reject_codes() {
        for code in [
            RejectCode::InsufficientDestinationAmount,
            RejectCode::InsufficientLiquidity,
            RejectCode::Unreachable,
            RejectCode::Expired,
        ] {
            assert_eq!(code.code().parse::<RejectCode>().unwrap(), code);
        }
        assert!("F00".parse::<RejectCode>().is_err());
        assert!(RejectCode::Unreachable.is_final());
        assert!(!RejectCode::InsufficientLiquidity.is_final());
    }

    #[test]
    fn test_reply_serialization() {
        let reply = PacketReply::reject(9, RejectCode::Expired, None);
        let json = serde_json::to_string(&reply).unwrap();
        let back: PacketReply = serde_json::from_str(&json).unwrap();

        assert_eq!(back, reply);
        assert_eq!(back.reject_code(), Some(RejectCode::Expired));
    }
}
