//! Bit-exact ICMP heartbeat wire format (§6): fixed payload header, TLV
//! tail, and the surrounding Ethernet/IPv4/ICMP framing.

pub mod frame;
pub mod payload;
pub mod tlv;

pub use frame::{build_frame, parse_frame, rewrite_seq_and_tlv, FrameParams, ParsedFrame};
pub use payload::{classify_guid, GuidClassification, PayloadHeader, ProberKind};
pub use tlv::{append_command, append_sentinel, command_from_tlv, parse_tlv_tail, Command, Tlv, TlvType};
