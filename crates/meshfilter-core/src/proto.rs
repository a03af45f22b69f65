//! Protobuf wire messages for the mesh bus envelope.
//!
//! Hand-declared with prost derives so no code generation step is needed.
//! Only the fields the filter reads are declared; everything else is
//! skipped on decode. The forward path never re-encodes, so undeclared
//! fields are not lost.

/// Outer message published by gateways onto the bus.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ServiceEnvelope {
    #[prost(message, optional, tag = "1")]
    pub packet: Option<MeshPacket>,
    #[prost(string, tag = "2")]
    pub channel_id: String,
    #[prost(string, tag = "3")]
    pub gateway_id: String,
}

/// A single over-the-air mesh packet.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MeshPacket {
    /// Sender node number (`from` on the wire).
    #[prost(fixed32, tag = "1")]
    pub from_node: u32,
    #[prost(fixed32, tag = "2")]
    pub to: u32,
    #[prost(uint32, tag = "3")]
    pub channel: u32,
    #[prost(oneof = "PayloadVariant", tags = "4, 5")]
    pub payload_variant: Option<PayloadVariant>,
    #[prost(fixed32, tag = "6")]
    pub id: u32,
    #[prost(fixed32, tag = "7")]
    pub rx_time: u32,
    #[prost(float, tag = "8")]
    pub rx_snr: f32,
    #[prost(uint32, tag = "9")]
    pub hop_limit: u32,
    #[prost(bool, tag = "10")]
    pub want_ack: bool,
    #[prost(int32, tag = "12")]
    pub rx_rssi: i32,
    #[prost(bool, tag = "14")]
    pub via_mqtt: bool,
    #[prost(uint32, tag = "15")]
    pub hop_start: u32,
    #[prost(bool, tag = "17")]
    pub pki_encrypted: bool,
}

/// Either cleartext application data or the channel-encrypted bytes of it.
#[derive(Clone, PartialEq, prost::Oneof)]
pub enum PayloadVariant {
    #[prost(message, tag = "4")]
    Decoded(Data),
    #[prost(bytes, tag = "5")]
    Encrypted(Vec<u8>),
}

/// Application payload carried inside a packet.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Data {
    #[prost(enumeration = "PortNum", tag = "1")]
    pub portnum: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    #[prost(bool, tag = "3")]
    pub want_response: bool,
    #[prost(fixed32, tag = "4")]
    pub dest: u32,
    #[prost(fixed32, tag = "5")]
    pub source: u32,
    #[prost(fixed32, tag = "6")]
    pub request_id: u32,
    #[prost(fixed32, tag = "7")]
    pub reply_id: u32,
    #[prost(fixed32, tag = "8")]
    pub emoji: u32,
    /// Sender flags; bit 0 is "ok to relay onto the bus". Absent on
    /// firmware that predates the field.
    #[prost(uint32, optional, tag = "9")]
    pub bitfield: Option<u32>,
}

/// Application port numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum PortNum {
    UnknownApp = 0,
    TextMessageApp = 1,
    RemoteHardwareApp = 2,
    PositionApp = 3,
    NodeinfoApp = 4,
    RoutingApp = 5,
    AdminApp = 6,
    TextMessageCompressedApp = 7,
    WaypointApp = 8,
    AudioApp = 9,
    DetectionSensorApp = 10,
    ReplyApp = 32,
    IpTunnelApp = 33,
    PaxcounterApp = 34,
    SerialApp = 64,
    StoreForwardApp = 65,
    RangeTestApp = 66,
    TelemetryApp = 67,
    ZpsApp = 68,
    SimulatorApp = 69,
    TracerouteApp = 70,
    NeighborinfoApp = 71,
    AtakPlugin = 72,
    MapReportApp = 73,
    PowerstressApp = 74,
    PrivateApp = 256,
    AtakForwarder = 257,
}

impl PortNum {
    /// Wire-style name, e.g. `TEXT_MESSAGE_APP`.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            PortNum::UnknownApp => "UNKNOWN_APP",
            PortNum::TextMessageApp => "TEXT_MESSAGE_APP",
            PortNum::RemoteHardwareApp => "REMOTE_HARDWARE_APP",
            PortNum::PositionApp => "POSITION_APP",
            PortNum::NodeinfoApp => "NODEINFO_APP",
            PortNum::RoutingApp => "ROUTING_APP",
            PortNum::AdminApp => "ADMIN_APP",
            PortNum::TextMessageCompressedApp => "TEXT_MESSAGE_COMPRESSED_APP",
            PortNum::WaypointApp => "WAYPOINT_APP",
            PortNum::AudioApp => "AUDIO_APP",
            PortNum::DetectionSensorApp => "DETECTION_SENSOR_APP",
            PortNum::ReplyApp => "REPLY_APP",
            PortNum::IpTunnelApp => "IP_TUNNEL_APP",
            PortNum::PaxcounterApp => "PAXCOUNTER_APP",
            PortNum::SerialApp => "SERIAL_APP",
            PortNum::StoreForwardApp => "STORE_FORWARD_APP",
            PortNum::RangeTestApp => "RANGE_TEST_APP",
            PortNum::TelemetryApp => "TELEMETRY_APP",
            PortNum::ZpsApp => "ZPS_APP",
            PortNum::SimulatorApp => "SIMULATOR_APP",
            PortNum::TracerouteApp => "TRACEROUTE_APP",
            PortNum::NeighborinfoApp => "NEIGHBORINFO_APP",
            PortNum::AtakPlugin => "ATAK_PLUGIN",
            PortNum::MapReportApp => "MAP_REPORT_APP",
            PortNum::PowerstressApp => "POWERSTRESS_APP",
            PortNum::PrivateApp => "PRIVATE_APP",
            PortNum::AtakForwarder => "ATAK_FORWARDER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_data_wire_layout() {
        let data = Data {
            portnum: PortNum::TextMessageApp as i32,
            payload: b"hi".to_vec(),
            bitfield: Some(1),
            ..Default::default()
        };
        assert_eq!(data.encode_to_vec(), [0x08, 0x01, 0x12, 0x02, b'h', b'i', 0x48, 0x01]);
    }

    #[test]
    fn test_absent_bitfield_is_none() {
        let data = Data::decode(&[0x08, 0x01][..]).unwrap();
        assert_eq!(data.bitfield, None);

        let zero = Data::decode(&[0x08, 0x01, 0x48, 0x00][..]).unwrap();
        assert_eq!(zero.bitfield, Some(0));
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        // field 16 (public_key, bytes) is not declared
        let mut bytes = MeshPacket {
            from_node: 7,
            ..Default::default()
        }
        .encode_to_vec();
        bytes.extend_from_slice(&[0x82, 0x01, 0x02, 0xaa, 0xbb]);
        let packet = MeshPacket::decode(bytes.as_slice()).unwrap();
        assert_eq!(packet.from_node, 7);
    }

    #[test]
    fn test_port_names() {
        assert_eq!(PortNum::TextMessageApp.as_str_name(), "TEXT_MESSAGE_APP");
        assert_eq!(PortNum::try_from(67), Ok(PortNum::TelemetryApp));
        assert!(PortNum::try_from(9999).is_err());
    }
}
