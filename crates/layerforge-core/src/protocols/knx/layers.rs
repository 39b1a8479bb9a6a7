//! KNXnet/IP layer layouts. Each constructor returns a layer with default
//! values; field order is wire order.

use crate::packet::field::int_field;
use crate::packet::{Auto, Field, FieldDef, Layer, LayerCtor, Length, Value};

use super::cemi_layouts;
use super::layout::*;

pub const HEADER: &str = "KNXnet/IP";

fn int(value: u64) -> Value {
    Value::Int(value)
}

fn structure_length() -> FieldDef {
    FieldDef::u8("structure_length").auto(Auto::OwnLength)
}

pub fn header() -> Layer {
    Layer::new(HEADER)
        .with_field(FieldDef::u8("header_length").auto(Auto::OwnLength))
        .with_field(FieldDef::u8("protocol_version").with_default(int(PROTOCOL_VERSION.into())))
        .with_field(FieldDef::u16("service_identifier"))
        .with_field(FieldDef::u16("total_length").auto(Auto::TotalLength))
}

/// Host protocol address information.
pub fn hpai() -> Layer {
    Layer::new("HPAI")
        .with_field(structure_length())
        .with_field(FieldDef::u8("host_protocol").with_default(int(IPV4_UDP.into())))
        .with_field(FieldDef::ipv4("ip_address"))
        .with_field(FieldDef::u16("port"))
}

pub fn dib_device_info() -> Layer {
    Layer::new("DIB_DEVICE_INFO")
        .with_field(structure_length())
        .with_field(FieldDef::u8("description_type").with_default(int(DEVICE_INFO.into())))
        .with_field(FieldDef::u8("knx_medium").with_default(int(MEDIUM_TP1.into())))
        .with_field(FieldDef::u8("device_status"))
        .with_field(FieldDef::individual_address("knx_address"))
        .with_field(FieldDef::u16("project_installation_identifier"))
        .with_field(FieldDef::uint("device_serial_number", 6))
        .with_field(FieldDef::ipv4("device_multicast_address"))
        .with_field(FieldDef::mac("device_mac_address"))
        .with_field(FieldDef::bytes(
            "device_friendly_name",
            Length::Fixed(FRIENDLY_NAME_LENGTH),
        ))
}

fn families_len(fields: &[Field]) -> usize {
    int_field(fields, "structure_length").map_or(0, |len| len.saturating_sub(2) as usize)
}

pub fn dib_supp_svc_families() -> Layer {
    Layer::new("DIB_SUPP_SVC_FAMILIES")
        .with_field(structure_length())
        .with_field(
            FieldDef::u8("description_type").with_default(int(SUPP_SVC_FAMILIES.into())),
        )
        .with_field(FieldDef::bytes("service_family", Length::From(families_len)))
}

pub fn tunneling_connection() -> Layer {
    Layer::new("TUNNELING_CONNECTION")
        .with_field(FieldDef::u8("knx_layer").with_default(int(TUNNEL_LINKLAYER.into())))
        .with_field(FieldDef::u8("reserved"))
}

pub fn crd_tunneling_connection() -> Layer {
    Layer::new("CRD_TUNNELING_CONNECTION")
        .with_field(FieldDef::individual_address("knx_individual_address"))
}

fn is_tunneling(fields: &[Field]) -> bool {
    int_field(fields, "connection_type") == Some(TUNNELING_CONNECTION.into())
}

/// Connection request information.
pub fn cri() -> Layer {
    Layer::new("CRI")
        .with_field(structure_length())
        .with_field(
            FieldDef::u8("connection_type").with_default(int(DEVICE_MGMT_CONNECTION.into())),
        )
        .with_field(FieldDef::layer("connection_data", tunneling_connection).when(is_tunneling))
}

/// Connection response data block.
pub fn crd() -> Layer {
    Layer::new("CRD")
        .with_field(structure_length())
        .with_field(
            FieldDef::u8("connection_type").with_default(int(DEVICE_MGMT_CONNECTION.into())),
        )
        .with_field(FieldDef::layer("connection_data", crd_tunneling_connection).when(is_tunneling))
}

fn additional_information_len(fields: &[Field]) -> usize {
    int_field(fields, "additional_information_length").unwrap_or(0) as usize
}

/// Link-layer data frame carried in a cEMI message.
pub fn l_cemi() -> Layer {
    Layer::new("L_cEMI")
        .with_field(
            FieldDef::u8("additional_information_length")
                .auto(Auto::LengthOf("additional_information")),
        )
        .with_field(FieldDef::bytes(
            "additional_information",
            Length::From(additional_information_len),
        ))
        .with_field(FieldDef::bits("frame_type", 1).with_default(int(1)))
        .with_field(FieldDef::bits("reserved", 1))
        .with_field(FieldDef::bits("repeat_on_error", 1).with_default(int(1)))
        .with_field(FieldDef::bits("broadcast_type", 1).with_default(int(1)))
        .with_field(FieldDef::bits("priority", 2).with_default(int(3)))
        .with_field(FieldDef::bits("ack_request", 1))
        .with_field(FieldDef::bits("confirmation_error", 1))
        .with_field(FieldDef::bits("address_type", 1).with_default(int(1)))
        .with_field(FieldDef::bits("hop_count", 3).with_default(int(6)))
        .with_field(FieldDef::bits("extended_frame_format", 4))
        .with_field(FieldDef::individual_address("source_address"))
        .with_field(FieldDef::group_address("destination_address").with_default(int(0x0a03)))
        .with_field(FieldDef::u8("npdu_length").with_default(int(1)))
        .with_field(FieldDef::bits("packet_type", 1))
        .with_field(FieldDef::bits("sequence_type", 1))
        .with_field(FieldDef::bits("reserved2", 4))
        .with_field(FieldDef::bits("acpi", 4).with_default(int(2)))
        .with_field(FieldDef::bits("data", 6))
}

/// Device-management (property access) cEMI message.
pub fn dp_cemi() -> Layer {
    Layer::new("DP_cEMI")
        .with_field(FieldDef::u16("object_type"))
        .with_field(FieldDef::u8("object_instance"))
        .with_field(FieldDef::u8("property_id"))
        .with_field(FieldDef::bits("number_of_elements", 4))
        .with_field(FieldDef::bits("start_index", 12))
}

fn select_cemi(fields: &[Field]) -> LayerCtor {
    int_field(fields, "message_code")
        .and_then(|code| cemi_layouts().lookup(code).ok())
        .unwrap_or(l_cemi)
}

/// Common external message interface: message code plus the layout it selects.
pub fn cemi() -> Layer {
    Layer::new("CEMI")
        .with_field(FieldDef::u8("message_code"))
        .with_field(FieldDef::select("cemi_data", select_cemi, l_cemi))
}

pub fn search_request() -> Layer {
    Layer::new("SEARCH_REQUEST").with_field(FieldDef::layer("discovery_endpoint", hpai))
}

pub fn search_response() -> Layer {
    Layer::new("SEARCH_RESPONSE")
        .with_field(FieldDef::layer("control_endpoint", hpai))
        .with_field(FieldDef::layer("device_info", dib_device_info))
        .with_field(FieldDef::layer("supported_service_families", dib_supp_svc_families))
}

pub fn description_request() -> Layer {
    Layer::new("DESCRIPTION_REQUEST").with_field(FieldDef::layer("control_endpoint", hpai))
}

pub fn description_response() -> Layer {
    Layer::new("DESCRIPTION_RESPONSE")
        .with_field(FieldDef::layer("device_info", dib_device_info))
        .with_field(FieldDef::layer("supported_service_families", dib_supp_svc_families))
}

pub fn connect_request() -> Layer {
    Layer::new("CONNECT_REQUEST")
        .with_field(FieldDef::layer("control_endpoint", hpai))
        .with_field(FieldDef::layer("data_endpoint", hpai))
        .with_field(FieldDef::layer("connection_request_information", cri))
}

pub fn connect_response() -> Layer {
    Layer::new("CONNECT_RESPONSE")
        .with_field(FieldDef::u8("communication_channel_id"))
        .with_field(FieldDef::u8("status"))
        .with_field(FieldDef::layer("data_endpoint", hpai))
        .with_field(FieldDef::layer("connection_response_data_block", crd))
}

fn channel_request(name: &str) -> Layer {
    Layer::new(name)
        .with_field(FieldDef::u8("communication_channel_id"))
        .with_field(FieldDef::u8("reserved"))
        .with_field(FieldDef::layer("control_endpoint", hpai))
}

fn channel_response(name: &str) -> Layer {
    Layer::new(name)
        .with_field(FieldDef::u8("communication_channel_id"))
        .with_field(FieldDef::u8("status"))
}

pub fn connectionstate_request() -> Layer {
    channel_request("CONNECTIONSTATE_REQUEST")
}

pub fn connectionstate_response() -> Layer {
    channel_response("CONNECTIONSTATE_RESPONSE")
}

pub fn disconnect_request() -> Layer {
    channel_request("DISCONNECT_REQUEST")
}

pub fn disconnect_response() -> Layer {
    channel_response("DISCONNECT_RESPONSE")
}

fn connection_header(name: &str) -> Layer {
    Layer::new(name)
        .with_field(FieldDef::u8("structure_length").with_default(int(4)))
        .with_field(FieldDef::u8("communication_channel_id").with_default(int(1)))
        .with_field(FieldDef::u8("sequence_counter"))
}

pub fn configuration_request() -> Layer {
    connection_header("CONFIGURATION_REQUEST")
        .with_field(FieldDef::u8("reserved"))
        .with_field(FieldDef::layer("cemi", cemi))
}

pub fn configuration_ack() -> Layer {
    connection_header("CONFIGURATION_ACK").with_field(FieldDef::u8("status"))
}

pub fn tunneling_request() -> Layer {
    connection_header("TUNNELING_REQUEST")
        .with_field(FieldDef::u8("reserved"))
        .with_field(FieldDef::layer("cemi", cemi))
}

pub fn tunneling_ack() -> Layer {
    connection_header("TUNNELING_ACK").with_field(FieldDef::u8("status"))
}

/// Service body constructors keyed by service identifier.
pub const SERVICE_BODIES: &[(u16, LayerCtor)] = &[
    (SEARCH_REQUEST, search_request),
    (SEARCH_RESPONSE, search_response),
    (DESCRIPTION_REQUEST, description_request),
    (DESCRIPTION_RESPONSE, description_response),
    (CONNECT_REQUEST, connect_request),
    (CONNECT_RESPONSE, connect_response),
    (CONNECTIONSTATE_REQUEST, connectionstate_request),
    (CONNECTIONSTATE_RESPONSE, connectionstate_response),
    (DISCONNECT_REQUEST, disconnect_request),
    (DISCONNECT_RESPONSE, disconnect_response),
    (CONFIGURATION_REQUEST, configuration_request),
    (CONFIGURATION_ACK, configuration_ack),
    (TUNNELING_REQUEST, tunneling_request),
    (TUNNELING_ACK, tunneling_ack),
];

/// cEMI payload constructors keyed by message code.
pub const CEMI_BODIES: &[(u8, LayerCtor)] = &[
    (L_DATA_REQ, l_cemi),
    (L_DATA_CON, l_cemi),
    (L_DATA_IND, l_cemi),
    (PROP_READ_REQ, dp_cemi),
    (PROP_READ_CON, dp_cemi),
    (PROP_WRITE_REQ, dp_cemi),
    (PROP_WRITE_CON, dp_cemi),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_defaults() {
        let bytes = header().encode().unwrap();
        assert_eq!(bytes, vec![0x06, 0x10, 0x00, 0x00, 0x00, 0x06]);
        assert_eq!(bytes[0], HEADER_LENGTH);
    }

    #[test]
    fn device_info_has_fixed_size() {
        assert_eq!(dib_device_info().wire_len(), DEVICE_INFO_LENGTH);
        let bytes = dib_device_info().encode().unwrap();
        assert_eq!(bytes[0] as usize, DEVICE_INFO_LENGTH);
    }

    #[test]
    fn cri_connection_data_follows_type() {
        let mut layer = cri();
        assert_eq!(layer.encode().unwrap(), vec![0x02, 0x03]);
        layer.set("connection_type", TUNNELING_CONNECTION);
        assert_eq!(layer.encode().unwrap(), vec![0x04, 0x04, 0x02, 0x00]);
    }

    #[test]
    fn l_cemi_default_encoding() {
        let bytes = l_cemi().encode().unwrap();
        assert_eq!(
            bytes,
            vec![0x00, 0xbc, 0xe0, 0x00, 0x00, 0x0a, 0x03, 0x01, 0x00, 0x80]
        );
    }

    #[test]
    fn cemi_selects_layout_from_message_code() {
        let bytes = [PROP_READ_REQ, 0x00, 0x0b, 0x01, 0x35, 0x10, 0x01];
        let layer = Layer::dissect(cemi(), &bytes, &[]).unwrap();
        let data = layer.get("cemi_data").and_then(Value::as_layer).unwrap();
        assert_eq!(data.name(), "DP_cEMI");
        assert_eq!(data.get("property_id"), Some(&Value::Int(0x35)));
        assert_eq!(data.get("start_index"), Some(&Value::Int(1)));
        assert_eq!(layer.encode().unwrap(), bytes.to_vec());
    }
}
