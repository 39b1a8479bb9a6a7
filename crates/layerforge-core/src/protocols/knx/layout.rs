use crate::registry::CodeTable;

pub const KNX_PORT: u16 = 3671;
pub const HEADER_LENGTH: u8 = 0x06;
pub const PROTOCOL_VERSION: u8 = 0x10;

pub const SEARCH_REQUEST: u16 = 0x0201;
pub const SEARCH_RESPONSE: u16 = 0x0202;
pub const DESCRIPTION_REQUEST: u16 = 0x0203;
pub const DESCRIPTION_RESPONSE: u16 = 0x0204;
pub const CONNECT_REQUEST: u16 = 0x0205;
pub const CONNECT_RESPONSE: u16 = 0x0206;
pub const CONNECTIONSTATE_REQUEST: u16 = 0x0207;
pub const CONNECTIONSTATE_RESPONSE: u16 = 0x0208;
pub const DISCONNECT_REQUEST: u16 = 0x0209;
pub const DISCONNECT_RESPONSE: u16 = 0x020a;
pub const CONFIGURATION_REQUEST: u16 = 0x0310;
pub const CONFIGURATION_ACK: u16 = 0x0311;
pub const TUNNELING_REQUEST: u16 = 0x0420;
pub const TUNNELING_ACK: u16 = 0x0421;

pub const L_DATA_REQ: u8 = 0x11;
pub const L_DATA_CON: u8 = 0x2e;
pub const L_DATA_IND: u8 = 0x29;
pub const PROP_READ_REQ: u8 = 0xfc;
pub const PROP_READ_CON: u8 = 0xfb;
pub const PROP_WRITE_REQ: u8 = 0xf6;
pub const PROP_WRITE_CON: u8 = 0xf5;

pub const IPV4_UDP: u8 = 0x01;
pub const IPV4_TCP: u8 = 0x02;

pub const DEVICE_INFO: u8 = 0x01;
pub const SUPP_SVC_FAMILIES: u8 = 0x02;

pub const DEVICE_MGMT_CONNECTION: u8 = 0x03;
pub const TUNNELING_CONNECTION: u8 = 0x04;

pub const TUNNEL_LINKLAYER: u8 = 0x02;
pub const MEDIUM_TP1: u8 = 0x02;

/// DIB DEVICE_INFO structure size, fixed by the layout.
pub const DEVICE_INFO_LENGTH: usize = 54;
pub const FRIENDLY_NAME_LENGTH: usize = 30;

/// Service identifiers of the KNXnet/IP header.
pub const SERVICES: CodeTable = CodeTable::new(&[
    (SEARCH_REQUEST as u64, "SEARCH_REQUEST"),
    (SEARCH_RESPONSE as u64, "SEARCH_RESPONSE"),
    (DESCRIPTION_REQUEST as u64, "DESCRIPTION_REQUEST"),
    (DESCRIPTION_RESPONSE as u64, "DESCRIPTION_RESPONSE"),
    (CONNECT_REQUEST as u64, "CONNECT_REQUEST"),
    (CONNECT_RESPONSE as u64, "CONNECT_RESPONSE"),
    (CONNECTIONSTATE_REQUEST as u64, "CONNECTIONSTATE_REQUEST"),
    (CONNECTIONSTATE_RESPONSE as u64, "CONNECTIONSTATE_RESPONSE"),
    (DISCONNECT_REQUEST as u64, "DISCONNECT_REQUEST"),
    (DISCONNECT_RESPONSE as u64, "DISCONNECT_RESPONSE"),
    (CONFIGURATION_REQUEST as u64, "CONFIGURATION_REQUEST"),
    (CONFIGURATION_ACK as u64, "CONFIGURATION_ACK"),
    (TUNNELING_REQUEST as u64, "TUNNELING_REQUEST"),
    (TUNNELING_ACK as u64, "TUNNELING_ACK"),
]);

/// cEMI message codes.
pub const MESSAGE_CODES: CodeTable = CodeTable::new(&[
    (L_DATA_REQ as u64, "L_Data.req"),
    (L_DATA_CON as u64, "L_Data.con"),
    (L_DATA_IND as u64, "L_Data.ind"),
    (PROP_READ_REQ as u64, "PropRead.req"),
    (PROP_READ_CON as u64, "PropRead.con"),
    (PROP_WRITE_REQ as u64, "PropWrite.req"),
    (PROP_WRITE_CON as u64, "PropWrite.con"),
]);

pub const HOST_PROTOCOLS: CodeTable =
    CodeTable::new(&[(IPV4_UDP as u64, "IPV4_UDP"), (IPV4_TCP as u64, "IPV4_TCP")]);

pub const DESCRIPTION_TYPES: CodeTable = CodeTable::new(&[
    (DEVICE_INFO as u64, "DEVICE_INFO"),
    (SUPP_SVC_FAMILIES as u64, "SUPP_SVC_FAMILIES"),
    (0x03, "IP_CONFIG"),
    (0x04, "IP_CUR_CONFIG"),
    (0x05, "KNX_ADDRESSES"),
    (0xfe, "MFR_DATA"),
]);

pub const CONNECTION_TYPES: CodeTable = CodeTable::new(&[
    (DEVICE_MGMT_CONNECTION as u64, "DEVICE_MGMT_CONNECTION"),
    (TUNNELING_CONNECTION as u64, "TUNNELING_CONNECTION"),
    (0x06, "REMLOG_CONNECTION"),
    (0x07, "REMCONF_CONNECTION"),
    (0x08, "OBJSVR_CONNECTION"),
]);

pub const KNX_MEDIUMS: CodeTable = CodeTable::new(&[
    (0x01, "reserved"),
    (MEDIUM_TP1 as u64, "TP1"),
    (0x04, "PL110"),
    (0x08, "reserved"),
    (0x10, "RF"),
    (0x20, "KNX IP"),
]);
