use std::net::Ipv4Addr;

use layerforge_core::packet::{FieldKind, Layer, Value};
use layerforge_core::protocols::knx::{SERVICES, layers, service_layouts};
use layerforge_core::protocols::knx::layout::{
    CONFIGURATION_REQUEST, DESCRIPTION_REQUEST, DESCRIPTION_RESPONSE, L_DATA_CON, L_DATA_REQ,
    PROP_READ_CON, PROP_READ_REQ, SEARCH_REQUEST, TUNNELING_REQUEST,
};
use layerforge_core::{FrameError, KnxFrame};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DESCRIPTION_REQUEST_BYTES: [u8; 14] = [
    0x06, 0x10, 0x02, 0x03, 0x00, 0x0e, 0x08, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

fn names(frame: &KnxFrame) -> Vec<&str> {
    frame.iter().map(|field| field.name()).collect()
}

#[test]
fn empty_frame_is_the_header() {
    let frame = KnxFrame::new();
    assert_eq!(
        names(&frame),
        [
            "header_length",
            "protocol_version",
            "service_identifier",
            "total_length"
        ]
    );
    assert_eq!(frame.to_bytes().unwrap(), [0x06, 0x10, 0x00, 0x00, 0x00, 0x06]);
}

#[test]
fn service_from_code_name_and_bytes() {
    let by_code = KnxFrame::with_type(DESCRIPTION_REQUEST).unwrap();
    assert_eq!(by_code.get("service_identifier").unwrap(), &Value::Int(0x0203));

    let by_name = KnxFrame::with_type("DESCRIPTION REQUEST").unwrap();
    assert_eq!(by_name.get("service_identifier").unwrap(), &Value::Int(0x0203));

    let by_bytes = KnxFrame::with_type(&b"\x02\x03"[..]).unwrap();
    assert_eq!(by_bytes.type_name(), "DESCRIPTION_REQUEST");
}

#[test]
fn every_registered_service_builds() {
    for code in service_layouts().codes() {
        let by_code = KnxFrame::with_type(code).unwrap();
        assert_eq!(by_code.get("service_identifier").unwrap().as_int(), Some(code));
        let bytes = by_code.to_bytes().unwrap();
        assert_eq!(by_code.len(), bytes.len(), "length of {code:#06x}");

        let name = SERVICES.name(code).unwrap();
        let by_name = KnxFrame::with_type(name).unwrap();
        assert_eq!(by_name.to_bytes().unwrap(), bytes, "{name}");
    }
}

fn integer_field_names(layer: &Layer, names: &mut Vec<(String, u64)>) {
    for field in layer.fields() {
        let max = match field.kind() {
            FieldKind::U8 => u64::from(u8::MAX),
            FieldKind::U16 => u64::from(u16::MAX),
            FieldKind::U32 => u64::from(u32::MAX),
            FieldKind::UInt(width) if *width < 8 => (1u64 << (width * 8)) - 1,
            FieldKind::UInt(_) => u64::MAX,
            FieldKind::Bits(bits) if *bits == 0 => continue,
            FieldKind::Bits(bits) if *bits < 64 => (1u64 << bits) - 1,
            FieldKind::Bits(_) => u64::MAX,
            _ => {
                if let Some(nested) = field.value().as_layer() {
                    integer_field_names(nested, names);
                }
                continue;
            }
        };
        if names.iter().all(|(name, _)| name != field.name()) {
            names.push((field.name().to_string(), max));
        }
    }
    if let Some(payload) = layer.payload() {
        integer_field_names(payload, names);
    }
}

#[test]
fn every_integer_field_reads_back_what_was_set() {
    for code in service_layouts().codes() {
        let mut frame = KnxFrame::with_type(code).unwrap();
        let mut names = Vec::new();
        integer_field_names(frame.root(), &mut names);
        assert!(!names.is_empty());
        for (name, max) in names {
            for value in [1, max] {
                frame.set(&name, value).unwrap();
                assert_eq!(
                    frame.get(&name).unwrap().as_int(),
                    Some(value),
                    "{name} in {code:#06x}"
                );
            }
        }
    }
}

#[test]
fn random_bodies_survive_dissection() {
    let mut rng = StdRng::seed_from_u64(0x0610_0203);
    for code in service_layouts().codes() {
        for _ in 0..200 {
            let len = rng.gen_range(0..=48usize);
            let total = (6 + len) as u16;
            let mut bytes = vec![0x06, 0x10];
            bytes.extend((code as u16).to_be_bytes());
            bytes.extend(total.to_be_bytes());
            bytes.extend((0..len).map(|_| rng.r#gen::<u8>()));

            let frame = KnxFrame::from_bytes(&bytes).unwrap();
            assert_eq!(frame.to_bytes().unwrap(), bytes, "{code:#06x}");
            assert_eq!(frame.len(), bytes.len(), "{code:#06x}");
        }
    }
}

#[test]
fn prebuilt_layers_serialize_like_typed_construction() {
    let root = layers::header().with_payload(layers::description_request());
    let mut frame = KnxFrame::from_layer(root);
    frame.set("service_identifier", DESCRIPTION_REQUEST).unwrap();
    assert_eq!(frame.to_bytes().unwrap(), DESCRIPTION_REQUEST_BYTES);
}

#[test]
fn invalid_service_descriptors_are_rejected() {
    assert!(matches!(
        KnxFrame::with_type("NUL").unwrap_err(),
        FrameError::InvalidType(_)
    ));
    assert_eq!(
        KnxFrame::with_type(&b"\x00\x01"[..]).unwrap_err(),
        FrameError::UnknownType { code: 0x0001 }
    );
}

#[test]
fn empty_service_leaves_identifier_unset() {
    let frame = KnxFrame::with_type("").unwrap();
    assert!(frame.get("service_identifier").unwrap().is_unset());
}

#[test]
fn header_fields_can_be_overridden() {
    let frame = KnxFrame::builder()
        .service(DESCRIPTION_REQUEST)
        .field("service_identifier", SEARCH_REQUEST)
        .build()
        .unwrap();
    assert_eq!(frame.get("service_identifier").unwrap(), &Value::Int(0x0201));
}

#[test]
fn nested_fields_are_reachable_by_name() {
    let frame = KnxFrame::builder()
        .service(DESCRIPTION_REQUEST)
        .field("ip_address", "192.168.1.1")
        .build()
        .unwrap();
    assert_eq!(
        frame.get("ip_address").unwrap(),
        &Value::Ipv4(Ipv4Addr::new(192, 168, 1, 1))
    );
    let endpoint = frame.get("control_endpoint").unwrap().as_layer().unwrap();
    assert_eq!(endpoint.get("ip_address").unwrap().to_string(), "192.168.1.1");
}

#[test]
fn whole_sub_layer_can_be_assigned() {
    let mut hpai = layers::hpai();
    hpai.set("ip_address", "192.168.1.2");
    let frame = KnxFrame::builder()
        .service(DESCRIPTION_REQUEST)
        .field("control_endpoint", hpai)
        .build()
        .unwrap();
    assert_eq!(frame.get("ip_address").unwrap().to_string(), "192.168.1.2");
    assert_eq!(frame.get_raw("ip_address").unwrap(), [0xc0, 0xa8, 0x01, 0x02]);
}

#[test]
fn tunneling_request_defaults_to_link_layer_cemi() {
    let frame = KnxFrame::with_type(TUNNELING_REQUEST).unwrap();
    let cemi = frame.get("cemi").unwrap().as_layer().unwrap();
    let data = cemi.get("cemi_data").and_then(Value::as_layer).unwrap();
    assert_eq!(data.name(), "L_cEMI");
}

#[test]
fn cemi_from_code_name_and_bytes() {
    let mut frame = KnxFrame::with_type(CONFIGURATION_REQUEST).unwrap();
    frame.set_cemi(PROP_READ_REQ).unwrap();
    assert_eq!(frame.get("message_code").unwrap(), &Value::Int(0xfc));

    let frame = KnxFrame::builder()
        .service("CONFIGURATION REQUEST")
        .cemi("PropWrite.req")
        .build()
        .unwrap();
    assert_eq!(frame.get("message_code").unwrap(), &Value::Int(0xf6));

    let frame = KnxFrame::builder()
        .service(&b"\x04\x20"[..])
        .cemi(&b"\x2e"[..])
        .build()
        .unwrap();
    assert_eq!(
        frame.get("message_code").unwrap(),
        &Value::Int(L_DATA_CON.into())
    );
}

#[test]
fn cemi_on_a_service_without_cemi_fails() {
    let err = KnxFrame::builder()
        .service(DESCRIPTION_RESPONSE)
        .cemi(PROP_READ_CON)
        .build()
        .unwrap_err();
    assert!(matches!(err, FrameError::IncompatibleSubtype { .. }));
}

#[test]
fn invalid_cemi_descriptors_are_rejected() {
    let invalid_name = KnxFrame::builder()
        .service(TUNNELING_REQUEST)
        .cemi("nul")
        .build();
    assert!(matches!(invalid_name, Err(FrameError::InvalidType(_))));

    let invalid_code = KnxFrame::builder()
        .service(TUNNELING_REQUEST)
        .cemi(&b"\x80"[..])
        .build();
    assert_eq!(invalid_code.unwrap_err(), FrameError::UnknownType { code: 0x80 });
}

#[test]
fn empty_service_and_cemi_give_header_only() {
    let frame = KnxFrame::builder().service("").cemi("").build().unwrap();
    assert!(frame.get("service_identifier").unwrap().is_unset());
    assert!(matches!(
        frame.get("cemi"),
        Err(FrameError::FieldNotFound { .. })
    ));
}

#[test]
fn cemi_data_field_is_settable_and_encodes() {
    let frame = KnxFrame::builder()
        .service(CONFIGURATION_REQUEST)
        .cemi(L_DATA_REQ)
        .field("data", 4u8)
        .build()
        .unwrap();
    assert_eq!(frame.get("data").unwrap(), &Value::Int(4));
    let bytes = frame.to_bytes().unwrap();
    assert_eq!(bytes.len(), frame.len());
}

#[test]
fn service_identifier_readable_after_typing() {
    let frame = KnxFrame::with_type(SEARCH_REQUEST).unwrap();
    assert_eq!(frame.get("service_identifier").unwrap(), &Value::Int(0x0201));
}

#[test]
fn raw_assignment_to_header_field() {
    let mut frame = KnxFrame::new();
    frame.set("service_identifier", &b"\x02\x01"[..]).unwrap();
    assert_eq!(frame.get_raw("service_identifier").unwrap(), [0x02, 0x01]);
}

#[test]
fn deep_field_typed_and_raw_views() {
    let frame = KnxFrame::builder()
        .service(DESCRIPTION_REQUEST)
        .field("port", 60000u16)
        .build()
        .unwrap();
    assert_eq!(frame.get("port").unwrap(), &Value::Int(60000));
    assert_eq!(frame.get_raw("port").unwrap(), [0xea, 0x60]);
}

#[test]
fn uninterpretable_value_is_kept_until_encoding() {
    let mut frame = KnxFrame::with_type(DESCRIPTION_REQUEST).unwrap();
    frame.set("ip_address", "hi mark!").unwrap();
    assert_eq!(frame.get("ip_address").unwrap(), &Value::from("hi mark!"));
    assert_eq!(frame.get_raw("ip_address").unwrap(), b"hi mark!");
    assert!(matches!(
        frame.to_bytes().unwrap_err(),
        FrameError::Packet(_)
    ));
}

#[test]
fn raw_bytes_decode_into_typed_value() {
    let mut frame = KnxFrame::with_type(DESCRIPTION_REQUEST).unwrap();
    frame.set_raw("ip_address", &[0xc0, 0xa8, 0x01, 0x2a]).unwrap();
    assert_eq!(frame.get("ip_address").unwrap().to_string(), "192.168.1.42");
    assert_eq!(frame.get_raw("ip_address").unwrap(), [0xc0, 0xa8, 0x01, 0x2a]);
    frame.to_bytes().unwrap();
}

#[test]
fn wire_bytes_round_trip() {
    let frame = KnxFrame::from_bytes(&DESCRIPTION_REQUEST_BYTES).unwrap();
    assert_eq!(frame.type_name(), "DESCRIPTION_REQUEST");
    assert_eq!(frame.to_string(), "KnxFrame: DESCRIPTION_REQUEST");
    assert_eq!(frame.to_bytes().unwrap(), DESCRIPTION_REQUEST_BYTES);
    assert_eq!(frame.len(), DESCRIPTION_REQUEST_BYTES.len());
}

#[test]
fn tunneling_request_round_trips_through_dissection() {
    let frame = KnxFrame::builder()
        .service(TUNNELING_REQUEST)
        .cemi("L_Data.ind")
        .field("destination_address", "1/2/4")
        .field("sequence_counter", 7u8)
        .build()
        .unwrap();
    let bytes = frame.to_bytes().unwrap();
    let decoded = KnxFrame::from_bytes(&bytes).unwrap();
    assert_eq!(decoded.type_name(), "TUNNELING_REQUEST");
    assert_eq!(decoded.to_bytes().unwrap(), bytes);
    assert_eq!(decoded.get("sequence_counter").unwrap(), &Value::Int(7));
    assert_eq!(decoded.get("message_code").unwrap(), &Value::Int(0x29));
    assert_eq!(decoded.get("destination_address").unwrap().as_int(), Some(0x0a04));
}

#[test]
fn unknown_service_keeps_body_bytes_raw() {
    let bytes = [0x06, 0x10, 0x09, 0x99, 0x00, 0x08, 0xaa, 0xbb];
    let frame = KnxFrame::from_bytes(&bytes).unwrap();
    assert_eq!(frame.type_name(), "Raw");
    assert_eq!(frame.get_raw("load").unwrap(), [0xaa, 0xbb]);
    assert_eq!(frame.to_bytes().unwrap(), bytes);
}

#[test]
fn truncated_header_fails() {
    let err = KnxFrame::from_bytes(&[0x06, 0x10, 0x02]).unwrap_err();
    assert!(matches!(err, FrameError::Packet(_)));
}
