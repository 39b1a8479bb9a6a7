use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

const DESCRIPTION_REQUEST_HEX: &str = "06100203000e0801000000000000";
const SEARCH_REQUEST: [u8; 14] = [
    0x06, 0x10, 0x02, 0x01, 0x00, 0x0e, 0x08, 0x01, 0xe0, 0x00, 0x17, 0x0c, 0x0e, 0x57,
];

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("layerforge"))
}

fn stdout_json(assert: assert_cmd::assert::Assert) -> Value {
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    serde_json::from_str(&stdout).expect("valid json")
}

fn ethernet_udp(sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::new();
    packet.extend_from_slice(&[0x01, 0x00, 0x5e, 0x00, 0x17, 0x0c]);
    packet.extend_from_slice(&[0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f]);
    packet.extend_from_slice(&0x0800u16.to_be_bytes());

    let mut ip_header = [0u8; 20];
    ip_header[0] = 0x45;
    ip_header[2..4].copy_from_slice(&(28 + payload.len() as u16).to_be_bytes());
    ip_header[8] = 64;
    ip_header[9] = 17;
    ip_header[12..16].copy_from_slice(&[192, 168, 1, 10]);
    ip_header[16..20].copy_from_slice(&[224, 0, 23, 12]);
    packet.extend_from_slice(&ip_header);

    packet.extend_from_slice(&sport.to_be_bytes());
    packet.extend_from_slice(&dport.to_be_bytes());
    packet.extend_from_slice(&(8 + payload.len() as u16).to_be_bytes());
    packet.extend_from_slice(&0u16.to_be_bytes());
    packet.extend_from_slice(payload);
    packet
}

fn pcapng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_len = (12 + body.len()) as u32;
    let mut block = Vec::new();
    block.extend_from_slice(&block_type.to_be_bytes());
    block.extend_from_slice(&total_len.to_be_bytes());
    block.extend_from_slice(body);
    block.extend_from_slice(&total_len.to_be_bytes());
    block
}

fn write_capture(path: &Path) {
    let mut section = Vec::new();
    section.extend_from_slice(&0x1A2B_3C4Du32.to_be_bytes());
    section.extend_from_slice(&1u16.to_be_bytes());
    section.extend_from_slice(&0u16.to_be_bytes());
    section.extend_from_slice(&(-1i64).to_be_bytes());
    let mut interface = Vec::new();
    interface.extend_from_slice(&1u16.to_be_bytes());
    interface.extend_from_slice(&0u16.to_be_bytes());
    interface.extend_from_slice(&65535u32.to_be_bytes());

    let data = ethernet_udp(50000, 3671, &SEARCH_REQUEST);
    let mut packet = Vec::new();
    packet.extend_from_slice(&0u32.to_be_bytes());
    packet.extend_from_slice(&0u32.to_be_bytes());
    packet.extend_from_slice(&1_000_000u32.to_be_bytes());
    packet.extend_from_slice(&(data.len() as u32).to_be_bytes());
    packet.extend_from_slice(&(data.len() as u32).to_be_bytes());
    packet.extend_from_slice(&data);
    packet.resize(packet.len() + (4 - data.len() % 4) % 4, 0);

    let mut output = pcapng_block(0x0A0D_0D0A, &section);
    output.extend(pcapng_block(1, &interface));
    output.extend(pcapng_block(6, &packet));
    std::fs::write(path, output).expect("write capture");
}

fn sample_capture(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("knx.pcapng");
    write_capture(&path);
    path
}

#[test]
fn version_reports_build_metadata() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("layerforge"));
}

#[test]
fn build_prints_hex() {
    cmd()
        .args(["build", "DESCRIPTION REQUEST"])
        .assert()
        .success()
        .stdout(format!("{DESCRIPTION_REQUEST_HEX}\n"));
}

#[test]
fn build_accepts_codes_and_assignments() {
    cmd()
        .args(["build", "0x0203", "--set", "port=60000", "--raw", "ip_address=c0a8012a"])
        .assert()
        .success()
        .stdout("06100203000e0801c0a8012aea60\n");
}

#[test]
fn build_applies_set_and_raw_in_given_order() {
    cmd()
        .args([
            "build",
            "DESCRIPTION_REQUEST",
            "--raw",
            "ip_address=c0a8012a",
            "--set",
            "ip_address=10.0.0.1",
        ])
        .assert()
        .success()
        .stdout("06100203000e08010a0000010000\n");

    cmd()
        .args([
            "build",
            "DESCRIPTION_REQUEST",
            "--set",
            "ip_address=10.0.0.1",
            "--raw",
            "ip_address=c0a8012a",
        ])
        .assert()
        .success()
        .stdout("06100203000e0801c0a8012a0000\n");
}

#[test]
fn build_json_lists_layers() {
    let assert = cmd()
        .args([
            "build",
            "TUNNELING_REQUEST",
            "--cemi",
            "L_Data.req",
            "--set",
            "data=4",
            "--set",
            "destination_address=1/2/3",
            "--format",
            "json",
        ])
        .assert()
        .success();
    let json = stdout_json(assert);
    assert_eq!(json["type"], "TUNNELING_REQUEST");
    assert_eq!(json["summary"], "KNXnet/IP / TUNNELING_REQUEST");
    assert_eq!(json["length"], json["bytes"].as_str().unwrap().len() / 2);
}

#[test]
fn build_unknown_service_shows_hint() {
    cmd()
        .args(["build", "NUL"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("error:").and(contains("hint:")).and(contains("layerforge types")));
}

#[test]
fn build_cemi_on_wrong_service_fails() {
    cmd()
        .args(["build", "DESCRIPTION_RESPONSE", "--cemi", "PropRead.con"])
        .assert()
        .failure()
        .stderr(contains("cEMI"));
}

#[test]
fn build_rejects_malformed_assignment() {
    cmd()
        .args(["build", "SEARCH_REQUEST", "--set", "port"])
        .assert()
        .failure()
        .stderr(contains("NAME=VALUE"));
}

#[test]
fn build_unencodable_value_fails() {
    cmd()
        .args(["build", "DESCRIPTION_REQUEST", "--set", "ip_address=hi mark!"])
        .assert()
        .failure()
        .stderr(contains("ip_address"));
}

#[test]
fn decode_outputs_json() {
    let assert = cmd()
        .args(["decode", DESCRIPTION_REQUEST_HEX])
        .assert()
        .success();
    let json = stdout_json(assert);
    assert_eq!(json["type"], "DESCRIPTION_REQUEST");
    assert_eq!(json["bytes"], DESCRIPTION_REQUEST_HEX);
    assert_eq!(json["layers"]["fields"]["service_identifier"], 0x0203);
}

#[test]
fn decode_rejects_bad_hex() {
    cmd()
        .args(["decode", "0610f"])
        .assert()
        .failure()
        .stderr(contains("invalid hex"));
}

#[test]
fn types_lists_services_and_cemi() {
    cmd()
        .arg("types")
        .assert()
        .success()
        .stdout(contains("0x0203  DESCRIPTION_REQUEST"));
    cmd()
        .args(["types", "cemi"])
        .assert()
        .success()
        .stdout(contains("0x0011  L_Data.req"));
}

#[test]
fn inspect_missing_input_shows_error_and_hint() {
    let temp = TempDir::new().expect("tempdir");
    let missing = temp.path().join("missing.pcapng");
    let report = temp.path().join("report.json");

    cmd()
        .arg("inspect")
        .arg(missing)
        .arg("-o")
        .arg(report)
        .assert()
        .failure()
        .stderr(contains("error:").and(contains("hint:")));
}

#[test]
fn inspect_stdout_outputs_report() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let assert = cmd().arg("inspect").arg(input).arg("--stdout").assert().success();
    let json = stdout_json(assert);
    assert_eq!(json["report_version"], 1);
    assert_eq!(json["frames"][0]["service"], "SEARCH_REQUEST");
    assert_eq!(json["service_counts"][0]["count"], 1);
}

#[test]
fn inspect_other_port_finds_nothing() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let assert = cmd()
        .arg("inspect")
        .arg(input)
        .args(["--stdout", "--port", "5353"])
        .assert()
        .success();
    let json = stdout_json(assert);
    assert_eq!(json["frames"].as_array().map(Vec::len), Some(0));
}

#[test]
fn inspect_stdout_and_report_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let report = temp.path().join("report.json");

    cmd()
        .arg("inspect")
        .arg(input)
        .arg("--stdout")
        .arg("-o")
        .arg(report)
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn inspect_writes_report_file() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let report = temp.path().join("out").join("report.json");

    cmd()
        .arg("inspect")
        .arg(input)
        .arg("-o")
        .arg(&report)
        .arg("--pretty")
        .assert()
        .success()
        .stderr(contains("OK: report written"));
    let written = std::fs::read_to_string(&report).expect("report written");
    let json: Value = serde_json::from_str(&written).expect("valid json");
    assert_eq!(json["capture_summary"]["datagrams"], 1);
}

#[test]
fn inspect_quiet_suppresses_ok_message() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let report = temp.path().join("report.json");

    cmd()
        .arg("inspect")
        .arg(input)
        .arg("-o")
        .arg(report)
        .arg("--quiet")
        .assert()
        .success()
        .stderr(contains("OK:").not());
}

#[test]
fn inspect_refuses_to_overwrite_input() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("inspect")
        .arg(&input)
        .arg("-o")
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("must differ from input"));
}

#[test]
fn inspect_glob_matching_one_file() {
    let temp = TempDir::new().expect("tempdir");
    sample_capture(&temp);
    let pattern = temp.path().join("*.pcapng");

    cmd()
        .arg("inspect")
        .arg(pattern)
        .arg("--stdout")
        .assert()
        .success();
}

#[test]
fn inspect_glob_matching_several_files() {
    let temp = TempDir::new().expect("tempdir");
    write_capture(&temp.path().join("a.pcapng"));
    write_capture(&temp.path().join("b.pcapng"));
    let pattern = temp.path().join("*.pcapng");

    cmd()
        .arg("inspect")
        .arg(pattern)
        .arg("--stdout")
        .assert()
        .failure()
        .stderr(contains("multiple files match"));
}

#[test]
fn inspect_rejects_unknown_extension() {
    let temp = TempDir::new().expect("tempdir");
    let input = temp.path().join("capture.txt");
    std::fs::write(&input, b"not a capture").expect("write input");

    cmd()
        .arg("inspect")
        .arg(input)
        .arg("--stdout")
        .assert()
        .failure()
        .stderr(contains("unsupported input format"));
}
