//! File-level tests for the params and TOML serializers

use mep_common::params::{Params, ParamsKind};
use mep_common::{Error, ParamValue};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_instructions_params_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("instructions.params");

    let mut params = Params::new(ParamsKind::Instructions);
    params.set("num_cpus", 16i64).unwrap();
    params.set("DVARthresh", 0.0).unwrap();
    params.set("medic", false).unwrap();
    params.save_params(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("set num_cpus = 16\n"));
    assert!(text.contains("set medic = 0\n"));
    assert!(text.contains("set DVARthresh = 0.0\n"));
    assert!(text.contains("set bpss_params = ( -bl0.005 -ol2 -bh0.1 -oh2 )\n"));
    assert!(text.contains("set DVARblur = 10.0\n"));

    let loaded = Params::load_params(ParamsKind::Instructions, &path).unwrap();
    assert_eq!(loaded, params);
}

#[test]
fn test_save_toml_adds_suffix() {
    let dir = TempDir::new().unwrap();
    let params = Params::new(ParamsKind::Instructions);

    let written = params.save_toml(&dir.path().join("instructions")).unwrap();
    assert_eq!(written, dir.path().join("instructions.toml"));
    assert!(written.exists());

    let same = params.save_toml(&dir.path().join("other.toml")).unwrap();
    assert_eq!(same, dir.path().join("other.toml"));
}

#[test]
fn test_toml_file_round_trip() {
    let dir = TempDir::new().unwrap();

    let mut params = Params::new(ParamsKind::Structural);
    params.set("patid", "sub-01").unwrap();
    params.set("structid", "sub-01").unwrap();
    params.set("studydir", "/data/sub-01").unwrap();
    params
        .set(
            "mprdirs",
            vec![PathBuf::from("ses-1/study3"), PathBuf::from("ses-2/study4")],
        )
        .unwrap();
    params.set("t2wdirs", vec![PathBuf::from("ses-1/study5")]).unwrap();
    params.set("FSdir", "/data/sub-01/fs7.2").unwrap();
    params.set("PostFSdir", "/data/sub-01/fs7.2/FREESURFER_fs_LR").unwrap();

    let path = params.save_toml(&dir.path().join("struct")).unwrap();
    let loaded = Params::load_toml(ParamsKind::Structural, &path).unwrap();
    assert_eq!(loaded, params);
}

#[test]
fn test_load_toml_type_mismatch() {
    // DVARthresh declared float, given as a string
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("instructions.toml");
    fs::write(&path, "DVARthresh = \"high\"\n").unwrap();

    let err = Params::load_toml(ParamsKind::Instructions, &path).unwrap_err();
    assert!(err.to_string().contains("DVARthresh"));
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[test]
fn test_load_toml_defaults_fill_gaps() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("instructions.toml");
    fs::write(&path, "num_cpus = 2\nbpss_params = []\n").unwrap();

    let params = Params::load_toml(ParamsKind::Instructions, &path).unwrap();
    assert_eq!(params.get_int("num_cpus"), Some(2));
    assert_eq!(params.get("bpss_params"), Some(&ParamValue::StrList(vec![])));
    assert_eq!(params.get_float("blur"), Some(1.4701));
    assert!(params
        .to_params_string()
        .unwrap()
        .contains("set bpss_params = (  )\n"));
}

#[test]
fn test_load_toml_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "num_cpus = = 2\n").unwrap();

    let err = Params::load_toml(ParamsKind::Instructions, &path).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
