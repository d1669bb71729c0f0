use super::format::format_value;
use super::init::InferredType;
use super::*;
use crate::Error;
use std::path::PathBuf;

fn table(text: &str) -> toml::Table {
    toml::from_str(text).unwrap()
}

fn structural() -> Params {
    let mut params = Params::new(ParamsKind::Structural);
    params.set("patid", "sub-01").unwrap();
    params.set("structid", "sub-01").unwrap();
    params.set("studydir", PathBuf::from("/data/sub-01")).unwrap();
    params.set("mprdirs", vec![PathBuf::from("study3")]).unwrap();
    params.set("t2wdirs", Vec::<PathBuf>::new()).unwrap();
    params.set("FSdir", PathBuf::from("/data/sub-01/fs7.2")).unwrap();
    params
        .set("PostFSdir", PathBuf::from("/data/sub-01/fs7.2/FREESURFER_fs_LR"))
        .unwrap();
    params
}

#[test]
fn test_instructions_defaults() {
    // TC-P-001: Defaults materialize from the schema
    let params = Params::new(ParamsKind::Instructions);

    assert_eq!(params.get_bool("bids"), Some(true));
    assert_eq!(params.get_int("num_cpus"), Some(8));
    assert_eq!(params.get_float("delta"), Some(0.00246));
    assert_eq!(params.get_str("inpath"), Some("$cwd"));
    assert_eq!(params.get_int("min_frames"), Some(50));
    assert!(!params.is_set("DVARthresh"));
    assert!(params.missing_required().is_empty());
}

#[test]
fn test_schema_keys_unique() {
    // TC-P-002: No schema declares a key twice
    for kind in [ParamsKind::Instructions, ParamsKind::Structural, ParamsKind::Functional] {
        let keys: Vec<_> = kind.metadata().iter().map(|m| m.key).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), keys.len(), "duplicate key in {:?}", kind);
    }
}

#[test]
fn test_every_default_matches_declared_kind() {
    // TC-P-003: Every non-sentinel default can be materialized as its kind
    for kind in [ParamsKind::Instructions, ParamsKind::Structural, ParamsKind::Functional] {
        for meta in kind.metadata() {
            match meta.default {
                ParamDefault::Required | ParamDefault::Unset => {}
                _ => assert!(
                    meta.default.to_value(meta.kind).is_some(),
                    "default of {} does not fit {}",
                    meta.key,
                    meta.kind
                ),
            }
        }
    }
}

#[test]
fn test_set_type_mismatch() {
    // TC-P-010: Wrong type is rejected and names the field
    let mut params = Params::new(ParamsKind::Instructions);
    let err = params.set("num_cpus", "four").unwrap_err();

    match err {
        Error::TypeMismatch { field, expected, found } => {
            assert_eq!(field, "num_cpus");
            assert_eq!(expected, "int");
            assert_eq!(found, "str");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(params.get_int("num_cpus"), Some(8));
}

#[test]
fn test_int_is_not_float() {
    // TC-P-011: No implicit int → float widening
    let mut params = Params::new(ParamsKind::Instructions);
    assert!(matches!(
        params.set("FDthresh", 1i64),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn test_validator_keeps_old_value() {
    // TC-P-012: Validator rejection leaves the previous value in place
    let mut params = Params::new(ParamsKind::Instructions);
    params.set("lomotil", 3i64).unwrap();

    let err = params.set("lomotil", 9i64).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { ref field, .. } if field == "lomotil"));
    assert_eq!(params.get_int("lomotil"), Some(3));
}

#[test]
fn test_str_coerces_to_path() {
    let mut params = Params::new(ParamsKind::Structural);
    params.set("studydir", "/data/sub-01").unwrap();
    assert_eq!(params.get_path("studydir"), Some(std::path::Path::new("/data/sub-01")));
}

#[test]
fn test_unknown_field() {
    let mut params = Params::new(ParamsKind::Instructions);
    assert!(matches!(
        params.set("not_a_field", 1i64),
        Err(Error::UnknownField { ref field }) if field == "not_a_field"
    ));
    assert!(params.get("not_a_field").is_none());
}

#[test]
fn test_unset_field_omitted() {
    // TC-P-020: Unset optional fields are not written
    let mut params = Params::new(ParamsKind::Instructions);
    let text = params.to_params_string().unwrap();
    assert!(!text.contains("DVARthresh"));

    params.set("DVARthresh", 0.0).unwrap();
    let text = params.to_params_string().unwrap();
    assert!(text.contains("set DVARthresh = 0.0\n"));

    params.unset("DVARthresh").unwrap();
    assert!(!params.to_params_string().unwrap().contains("DVARthresh"));
}

#[test]
fn test_params_lines_follow_declaration_order() {
    let text = Params::new(ParamsKind::Instructions).to_params_string().unwrap();
    let keys: Vec<&str> = text
        .lines()
        .map(|l| l.trim_start_matches("set ").split(" = ").next().unwrap())
        .collect();
    assert_eq!(keys.first(), Some(&"bids"));
    assert_eq!(keys.last(), Some(&"ROIimg"));
    assert!(text.starts_with("set bids = 1\nset cleanup = 0\n"));
}

#[test]
fn test_format_values() {
    // TC-P-021: Shell formatting per kind
    assert_eq!(format_value(&ParamValue::Bool(true)), "1");
    assert_eq!(format_value(&ParamValue::Bool(false)), "0");
    assert_eq!(format_value(&ParamValue::Float(10.0)), "10.0");
    assert_eq!(format_value(&ParamValue::Float(0.00246)), "0.00246");
    assert_eq!(format_value(&ParamValue::Float(1.4701)), "1.4701");
    assert_eq!(
        format_value(&ParamValue::StrList(vec!["-bl0.005".into(), "-ol2".into()])),
        "( -bl0.005 -ol2 )"
    );
    assert_eq!(
        format_value(&ParamValue::StrGroups(vec![
            vec!["study5".into(), "study6".into()],
            vec!["study9".into()]
        ])),
        "( study5,study6 study9 )"
    );
}

#[test]
fn test_float_exponent_format() {
    assert_eq!(format_value(&ParamValue::Float(1e-5)), "1e-05");
    assert_eq!(format_value(&ParamValue::Float(2.5e-7)), "2.5e-07");
    assert_eq!(format_value(&ParamValue::Float(1e16)), "1e+16");
    assert_eq!(format_value(&ParamValue::Float(1.5e300)), "1.5e+300");
    assert_eq!(format_value(&ParamValue::Float(0.0001)), "0.0001");
    assert_eq!(format_value(&ParamValue::Float(-3e-6)), "-3e-06");

    let mut params = Params::new(ParamsKind::Instructions);
    params.set("FDthresh", 1e-5).unwrap();
    let text = params.to_params_string().unwrap();
    assert!(text.contains("set FDthresh = 1e-05\n"));
    let parsed = Params::parse_params(ParamsKind::Instructions, &text).unwrap();
    assert_eq!(parsed.get_float("FDthresh"), Some(1e-5));
}

#[test]
fn test_empty_list_format() {
    assert_eq!(format_value(&ParamValue::IntList(vec![])), "(  )");
    assert_eq!(format_value(&ParamValue::PathList(vec![])), "(  )");
}

#[test]
fn test_int_groups_round_trip() {
    // TC-P-022: [[1,2],[3]] ↔ "( 1,2 3 )"
    let value = ParamValue::IntGroups(vec![vec![1, 2], vec![3]]);
    assert_eq!(format_value(&value), "( 1,2 3 )");

    let mut params = Params::new(ParamsKind::Functional);
    params.set("day1_patid", "ses-1").unwrap();
    params.set("day1_path", "/out/sub-01/ses-1/atlas").unwrap();
    params.set("patid", "ses-1").unwrap();
    params.set("mpr", "sub-01_T1w").unwrap();
    params.set("t2wimg", "sub-01_T2w").unwrap();
    params.set("BOLDgrps", vec![vec![1i64, 2], vec![3]]).unwrap();
    params.set("runID", vec![1i64, 2, 3]).unwrap();
    params.set("FCrunID", vec![1i64, 2]).unwrap();
    params
        .set(
            "sefm",
            vec![vec!["study5".to_string(), "study6".to_string()]],
        )
        .unwrap();
    params.set("FSdir", "/out/fs").unwrap();
    params.set("PostFSdir", "/out/fs/FREESURFER_fs_LR").unwrap();
    params.set("maskdir", "/out/subcortical_mask").unwrap();

    let text = params.to_params_string().unwrap();
    assert!(text.contains("set BOLDgrps = ( 1,2 3 )\n"));

    let parsed = Params::parse_params(ParamsKind::Functional, &text).unwrap();
    assert_eq!(parsed, params);
}

#[test]
fn test_missing_required_on_format() {
    // TC-P-023: Required fields block output until set
    let mut params = structural();
    params.unset("FSdir").unwrap();
    assert!(matches!(
        params.to_params_string(),
        Err(Error::MissingField { ref field }) if field == "FSdir"
    ));
}

#[test]
fn test_parse_params_syntax_error() {
    let err = Params::parse_params(ParamsKind::Instructions, "# header\n\nnum_cpus = 4\n")
        .unwrap_err();
    assert!(matches!(err, Error::ParamsSyntax { line: 3, .. }));

    let err = Params::parse_params(ParamsKind::Instructions, "set num_cpus = x\n").unwrap_err();
    assert!(matches!(err, Error::ParamsSyntax { line: 1, .. }));
}

#[test]
fn test_inferred_types() {
    let value: toml::Value = toml::Value::try_from(vec![vec![1i64, 2], vec![3]]).unwrap();
    assert_eq!(InferredType::of(&value).to_string(), "list[list[int]]");

    let empty = toml::Value::Array(vec![]);
    assert_eq!(InferredType::of(&empty).to_string(), "list");
    assert!(ParamKind::IntGroups.accepts(&InferredType::of(&empty)));
    assert!(ParamKind::PathList.accepts(&InferredType::of(&empty)));
}

#[test]
fn test_toml_type_mismatch_names_field() {
    // TC-P-030: A string where a float is declared is rejected at load
    let err = Params::from_toml_table(ParamsKind::Instructions, &table("DVARthresh = \"high\"\n"))
        .unwrap_err();

    match err {
        Error::TypeMismatch { field, expected, found } => {
            assert_eq!(field, "DVARthresh");
            assert_eq!(expected, "float");
            assert_eq!(found, "str");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_toml_mixed_list_rejected() {
    let err = Params::from_toml_table(
        ParamsKind::Instructions,
        &table("bpss_params = [\"-bl0.005\", 2]\n"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref field, .. } if field == "bpss_params"));
}

#[test]
fn test_toml_missing_required() {
    let err = Params::from_toml_table(ParamsKind::Structural, &table("patid = \"sub-01\"\n"))
        .unwrap_err();
    assert!(matches!(err, Error::MissingField { .. }));
}

#[test]
fn test_toml_unknown_key_skipped() {
    let params =
        Params::from_toml_table(ParamsKind::Instructions, &table("num_cpu = 4\nFDthresh = 0.2\n"))
            .unwrap();
    assert_eq!(params.get_float("FDthresh"), Some(0.2));
    assert_eq!(params.get_int("num_cpus"), Params::new(ParamsKind::Instructions).get_int("num_cpus"));
}

#[test]
fn test_merge_unknown_key_rejected() {
    let mut params = Params::new(ParamsKind::Instructions);
    let err = params.merge_table(&table("num_cpu = 4\n")).unwrap_err();
    assert!(matches!(err, Error::UnknownField { ref field } if field == "num_cpu"));
}

#[test]
fn test_toml_table_round_trip() {
    let params = structural();
    let restored = Params::from_toml_table(ParamsKind::Structural, &params.to_toml_table()).unwrap();
    assert_eq!(restored, params);
    assert_eq!(restored.get("t2wdirs"), Some(&ParamValue::PathList(vec![])));
}

#[test]
fn test_merge_table_is_atomic() {
    // TC-P-031: One bad key means no key is applied
    let mut params = Params::new(ParamsKind::Instructions);
    let err = params
        .merge_table(&table("num_cpus = 2\nFDthresh = \"low\"\n"))
        .unwrap_err();

    assert!(matches!(err, Error::TypeMismatch { ref field, .. } if field == "FDthresh"));
    assert_eq!(params.get_int("num_cpus"), Some(8));
    assert_eq!(params.get_float("FDthresh"), Some(0.08));
}

#[test]
fn test_merge_table_applies_overrides() {
    let mut params = Params::new(ParamsKind::Instructions);
    params
        .merge_table(&table("num_cpus = 2\nmedic = false\nDVARthresh = 4.5\n"))
        .unwrap();

    assert_eq!(params.get_int("num_cpus"), Some(2));
    assert_eq!(params.get_bool("medic"), Some(false));
    assert_eq!(params.get_float("DVARthresh"), Some(4.5));
    assert_eq!(params.get_int("skip"), Some(0));
}
