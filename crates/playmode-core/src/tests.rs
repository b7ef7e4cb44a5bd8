use chrono::NaiveDate;

use super::*;

const SAMPLE_MANIFEST: &str = r#"
{
  "PlayModes": [
    {
      "Name": "Standard",
      "MultiplayerCompatible": true,
      "OnlineVersion": { "DLC": "1.0.0", "MyDocuments": "1.0.0" },
      "Files": [],
      "Folders": []
    },
    {
      "Name": "EUI",
      "MultiplayerCompatible": false,
      "OnlineVersion": { "DLC": "2.0.0", "MyDocuments": "2.1.0" },
      "Files": ["MyDocuments/config.ini"],
      "Folders": ["DLC/UI_bc1", "MyDocuments\\ModUserData\\eui"],
      "DLCDownload": "https://example.test/eui/UI_bc1.zip?token=abc",
      "DocsDownload": ""
    }
  ],
  "Settings": { "BackupUserData": true, "CleanupOnModeSwitch": true }
}
"#;

#[test]
fn parse_manifest() {
    let manifest = ModeManifest::from_json_str(SAMPLE_MANIFEST).expect("manifest should parse");
    assert_eq!(manifest.play_modes.len(), 2);
    assert!(manifest.settings.backup_user_data);
    assert!(manifest.settings.cleanup_on_mode_switch);

    let standard = manifest.mode("Standard").expect("standard mode must exist");
    assert!(standard.multiplayer_compatible);
    assert!(standard.owned_paths.is_empty());
    assert_eq!(standard.download_url(LocationKind::Dlc), None);

    let eui = manifest.mode("EUI").expect("eui mode must exist");
    assert_eq!(eui.target_version(LocationKind::Dlc), "2.0.0");
    assert_eq!(eui.target_version(LocationKind::MyDocuments), "2.1.0");
    assert_eq!(
        eui.download_url(LocationKind::Dlc),
        Some("https://example.test/eui/UI_bc1.zip?token=abc")
    );
    assert_eq!(
        eui.download_url(LocationKind::MyDocuments),
        None,
        "empty download URLs are treated as absent"
    );
    assert_eq!(
        eui.owned_paths,
        vec![
            OwnedPath {
                location: LocationKind::MyDocuments,
                relative: "config.ini".to_string(),
                kind: OwnedPathKind::File,
            },
            OwnedPath {
                location: LocationKind::Dlc,
                relative: "UI_bc1".to_string(),
                kind: OwnedPathKind::Folder,
            },
            OwnedPath {
                location: LocationKind::MyDocuments,
                relative: "ModUserData/eui".to_string(),
                kind: OwnedPathKind::Folder,
            },
        ]
    );
    assert_eq!(eui.owned_paths_in(LocationKind::Dlc).count(), 1);
}

#[test]
fn manifest_settings_default_to_disabled() {
    let manifest = ModeManifest::from_json_str(
        r#"{"PlayModes":[{"Name":"Standard","OnlineVersion":{"DLC":"1","MyDocuments":"1"}}]}"#,
    )
    .expect("manifest without settings should parse");
    assert_eq!(manifest.settings, Settings::default());
    assert!(!manifest.play_modes[0].multiplayer_compatible);
}

#[test]
fn other_modes_excludes_selected() {
    let manifest = ModeManifest::from_json_str(SAMPLE_MANIFEST).expect("manifest should parse");
    let others = manifest
        .other_modes("EUI")
        .map(|mode| mode.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(others, vec!["Standard"]);
}

#[test]
fn manifest_rejects_duplicate_mode_names() {
    let err = ModeManifest::from_json_str(
        r#"{"PlayModes":[
            {"Name":"EUI","OnlineVersion":{"DLC":"1","MyDocuments":"1"}},
            {"Name":"EUI","OnlineVersion":{"DLC":"2","MyDocuments":"2"}}
        ]}"#,
    )
    .expect_err("duplicate names must fail");
    assert!(
        err.to_string().contains("duplicate play mode 'EUI'"),
        "unexpected error: {err}"
    );
}

#[test]
fn manifest_rejects_names_colliding_after_sanitizing() {
    let err = ModeManifest::from_json_str(
        r#"{"PlayModes":[
            {"Name":"Vox:Populi","OnlineVersion":{"DLC":"1","MyDocuments":"1"}},
            {"Name":"Vox?Populi","OnlineVersion":{"DLC":"1","MyDocuments":"1"}}
        ]}"#,
    )
    .expect_err("colliding safe names must fail");
    assert!(
        err.to_string().contains("collides with another mode"),
        "unexpected error: {err}"
    );
}

#[test]
fn manifest_rejects_owned_path_without_location_prefix() {
    let err = ModeManifest::from_json_str(
        r#"{"PlayModes":[{"Name":"EUI","OnlineVersion":{"DLC":"1","MyDocuments":"1"},
            "Files":["Assets/UI_bc1"]}]}"#,
    )
    .expect_err("unprefixed owned path must fail");
    assert!(
        format!("{err:#}").contains("must start with 'DLC/' or 'MyDocuments/'"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn manifest_rejects_owned_path_escaping_location_root() {
    let err = ModeManifest::from_json_str(
        r#"{"PlayModes":[{"Name":"EUI","OnlineVersion":{"DLC":"1","MyDocuments":"1"},
            "Folders":["DLC/../../Windows"]}]}"#,
    )
    .expect_err("parent traversal must fail");
    assert!(
        format!("{err:#}").contains("must not contain '..'"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn manifest_rejects_unsupported_download_archive() {
    let err = ModeManifest::from_json_str(
        r#"{"PlayModes":[{"Name":"EUI","OnlineVersion":{"DLC":"1","MyDocuments":"1"},
            "DLCDownload":"https://example.test/eui.rar"}]}"#,
    )
    .expect_err("rar downloads must fail");
    assert!(
        format!("{err:#}").contains("unsupported archive 'eui.rar'"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn manifest_rejects_version_unusable_as_directory() {
    let err = ModeManifest::from_json_str(
        r#"{"PlayModes":[{"Name":"EUI","OnlineVersion":{"DLC":"1/2","MyDocuments":"1"}}]}"#,
    )
    .expect_err("slash in version must fail");
    assert!(
        format!("{err:#}").contains("invalid DLC version"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn safe_name_replaces_illegal_characters() {
    assert_eq!(safe_name("Vox Populi"), "Vox Populi");
    assert_eq!(safe_name("EUI: Enhanced/UI?"), "EUI_ Enhanced_UI_");
    assert_eq!(safe_name("a<b>c\"d\\e|f*g"), "a_b_c_d_e_f_g");
    assert_eq!(safe_name("tab\there"), "tab_here");
    assert_eq!(safe_name("trailing. "), "trailing__");
    assert_eq!(safe_name(""), "_");
}

#[test]
fn split_manifest_path_routes_by_prefix() {
    assert_eq!(
        LocationKind::split_manifest_path("DLC/UI_bc1"),
        Some((LocationKind::Dlc, "UI_bc1"))
    );
    assert_eq!(
        LocationKind::split_manifest_path("mydocuments\\Saves\\single"),
        Some((LocationKind::MyDocuments, "Saves\\single"))
    );
    assert_eq!(LocationKind::split_manifest_path("Assets/DLC"), None);
    assert_eq!(LocationKind::split_manifest_path("DLC"), None);
}

#[test]
fn artifact_file_name_strips_query_and_fragment() {
    assert_eq!(
        artifact_file_name("https://example.test/mods/eui.zip?dl=1#top"),
        Some("eui.zip")
    );
    assert_eq!(artifact_file_name("https://example.test/"), None);
    assert_eq!(artifact_file_name("https://example.test"), None);
    assert_eq!(
        ArchiveType::infer_from_url("https://example.test/a/docs.tgz"),
        Some(ArchiveType::TarGz)
    );
    assert_eq!(
        ArchiveType::infer_from_url("https://example.test/a/docs.ZIP"),
        Some(ArchiveType::Zip)
    );
    assert_eq!(ArchiveType::infer_from_url("https://example.test/a/docs"), None);
}

#[test]
fn artifact_file_name_rejects_backslash_segments() {
    assert_eq!(
        artifact_file_name(r"https://example.test/a\..\..\x.zip"),
        None
    );

    let err = ModeManifest::from_json_str(
        r#"{"PlayModes":[{"Name":"EUI","OnlineVersion":{"DLC":"1","MyDocuments":"1"},
            "DocsDownload":"https://example.test/a\\..\\..\\x.zip"}]}"#,
    )
    .expect_err("backslash file names must fail");
    assert!(
        format!("{err:#}").contains("does not name a file"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn version_record_uses_game_json_shape() {
    let record = VersionRecord {
        mode: "EUI".to_string(),
        version: "2.0.0".to_string(),
        last_run: NaiveDate::from_ymd_opt(2024, 3, 9)
            .expect("valid date")
            .and_hms_opt(18, 5, 7)
            .expect("valid time"),
        location: LocationKind::MyDocuments,
    };

    let raw = record.to_json_string().expect("must serialize");
    assert!(raw.contains("\"Mode\": \"EUI\""));
    assert!(raw.contains("\"LastRun\": \"2024-03-09 18:05:07\""));
    assert!(raw.contains("\"Location\": \"MyDocuments\""));

    let parsed = VersionRecord::from_json_str(&raw).expect("must parse");
    assert_eq!(parsed, record);
}

#[test]
fn version_record_rejects_unknown_location() {
    let err = VersionRecord::from_json_str(
        r#"{"Mode":"EUI","Version":"1","LastRun":"2024-03-09 18:05:07","Location":"Desktop"}"#,
    )
    .expect_err("unknown location must fail");
    assert!(err.to_string().contains("failed to parse version record"));
}
