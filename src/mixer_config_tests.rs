use std::path::{Path, PathBuf};

use super::mixer_config::*;

fn parse(contents: &str) -> MixerConfig {
    MixerConfig::parse(Path::new("/srv/docker-compose-mixer.yml"), contents).unwrap()
}

#[test]
fn test_includes_keep_manifest_order() {
    let config = parse("includes:\n  zz_: z.yml\n  aa_: /abs/a.yml\n  mm_: ../m.yml\n");

    assert_eq!(
        config.get_includes(Path::new("/srv")),
        vec![
            ("zz_".to_string(), PathBuf::from("/srv/z.yml")),
            ("aa_".to_string(), PathBuf::from("/abs/a.yml")),
            ("mm_".to_string(), PathBuf::from("/srv/../m.yml")),
        ]
    );
    config.validate().unwrap();
}

#[test]
fn test_optional_sections() {
    let config = parse("includes:\n  web_: web.yml\n");

    assert!(config.get_ignores().is_empty());
    assert!(config.master_services.is_none());
    assert!(config.overrides.is_none());
}

#[test]
fn test_empty_manifest() {
    let config = parse("");

    assert!(config.includes.is_none());
    assert!(config.get_includes(Path::new("/srv")).is_empty());
}

#[test]
fn test_full_manifest() {
    let config = parse(
        r#"
includes:
  web_: web.yml
ignores: [web_db]
master_services:
  proxy:
    image: nginx
overrides:
  web_app:
    image: custom:latest
"#,
    );

    config.validate().unwrap();
    assert_eq!(config.get_ignores(), vec!["web_db".to_string()]);
    assert_eq!(config.master_services.unwrap().len(), 1);
}

#[test]
#[should_panic]
fn test_invalid_includes() {
    parse("includes: [web.yml]\n");
}

#[test]
#[should_panic]
fn test_invalid_empty_include_path() {
    parse("includes:\n  web_: ''\n").validate().unwrap()
}

#[test]
#[should_panic]
fn test_invalid_overrides() {
    parse("includes:\n  web_: web.yml\noverrides:\n  web_app: nginx\n")
        .validate()
        .unwrap()
}

#[test]
#[should_panic]
fn test_invalid_master_service() {
    parse("includes:\n  web_: web.yml\nmaster_services:\n  proxy: nginx\n")
        .validate()
        .unwrap()
}
