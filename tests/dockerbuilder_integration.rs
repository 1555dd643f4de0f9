//! Covers the Docker-builder fixed-schema parser end to end: environment
//! expansion feeding into `only_if`, and the `platform` field's side effect
//! on the seeded `CIRRUS_OS` environment entry.

use cirrus_parse::boolevator::Boolevator;
use cirrus_parse::dockerbuilder::{enabled, parse_docker_builder, OsVersion, Platform};
use cirrus_parse::node::parse_node;

#[test]
fn windows_platform_with_os_version_and_expanded_only_if() {
    let env = vec![("RUN_BUILDER".to_string(), "true".to_string())];
    let node = parse_node(
        "alias: windows-build\nplatform: windows\nos_version: \"2019\"\nonly_if: ${RUN_BUILDER}\n",
    )
    .unwrap();
    let builder = parse_docker_builder(&node, &env).unwrap();

    assert_eq!(builder.alias.as_deref(), Some("windows-build"));
    assert_eq!(builder.platform, Some(Platform::Windows));
    assert_eq!(builder.os_version, Some(OsVersion::V2019));
    assert!(builder.environment.contains(&("CIRRUS_OS".to_string(), "windows".to_string())));
    assert!(enabled(&builder, &env, &Boolevator::new()).unwrap());
}

#[test]
fn only_if_false_disables_the_builder() {
    let node = parse_node("alias: skip-me\nonly_if: \"false\"\n").unwrap();
    let builder = parse_docker_builder(&node, &[]).unwrap();
    assert!(!enabled(&builder, &[], &Boolevator::new()).unwrap());
}

#[test]
fn depends_on_list_and_bad_os_version_is_rejected() {
    let good = parse_node("depends_on:\n  - build\n  - lint\nos_version: \"1709\"\n").unwrap();
    let builder = parse_docker_builder(&good, &[]).unwrap();
    assert_eq!(builder.depends_on, vec!["build".to_string(), "lint".to_string()]);
    assert_eq!(builder.os_version, Some(OsVersion::V1709));

    let bad = parse_node("os_version: \"2099\"\n").unwrap();
    assert!(parse_docker_builder(&bad, &[]).is_err());
}
