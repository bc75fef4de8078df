use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

use super::scopes_container::*;
use super::services_scope::ServicesScope;

fn scope(prefix: &str, source: &str, contents: &str) -> ServicesScope {
    ServicesScope::parse(prefix, PathBuf::from(source), contents).unwrap()
}

fn container() -> ScopesContainer {
    let mut c = ScopesContainer::new();
    c.add_scope(scope(
        "web_",
        "/srv/web/docker-compose.yml",
        "app:\n  build: .\n  ports: ['8080:80']\ndb:\n  ports: ['5432:5432']\n",
    ));
    c.add_scope(scope(
        "api_",
        "/srv/api/docker-compose.yml",
        "app:\n  ports: ['8080:80']\n",
    ));
    c
}

fn keys(result: &Mapping) -> Vec<&str> {
    result.keys().map(|k| k.as_str().unwrap()).collect()
}

#[test]
fn test_result_keeps_registration_order() {
    let mut c = container();
    c.resolve_names().unwrap();

    assert_eq!(keys(&c.get_result_scope()), vec!["web_app", "web_db", "api_app"]);
}

#[test]
fn test_add_scope_replaces_same_prefix() {
    let mut c = container();
    c.add_scope(scope("web_", "/srv/other.yml", "worker: {}\n"));

    assert_eq!(c.scopes().len(), 2);
    assert_eq!(c.scopes()[0].name, "web_");
    assert_eq!(c.scopes()[0].services[0].name, "worker");
}

#[test]
fn test_reset() {
    let mut c = container();
    c.set_ignored(vec!["web_db".to_string()]);

    c.reset();
    c.reset();

    assert!(c.scopes().is_empty());
    assert!(c.ignored_services().is_empty());
    assert!(c.get_result_scope().is_empty());
}

#[test]
fn test_ignored_services_are_excluded() {
    let mut c = container();
    c.set_ignored(vec!["web_db".to_string()]);
    c.resolve_names().unwrap();

    assert_eq!(keys(&c.get_result_scope()), vec!["web_app", "api_app"]);
}

#[test]
fn test_resolve_ports_across_scopes() {
    let mut c = container();
    c.resolve_names().unwrap();

    let redefinitions = c.resolve_ports(vec![]).unwrap();

    assert_eq!(redefinitions.len(), 1);
    assert_eq!(redefinitions["api_app"].get(&8080), Some(&8081));

    let result = c.get_result_scope();
    assert_eq!(
        result.get("api_app").unwrap().get("ports"),
        Some(&Value::Sequence(vec![Value::from("8081:80")]))
    );
    assert_eq!(
        result.get("web_app").unwrap().get("ports"),
        Some(&Value::Sequence(vec![Value::from("8080:80")]))
    );
}

#[test]
fn test_resolve_ports_around_reserved() {
    let mut c = container();
    c.resolve_names().unwrap();

    let redefinitions = c.resolve_ports(vec![8080]).unwrap();

    assert_eq!(redefinitions["web_app"].get(&8080), Some(&8081));
    assert_eq!(redefinitions["api_app"].get(&8080), Some(&8082));
    assert!(!redefinitions.contains_key("web_db"));

    let result = c.get_result_scope();
    assert_eq!(
        result.get("web_app").unwrap().get("ports"),
        Some(&Value::Sequence(vec![Value::from("8081:80")]))
    );
    assert_eq!(
        result.get("api_app").unwrap().get("ports"),
        Some(&Value::Sequence(vec![Value::from("8082:80")]))
    );
}

#[test]
fn test_resolve_ports_is_reproducible() {
    let mut first = container();
    let mut second = container();
    first.resolve_names().unwrap();
    second.resolve_names().unwrap();

    assert_eq!(first.resolve_ports(vec![]).unwrap(), second.resolve_ports(vec![]).unwrap());
    assert_eq!(first.get_result_scope(), second.get_result_scope());
}

#[test]
fn test_resolve_paths() {
    let mut c = container();
    c.resolve_paths(Path::new("/srv"));

    let result = c.get_result_scope();
    assert_eq!(
        result.get("web_app").unwrap().get("build"),
        Some(&Value::from("web"))
    );
}

#[test]
fn test_apply_overrides() {
    let mut c = container();
    c.resolve_names().unwrap();
    let overrides: Mapping = serde_yaml::from_str("api_app:\n  image: custom:latest\n").unwrap();

    c.apply_overrides(&overrides);

    let result = c.get_result_scope();
    assert_eq!(
        result.get("api_app").unwrap().get("image"),
        Some(&Value::from("custom:latest"))
    );
    assert_eq!(result.get("web_app").unwrap().get("image"), None);
}

#[test]
fn test_colliding_final_names_last_wins() {
    let mut c = ScopesContainer::new();
    c.add_scope(scope("a", "/srv/a.yml", "b_x:\n  image: first\n"));
    c.add_scope(scope("a_", "/srv/b.yml", "bx:\n  image: second\n"));
    c.add_scope(scope("ab_", "/srv/c.yml", "x:\n  image: third\n"));
    c.resolve_names().unwrap();

    let result = c.get_result_scope();
    assert_eq!(keys(&result), vec!["ab_x", "a_bx"]);
    assert_eq!(
        result.get("ab_x").unwrap().get("image"),
        Some(&Value::from("third"))
    );
}
