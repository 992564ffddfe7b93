#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use promfile_core::text::HelpPolicy;
use promfile_exporter::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
store:
  path: "/tmp/metrics.prom"
  pathh: "/tmp/typo.prom" # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG_ERROR");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.exporter.listen, "127.0.0.1:9464");
    assert!(cfg.store.is_none());
}

#[test]
fn ok_full_config() {
    let ok = r#"
version: 1
exporter:
  listen: "0.0.0.0:9100"
store:
  path: "/var/lib/app/metrics.prom"
  help: omit_empty
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.exporter.listen_addr().unwrap().port(), 9100);
    let store = cfg.store_config();
    assert_eq!(store.path.to_str(), Some("/var/lib/app/metrics.prom"));
    assert_eq!(store.help, HelpPolicy::OmitEmpty);
}

#[test]
fn rejects_bad_values() {
    let wrong_version = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(wrong_version.code().as_str(), "CONFIG_ERROR");

    let bad_listen = "version: 1\nexporter:\n  listen: \"not-an-addr\"\n";
    assert!(config::load_from_str(bad_listen).is_err());

    let bad_policy = "version: 1\nstore:\n  help: sometimes\n";
    assert!(config::load_from_str(bad_policy).is_err());
}
