// wrfrs/tests/config_store.rs

use serde_yaml::Value;
use wrfrs::config::{ConfigError, ConfigStore};

const CONF_FILE: &str = "
### COMMENT ###
string : /home/data/
int : 10
list : 1, 2, 3
list2 : 2*3
mixed : 2*3, 4
mixed2 : 2*3, text
rank1:
    rank2.1 : 1
    rank2.2 : 2
";

const CONF_EVAL: &str = "
sum : eval( 3 + 4 )
div : eval( 8. / 2 )
prod : eval( 3 * 4 )
sub : eval(1-2)
noeval : 1-2
";

const CONF_EVAL_BUG: &str = "
sum : eval( '3 + 4 )
";

fn write_conf(dir: &std::path::Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_values() {
    let config: ConfigStore = CONF_FILE.parse().unwrap();
    assert_eq!(config.lookup_or("string", String::new()), "/home/data/");
    assert_eq!(config.lookup_or("int", 0i64), 10);
    assert_eq!(config.lookup_or("list", Vec::<i64>::new()), vec![1, 2, 3]);
    assert_eq!(config.lookup_or("list2", Vec::<i64>::new()), vec![3, 3]);
    assert_eq!(config.lookup_or("mixed", Vec::<i64>::new()), vec![3, 3, 4]);

    let mixed2 = config.lookup("mixed2").unwrap();
    let items = mixed2.as_sequence().unwrap();
    assert_eq!(items[0], Value::from(3i64));
    assert_eq!(items[1], Value::from(3i64));
    assert_eq!(items[2], Value::from("text"));
}

#[test]
fn test_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(dir.path(), "conf.yaml", CONF_FILE);
    let config = ConfigStore::from_path(&path).unwrap();
    assert_eq!(config.lookup_or("string", String::new()), "/home/data/");
    assert_eq!(config.origin(), Some(path.as_path()));
}

#[test]
fn test_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(dir.path(), "conf.txt", CONF_FILE);
    assert!(matches!(
        ConfigStore::from_path(&path),
        Err(ConfigError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        ConfigStore::from_path("does/not/exist.yaml"),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn test_environ() {
    std::env::set_var("WRFRS_TEST_HOME", "/x");
    let config: ConfigStore = "
home : ${WRFRS_TEST_HOME}
missing : ${WRFRS_TEST_NOT_SET}
"
    .parse()
    .unwrap();
    assert_eq!(config.lookup_or("home", String::new()), "/x");
    // unmatched placeholders stay in place
    assert_eq!(
        config.lookup_or("missing", String::new()),
        "${WRFRS_TEST_NOT_SET}"
    );
}

#[test]
fn test_nested() {
    let config: ConfigStore = CONF_FILE.parse().unwrap();
    assert_eq!(config.lookup_or("rank1/rank2.1", 0i64), 1);
    assert_eq!(config.lookup_or("rank1/rank2.2", 0i64), 2);
}

#[test]
fn test_set() {
    let mut config: ConfigStore = CONF_FILE.parse().unwrap();
    assert!(matches!(
        config.lookup("new"),
        Err(ConfigError::KeyNotFound(_))
    ));
    assert_eq!(config.lookup_or("new", 0i64), 0);
    assert!(!config.contains("new"));

    config.set("new", 1i64).unwrap();
    assert!(config.contains("new"));
    assert_eq!(config.lookup_or("new", 0i64), 1);
    // a textual default forces the stored number to text
    assert_eq!(config.lookup_or("new", String::new()), "1");
}

#[test]
fn test_update_default() {
    let mut config: ConfigStore = CONF_FILE.parse().unwrap();
    config.set_default("int", 20i64).unwrap();
    config.set_default("new", "new").unwrap();
    assert_eq!(config.lookup_or("int", 0i64), 10);
    assert_eq!(config.lookup_or("new", String::new()), "new");
}

#[test]
fn test_include() {
    let dir1 = tempfile::tempdir().unwrap();
    let dir2 = tempfile::tempdir().unwrap();
    let called = write_conf(
        dir2.path(),
        "conf2.yaml",
        "
existing : 2
imported : 3
map : {2: \"b\"}
",
    );
    std::env::set_var("WRFRS_TEST_CALLED", &called);
    let parent = write_conf(
        dir1.path(),
        "conf1.yaml",
        "
include : ${WRFRS_TEST_CALLED}
existing : 1
new : 4
imp : \"%(imported)\"
map : {1: \"a\"}
",
    );

    let config = ConfigStore::from_path(&parent).unwrap();
    assert_eq!(config.lookup_or("existing", 0i64), 1); // the including file wins
    assert_eq!(config.lookup_or("imported", 0i64), 3);
    assert_eq!(config.lookup_or("new", 0i64), 4);
    assert_eq!(config.lookup_or("imp", 0i64), 3); // back-reference into the include

    // nested mappings merge key by key
    let map = config.lookup("map").unwrap();
    assert_eq!(map.as_mapping().unwrap().len(), 2);
}

#[test]
fn test_eval() {
    let config: ConfigStore = CONF_EVAL.parse().unwrap();
    assert_eq!(config.lookup_or("sum", 0i64), 7);
    assert_eq!(config.lookup_or("div", 0.0), 4.0);
    assert_eq!(config.lookup_or("prod", 0i64), 12);
    assert_eq!(config.lookup_or("sub", 0i64), -1);
    assert_eq!(config.lookup_or("noeval", String::new()), "1-2");
}

#[test]
fn test_eval_bug() {
    match CONF_EVAL_BUG.parse::<ConfigStore>() {
        Err(ConfigError::Expression(text)) => assert!(text.contains("3 + 4")),
        other => panic!("expected an expression error, got {:?}", other.map(|_| ())),
    }
}
