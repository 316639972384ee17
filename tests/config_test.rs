use incgraph::config::*;
use tempfile::TempDir;

#[test]
fn test_default_config_has_script_patterns() {
    let config = IndexConfig::default();
    assert!(config.include.iter().any(|p| p == "**/*.ts"));
    assert!(config.include.iter().any(|p| p == "**/*.jsx"));
    assert!(config.exclude.iter().any(|p| p == "node_modules/**"));
    assert_eq!(config.max_file_size, 1_048_576);
}

#[test]
fn test_load_config_defaults_when_missing() {
    let dir = TempDir::new().unwrap();
    let config = load_config(dir.path()).unwrap();
    assert_eq!(config.root_dir, dir.path().to_string_lossy());
    assert_eq!(config.include, IndexConfig::default().include);
}

#[test]
fn test_save_and_load_config() {
    let dir = TempDir::new().unwrap();
    let config = IndexConfig {
        max_file_size: 4096,
        exclude: vec!["generated/**".to_string()],
        ..IndexConfig::default()
    };
    save_config(dir.path(), &config).unwrap();
    assert!(get_config_path(dir.path()).exists());
    assert!(!get_config_path(dir.path()).with_extension("tmp").exists());

    let loaded = load_config(dir.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_config_fills_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(get_incgraph_dir(dir.path())).unwrap();
    std::fs::write(get_config_path(dir.path()), r#"{"max_file_size": 10}"#).unwrap();

    let loaded = load_config(dir.path()).unwrap();
    assert_eq!(loaded.max_file_size, 10);
    assert_eq!(loaded.include, IndexConfig::default().include);
}

#[test]
fn test_invalid_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(get_incgraph_dir(dir.path())).unwrap();
    std::fs::write(get_config_path(dir.path()), "{ not json").unwrap();
    assert!(load_config(dir.path()).is_err());
}

#[test]
fn test_should_include_file() {
    let config = IndexConfig::default();
    assert!(should_include_file("src/main.ts", &config));
    assert!(should_include_file("index.js", &config));
    assert!(should_include_file("src/App.tsx", &config));
    assert!(!should_include_file("README.md", &config));
    assert!(!should_include_file("node_modules/react/index.js", &config));
    assert!(!should_include_file("packages/app/node_modules/x/index.js", &config));
    assert!(!should_include_file("dist/bundle.js", &config));
    assert!(!should_include_file("public/vendor.min.js", &config));
}

#[test]
fn test_incgraph_dir_location() {
    let dir = TempDir::new().unwrap();
    let settings = get_incgraph_dir(dir.path());
    assert!(settings.ends_with(".incgraph"));
    assert!(get_config_path(dir.path()).ends_with(".incgraph/config.json"));
}
