use siteops::config::Config;

// Single test so the env mutations can't race each other.
#[test]
fn config_from_env() {
    std::env::remove_var("SITEOPS_DB");
    std::env::remove_var("ANTHROPIC_API_KEY");

    // database path is required
    assert!(Config::from_env().is_err());

    std::env::set_var("SITEOPS_DB", "/tmp/siteops-test.db");
    let config = Config::from_env().unwrap();
    assert_eq!(config.database_path, "/tmp/siteops-test.db");
    assert!(config.anthropic_api_key.is_none());
    assert!(!config.log_level.is_empty());

    // the analysis key is optional, and empty counts as unset
    std::env::set_var("ANTHROPIC_API_KEY", "");
    assert!(Config::from_env().unwrap().anthropic_api_key.is_none());

    std::env::set_var("ANTHROPIC_API_KEY", "sk-test-key");
    assert!(Config::from_env().unwrap().anthropic_api_key.is_some());

    std::env::remove_var("SITEOPS_DB");
    std::env::remove_var("ANTHROPIC_API_KEY");
}
