use surge_common::{
    CommandConfig, Config, ConfigError, LogFormat, SweepConfig, ThroughputBasis,
};

#[test]
fn empty_document_yields_stock_sweep() {
    let config = Config::from_yaml_str("").unwrap();

    assert_eq!(config.sweep.volumes.len(), 19);
    assert_eq!(config.sweep.volumes.first(), Some(&100));
    assert_eq!(config.sweep.volumes.last(), Some(&1000));
    assert!(config.sweep.volumes.windows(2).all(|w| w[1] - w[0] == 50));
    assert_eq!(config.sweep.concurrency_levels, vec![5, 10, 50, 100]);
    assert_eq!(config.sweep.exchange_timeout_ms, None);
    assert_eq!(config.sweep.throughput_basis, ThroughputBasis::Configured);
    assert!(!config.metrics.enabled);
}

#[test]
fn default_commands_render_reference_payloads() {
    let sweep = SweepConfig::default();
    let payloads: Vec<String> = sweep.commands.iter().map(|c| c.payload()).collect();
    assert_eq!(payloads, vec!["SEND jae;joe;hahaman", "CACHE jae;joe;hahafool"]);
    assert_eq!(sweep.commands[0].name, "send");
    assert_eq!(sweep.commands[1].name, "cache");
}

#[test]
fn partial_document_overrides_only_named_fields() {
    let yaml = r#"
target:
  host: "10.0.0.7"
  port: 9000
sweep:
  volumes: [100, 200]
  concurrency_levels: [1, 4]
  exchange_timeout_ms: 250
  throughput_basis: completed
"#;
    let config = Config::from_yaml_str(yaml).unwrap();

    assert_eq!(config.target.host, "10.0.0.7");
    assert_eq!(config.target.port, 9000);
    assert_eq!(config.sweep.volumes, vec![100, 200]);
    assert_eq!(config.sweep.concurrency_levels, vec![1, 4]);
    assert_eq!(config.sweep.exchange_timeout_ms, Some(250));
    assert_eq!(config.sweep.throughput_basis, ThroughputBasis::Completed);
    // untouched sections keep their defaults
    assert_eq!(config.sweep.commands.len(), 2);
    assert_eq!(
        config.output.results_path.as_deref(),
        Some("results/concurrent.yaml")
    );
}

#[test]
fn custom_commands_parse() {
    let yaml = r#"
sweep:
  commands:
    - name: ping
      command: PING
"#;
    let config = Config::from_yaml_str(yaml).unwrap();
    assert_eq!(config.sweep.commands, vec![CommandConfig::new("ping", "PING", &[])]);
    assert_eq!(config.sweep.commands[0].payload(), "PING ");
}

#[test]
fn rejects_invalid_sweep_parameters() {
    let cases = [
        ("sweep: { volumes: [] }", "EmptyVolumes"),
        ("sweep: { concurrency_levels: [] }", "EmptyConcurrency"),
        ("sweep: { volumes: [0, 100] }", "ZeroVolume"),
        ("sweep: { concurrency_levels: [0] }", "ZeroConcurrency"),
        ("sweep: { volumes: [100, 100] }", "DuplicateVolume"),
        ("sweep: { concurrency_levels: [5, 5] }", "DuplicateConcurrency"),
        ("sweep: { commands: [] }", "NoCommands"),
    ];

    for (yaml, expected) in cases {
        let err = Config::from_yaml_str(yaml).unwrap_err();
        let matched = match err {
            ConfigError::EmptyVolumes => expected == "EmptyVolumes",
            ConfigError::EmptyConcurrency => expected == "EmptyConcurrency",
            ConfigError::ZeroVolume => expected == "ZeroVolume",
            ConfigError::ZeroConcurrency => expected == "ZeroConcurrency",
            ConfigError::DuplicateVolume(100) => expected == "DuplicateVolume",
            ConfigError::DuplicateConcurrency(5) => expected == "DuplicateConcurrency",
            ConfigError::NoCommands => expected == "NoCommands",
            _ => false,
        };
        assert!(matched, "{} should fail with {}", yaml, expected);
    }
}

#[test]
fn rejects_malformed_commands() {
    let mut sweep = SweepConfig::default();
    sweep.commands = vec![
        CommandConfig::new("a", "SEND", &["x"]),
        CommandConfig::new("a", "CACHE", &["y"]),
    ];
    assert!(matches!(
        sweep.validate(),
        Err(ConfigError::DuplicateCommand(name)) if name == "a"
    ));

    sweep.commands = vec![CommandConfig::new("bad", "SE ND", &["x"])];
    assert!(matches!(
        sweep.validate(),
        Err(ConfigError::InvalidCommandWord { .. })
    ));

    sweep.commands = vec![CommandConfig::new("bad", "SEND", &["x;y"])];
    assert!(matches!(
        sweep.validate(),
        Err(ConfigError::InvalidArgument { arg, .. }) if arg == "x;y"
    ));
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let err = Config::from_yaml_str("sweep: { volumes: [one] }").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = Config::load("/definitely/not/here/surge.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn rejects_zero_exchange_timeout() {
    let err = Config::from_yaml_str("sweep: { exchange_timeout_ms: 0 }").unwrap_err();
    assert!(matches!(err, ConfigError::ZeroTimeout));

    let mut sweep = SweepConfig::default();
    sweep.exchange_timeout_ms = Some(0);
    assert!(matches!(sweep.validate(), Err(ConfigError::ZeroTimeout)));

    sweep.exchange_timeout_ms = Some(1);
    assert!(sweep.validate().is_ok());
}

#[test]
fn logging_section_defaults_to_json_at_info() {
    let config = Config::from_yaml_str("").unwrap();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Json);

    let config =
        Config::from_yaml_str("logging: { level: \"surge_bench=debug\", format: text }").unwrap();
    assert_eq!(config.logging.level, "surge_bench=debug");
    assert_eq!(config.logging.format, LogFormat::Text);
}
