use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert_eq!(settings.logging.format, LogFormat::Compact);
    assert_eq!(settings.cache.ttl, Duration::from_secs(604_800));
    assert_eq!(settings.cache.pool_capacity.get(), 10_000);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.cache.ttl_seconds = Some(3600);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        cache_ttl_seconds: Some(86_400),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.cache.ttl, Duration::from_secs(86_400));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.format, LogFormat::Json);
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(err, LoadError::Invalid { key: "cache.ttl_seconds", .. }));

    let mut raw = RawSettings::default();
    raw.cache.pool_capacity = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero capacity");
    assert!(matches!(err, LoadError::Invalid { key: "cache.pool_capacity", .. }));

    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn unparsable_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());
    let err = Settings::from_raw(raw).expect_err("bad level");
    assert!(matches!(err, LoadError::Invalid { key: "logging.level", .. }));

    let mut raw = RawSettings::default();
    raw.server.host = Some("not a host".to_string());
    let err = Settings::from_raw(raw).expect_err("bad host");
    assert!(matches!(err, LoadError::Invalid { key: "server.addr", .. }));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["stepform"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "stepform",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--cache-ttl-seconds",
        "60",
        "--log-json",
        "true",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.cache_ttl_seconds, Some(60));
            assert_eq!(serve.overrides.log_json, Some(true));
        }
        Command::Forms => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_forms_command() {
    let args = CliArgs::parse_from(["stepform", "--config-file", "/etc/stepform.toml", "forms"]);
    assert!(matches!(args.command, Some(Command::Forms)));
    assert_eq!(
        args.config_file.as_deref(),
        Some(std::path::Path::new("/etc/stepform.toml"))
    );
}

#[test]
fn load_reads_an_explicit_config_file() {
    let dir = std::env::temp_dir().join(format!("stepform-config-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("custom.toml");
    std::fs::write(
        &path,
        "[server]\nport = 8181\n\n[cache]\nttl_seconds = 120\npool_capacity = 5\n",
    )
    .expect("config written");

    let args = CliArgs::parse_from([
        "stepform",
        "--config-file",
        path.to_str().expect("utf-8 path"),
        "serve",
        "--server-port",
        "9191",
    ]);
    let settings = load(&args).expect("settings loaded");

    assert_eq!(settings.server.addr.port(), 9191);
    assert_eq!(settings.cache.ttl, Duration::from_secs(120));
    assert_eq!(settings.cache.pool_capacity.get(), 5);

    std::fs::remove_dir_all(&dir).expect("temp dir removed");
}
