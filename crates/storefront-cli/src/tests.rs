use super::*;

#[test]
fn parses_db_ping_command() {
    let cli =
        Cli::try_parse_from(["storefront-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["storefront-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn seed_path_defaults_to_config() {
    let cli =
        Cli::try_parse_from(["storefront-cli", "db", "seed"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Seed { path: None }
        })
    ));
}

#[test]
fn seed_accepts_explicit_path() {
    let cli = Cli::try_parse_from([
        "storefront-cli",
        "db",
        "seed",
        "--path",
        "config/catalog.yaml",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Seed { path: Some(ref p) }
        }) if p == &PathBuf::from("config/catalog.yaml")
    ));
}

#[test]
fn parses_report_analytics_range() {
    let cli = Cli::try_parse_from([
        "storefront-cli",
        "report",
        "analytics",
        "--from",
        "2024-01-01",
        "--to",
        "2024-01-31",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Report {
            command: ReportCommands::Analytics {
                from: Some(ref from),
                to: Some(ref to),
            }
        }) if from == "2024-01-01" && to == "2024-01-31"
    ));
}

#[test]
fn parses_report_metrics() {
    let cli = Cli::try_parse_from(["storefront-cli", "report", "metrics"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Report {
            command: ReportCommands::Metrics
        })
    ));
}

#[test]
fn unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["storefront-cli", "db", "drop"]).is_err());
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["storefront-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn seed_path_prefers_explicit_argument() {
    let path = seed_path(
        Some(PathBuf::from("fixtures/demo.yaml")),
        Path::new("config/catalog.yaml"),
    );
    assert_eq!(path, PathBuf::from("fixtures/demo.yaml"));
}

#[test]
fn seed_path_falls_back_to_configured_file() {
    let path = seed_path(None, Path::new("config/catalog.yaml"));
    assert_eq!(path, PathBuf::from("config/catalog.yaml"));
}
