use tracing_subscriber::EnvFilter;

/// Set up tracing output on stderr, keeping stdout clean for the prompt
/// loop. `RUST_LOG` wins over the verbosity flags when set.
pub fn setup_logging(verbose_level: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let filter_str = match verbose_level {
            0 => "warn,agent_console=info,agent_client=info",
            1 => "info,agent_console=debug,agent_client=debug",
            _ => "debug,agent_console=trace,agent_client=trace",
        };
        EnvFilter::new(filter_str)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();
}
