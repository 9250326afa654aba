use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "farm_cli=warn";
const VERBOSE_FILTER: &str = "farm_cli=debug,info";

/// Logs go to stderr so stdout stays reserved for command output.
/// `RUST_LOG` wins over the verbosity flag when set.
pub fn init_cli_logger(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_verbose_flag_raises_crate_level() {
        assert_eq!(default_directive(false), "farm_cli=warn");
        assert_eq!(default_directive(true), "farm_cli=debug,info");
    }

    #[test]
    fn logging_init_is_safe_to_repeat() {
        init_cli_logger(false);
        init_cli_logger(true);
    }
}
