use crate::config::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_directives(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "ses_matching_backend=debug,tower_http=debug,reqwest=info,info",
        Environment::Staging => "ses_matching_backend=debug,tower_http=info,reqwest=warn,info",
        Environment::Prod => "ses_matching_backend=info,tower_http=info,reqwest=warn,warn",
    }
}

/// Install the global subscriber. Returns false when one was already set.
pub fn init_logging(env: &Environment) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(env)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    // JSON for log shipping in prod, pretty locally
    let installed = if matches!(env, Environment::Prod) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.pretty())
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::info!(env = env.as_str(), "Logging initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prod_directives_are_quieter_than_dev() {
        assert!(default_directives(&Environment::Dev).contains("ses_matching_backend=debug"));
        assert!(default_directives(&Environment::Prod).ends_with(",warn"));
    }

    #[test]
    fn second_init_is_a_noop() {
        init_logging(&Environment::Dev);
        assert!(!init_logging(&Environment::Dev));
    }
}
