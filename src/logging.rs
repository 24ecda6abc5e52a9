use std::sync::Mutex;

use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter, Registry};

lazy_static! {
    static ref LOGGING_INSTALLED: Mutex<bool> = Mutex::new(false);
}

/// Install a global subscriber if `RUST_LOG` is set to a non-empty value.
/// Scripts frequently export `RUST_LOG` unconditionally, so an empty value
/// means "no logging" rather than "default filter".  Calling this more than
/// once is harmless.
pub fn init_logging() {
    let mut installed = match LOGGING_INSTALLED.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if *installed {
        return;
    }
    *installed = true;

    let rustlog = std::env::var("RUST_LOG").unwrap_or_default();
    if rustlog.is_empty() {
        return;
    }
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("ignoring unparseable RUST_LOG {:?}: {}", rustlog, err);
            return;
        }
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .compact()
        // Output usually lands in a build log, where ANSI escapes and wall
        // times are noise.
        .with_ansi(false)
        .without_time()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    // Another subscriber may already be installed by an embedding program.
    let _ = Registry::default().with(layer).try_init();
}
