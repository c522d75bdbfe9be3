use std::fs;
use std::process;

use phrase_core::registry::Registry;

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            process::exit(1);
        })
    };
}

pub mod batch_ops;
pub mod config_ops;
pub mod lookup_ops;

/// Build a registry from a file of configuration lines, exiting on error.
pub(crate) fn load_registry(config_file: &str) -> Registry {
    let text = die!(
        fs::read_to_string(config_file),
        "Error reading {config_file}: {}"
    );
    let mut builder = Registry::builder();
    die!(builder.add_config(&text), "Error in {config_file}: {}");
    let registry = builder.build();
    if registry.is_empty() {
        eprintln!("Error: {config_file} configures no dictionaries");
        process::exit(1);
    }
    registry
}
