use clap::Parser;

use crate::config::DEFAULT_LOCATOR;

/// Arguments shared by every sweep binary.
#[derive(Parser, Debug)]
pub struct SweepArgs {
    /// Config locator: `file:<path>`, `env:` or `aws:[<region>:]<path>`
    #[arg(default_value = DEFAULT_LOCATOR)]
    pub config: String,
}
