use packspec_cli::run;
use packspec_core::{ExtensionRegistry, PackageRegistry};
use std::process::ExitCode;

fn main() -> ExitCode {
    run(PackageRegistry::new(), ExtensionRegistry::new())
}
