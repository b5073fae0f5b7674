//! `strand list`: print the built-in designs.

use crate::designs::DESIGNS;
use crate::GlobalArgs;

/// Runs the `strand list` command.
pub fn run(_global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    print!("{}", render());
    Ok(0)
}

fn render() -> String {
    let width = DESIGNS.iter().map(|d| d.name.len()).max().unwrap_or(0);
    DESIGNS
        .iter()
        .map(|d| format!("{:width$}  {}\n", d.name, d.description))
        .collect()
}
