use anyhow::Context;
use std::io::{BufRead, Write};

/// Asks for the folder to scan.
pub fn read_root<R: BufRead, W: Write>(mut input: R, mut output: W) -> anyhow::Result<String> {
    write!(output, "Enter the path to the folder: ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line).context("reading folder path")?;
    let root = line.trim();
    anyhow::ensure!(!root.is_empty(), "no folder given");
    Ok(root.to_string())
}
