use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal, Write};

/// Ask before deleting every build under `prefix`.
///
/// Without `--yes` this needs an interactive terminal.
pub fn confirm_purge(prefix: &str, count: usize, yes: bool) -> Result<bool> {
  if yes {
    return Ok(true);
  }

  if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
    bail!("Refusing to purge '{}' without confirmation. Use --yes to proceed.", prefix);
  }

  ask(
    &mut io::stdin().lock(),
    &mut io::stderr(),
    &format!("Delete {} build(s) under '{}'?", count, prefix),
  )
}

fn ask(input: &mut impl BufRead, prompt_to: &mut impl Write, question: &str) -> Result<bool> {
  write!(prompt_to, "{} [y/N] ", question)?;
  prompt_to.flush()?;

  let mut answer = String::new();
  input.read_line(&mut answer)?;

  Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn answer(text: &str) -> (bool, String) {
    let mut prompt = Vec::new();
    let confirmed = ask(&mut text.as_bytes(), &mut prompt, "Delete 3 build(s)?").unwrap();
    (confirmed, String::from_utf8(prompt).unwrap())
  }

  #[test]
  fn accepts_yes() {
    assert!(answer("y\n").0);
    assert!(answer("YES\n").0);
  }

  #[test]
  fn defaults_to_no() {
    let (confirmed, prompt) = answer("\n");
    assert!(!confirmed);
    assert_eq!(prompt, "Delete 3 build(s)? [y/N] ");
    assert!(!answer("nope\n").0);
  }

  #[test]
  fn yes_flag_skips_prompt() {
    assert!(confirm_purge("multipurpose/build_aggregator", 3, true).unwrap());
  }
}
