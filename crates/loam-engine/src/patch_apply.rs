//! Applying a stored unified diff to possibly-changed file content.
//!
//! Application is strict: every hunk's before-image must occur exactly
//! once in the current content. A missing or ambiguous match fails the
//! whole application, which the caller surfaces as `StaleProposal`.
//! There is no fuzzy matching.

/// One parsed hunk: the lines it expects to find and the lines that
/// replace them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Hunk {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

/// Parse unified diff text into hunks. Header and `@@` range lines are
/// positional hints only; matching is purely content-based.
pub fn parse_patch(patch: &str) -> Result<Vec<Hunk>, String> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in patch.lines() {
        if line.starts_with("--- ") || line.starts_with("+++ ") {
            continue;
        }
        if line.starts_with("@@") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            current = Some(Hunk::default());
            continue;
        }
        let Some(hunk) = current.as_mut() else {
            if line.is_empty() {
                continue;
            }
            return Err(format!("diff content outside any hunk: {line:?}"));
        };
        if let Some(rest) = line.strip_prefix('+') {
            hunk.after.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix('-') {
            hunk.before.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix(' ') {
            hunk.before.push(rest.to_string());
            hunk.after.push(rest.to_string());
        } else if line.starts_with('\\') {
            // "\ No newline at end of file" hint
            continue;
        } else if line.is_empty() {
            // Some tools trim the single-space prefix off empty context lines.
            hunk.before.push(String::new());
            hunk.after.push(String::new());
        } else {
            return Err(format!("unrecognized diff line: {line:?}"));
        }
    }
    if let Some(hunk) = current.take() {
        hunks.push(hunk);
    }
    Ok(hunks)
}

/// Apply a unified diff to `current`, returning the revised content.
pub fn apply(current: &str, patch: &str) -> Result<String, String> {
    let hunks = parse_patch(patch)?;
    if hunks.is_empty() {
        return Ok(current.to_string());
    }

    let mut lines: Vec<String> = current.lines().map(String::from).collect();
    for (index, hunk) in hunks.iter().enumerate() {
        if hunk.before.is_empty() {
            if lines.is_empty() {
                lines = hunk.after.clone();
                continue;
            }
            return Err(format!(
                "hunk {} adds content without context to a non-empty file",
                index + 1
            ));
        }
        if hunk.before.len() > lines.len() {
            return Err(format!("hunk {} no longer matches", index + 1));
        }

        let matches: Vec<usize> = (0..=lines.len() - hunk.before.len())
            .filter(|&at| lines[at..at + hunk.before.len()] == hunk.before[..])
            .collect();
        let at = match matches.as_slice() {
            [] => return Err(format!("hunk {} no longer matches", index + 1)),
            [at] => *at,
            _ => {
                return Err(format!(
                    "hunk {} matches at {} places, refusing to guess",
                    index + 1,
                    matches.len()
                ))
            }
        };
        lines.splice(at..at + hunk.before.len(), hunk.after.iter().cloned());
    }

    if lines.is_empty() {
        return Ok(String::new());
    }
    Ok(lines.join("\n") + "\n")
}
