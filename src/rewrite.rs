//! Textual rewrite of a defaults entry.
//!
//! Re-serializing a root document after a structural edit would drop its
//! comments and reorder keys, so selections are changed by substituting the
//! matching lines in the raw text instead. Only lines of these shapes are
//! recognized (an optional trailing `# comment` is kept):
//!
//! ```text
//!   - group/name
//!   - override group/name
//!   - group: name
//!   - override group: name
//!   - name                  (root-level file, group "root")
//! ```
//!
//! This is inherently best-effort: quoted entries, flow sequences and other
//! hand-written variations are not matched.

use crate::compose::defaults::ROOT_GROUP;
use crate::error::ResolveError;
use regex_lite::{Captures, Regex};
use std::path::Path;
use tracing::info;

/// Trailing whitespace, an optional comment, and an optional `\r`.
const REST: &str = r"(?P<rest>[ \t]*(?:#[^\r\n]*)?\r?)$";

/// Rewrite every line encoding `old_group/old_name` to the new selection.
///
/// Returns the new text and the number of lines changed. Unrelated lines are
/// left byte-for-byte intact.
pub fn rewrite_entry(
    text: &str,
    old_group: &str,
    old_name: &str,
    new_group: &str,
    new_name: &str,
) -> (String, usize) {
    let group = regex_lite::escape(old_group);
    let name = regex_lite::escape(old_name);
    let new_path = if new_group == ROOT_GROUP {
        new_name.to_string()
    } else {
        format!("{new_group}/{new_name}")
    };

    let mut count = 0;

    let path_form = format!(
        r"(?m)^(?P<indent>[ \t]*)- (?P<override>override )?{group}/{name}{REST}"
    );
    let mut text = substitute(text, &path_form, &mut count, |caps| {
        format!(
            "{}- {}{}{}",
            &caps["indent"],
            caps.name("override").map_or("", |m| m.as_str()),
            new_path,
            &caps["rest"]
        )
    });

    let mapping_form = format!(
        r"(?m)^(?P<indent>[ \t]*)- (?P<override>override )?{group}[ \t]*:[ \t]*{name}{REST}"
    );
    text = substitute(&text, &mapping_form, &mut count, |caps| {
        let prefix = caps.name("override").map_or("", |m| m.as_str());
        if new_group == ROOT_GROUP {
            format!("{}- {}{}{}", &caps["indent"], prefix, new_path, &caps["rest"])
        } else {
            format!(
                "{}- {}{}: {}{}",
                &caps["indent"], prefix, new_group, new_name, &caps["rest"]
            )
        }
    });

    if old_group == ROOT_GROUP {
        let bare_form = format!(r"(?m)^(?P<indent>[ \t]*)- {name}{REST}");
        text = substitute(&text, &bare_form, &mut count, |caps| {
            format!("{}- {}{}", &caps["indent"], new_path, &caps["rest"])
        });
    }

    (text, count)
}

fn substitute(
    text: &str,
    pattern: &str,
    count: &mut usize,
    replace: impl Fn(&Captures<'_>) -> String,
) -> String {
    // Patterns are built from escaped input, so compilation cannot fail on
    // user data; an invalid pattern simply matches nothing.
    let Ok(re) = Regex::new(pattern) else {
        return text.to_string();
    };
    let mut matched = 0;
    let result = re
        .replace_all(text, |caps: &Captures<'_>| {
            matched += 1;
            replace(caps)
        })
        .into_owned();
    *count += matched;
    result
}

/// Rewrite the entry in a file on disk.
///
/// Fails with [`ResolveError::EntryNotFound`] if no line matched, so a
/// silent no-op is never reported as success.
pub fn rewrite_entry_in_file(
    path: &Path,
    old_group: &str,
    old_name: &str,
    new_group: &str,
    new_name: &str,
) -> Result<usize, ResolveError> {
    let text = std::fs::read_to_string(path).map_err(|e| ResolveError::io(path, e))?;
    let (new_text, count) = rewrite_entry(&text, old_group, old_name, new_group, new_name);
    if count == 0 {
        return Err(ResolveError::EntryNotFound {
            group: old_group.to_string(),
            name: old_name.to_string(),
            path: path.to_path_buf(),
        });
    }
    std::fs::write(path, new_text).map_err(|e| ResolveError::io(path, e))?;
    info!(
        path = %path.display(),
        from = %format!("{old_group}/{old_name}"),
        to = %format!("{new_group}/{new_name}"),
        lines = count,
        "Rewrote defaults entry"
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# main config\ndefaults:\n  - model/resnet\n  - db: mysql   # primary db\n  - override optim: adam\n  - _self_\n\nmodel_note: model/resnet\n";

    #[test]
    fn test_path_form_only_changes_that_line() {
        let (out, n) = rewrite_entry(DOC, "model", "resnet", "model", "resnet50");
        assert_eq!(n, 1);
        let before: Vec<&str> = DOC.lines().collect();
        let after: Vec<&str> = out.lines().collect();
        assert_eq!(before.len(), after.len());
        for (i, (b, a)) in before.iter().zip(&after).enumerate() {
            if i == 2 {
                assert_eq!(*a, "  - model/resnet50");
            } else {
                assert_eq!(b, a);
            }
        }
    }

    #[test]
    fn test_mapping_form_keeps_comment() {
        let (out, n) = rewrite_entry(DOC, "db", "mysql", "db", "postgres");
        assert_eq!(n, 1);
        assert!(out.contains("  - db: postgres   # primary db\n"));
    }

    #[test]
    fn test_override_prefix_preserved() {
        let (out, n) = rewrite_entry(DOC, "optim", "adam", "optim", "sgd");
        assert_eq!(n, 1);
        assert!(out.contains("  - override optim: sgd\n"));
    }

    #[test]
    fn test_no_partial_name_match() {
        let (_, n) = rewrite_entry(DOC, "model", "res", "model", "x");
        assert_eq!(n, 0);
        let (_, n) = rewrite_entry(DOC, "db", "my", "db", "x");
        assert_eq!(n, 0);
    }

    #[test]
    fn test_all_matching_lines_rewritten() {
        let doc = "defaults:\n  - a/b\nother:\n  - a/b\n";
        let (out, n) = rewrite_entry(doc, "a", "b", "a", "c");
        assert_eq!(n, 2);
        assert_eq!(out, "defaults:\n  - a/c\nother:\n  - a/c\n");
    }

    #[test]
    fn test_root_group_bare_entry() {
        let doc = "defaults:\n  - extras\n  - _self_\n";
        let (out, n) = rewrite_entry(doc, ROOT_GROUP, "extras", ROOT_GROUP, "extras_v2");
        assert_eq!(n, 1);
        assert_eq!(out, "defaults:\n  - extras_v2\n  - _self_\n");
    }

    #[test]
    fn test_regex_metacharacters_escaped() {
        let doc = "defaults:\n  - a.b/c+d\n  - aXb/c+d\n";
        let (out, n) = rewrite_entry(doc, "a.b", "c+d", "a.b", "e");
        assert_eq!(n, 1);
        assert_eq!(out, "defaults:\n  - a.b/e\n  - aXb/c+d\n");
    }

    #[test]
    fn test_crlf_line_endings_preserved() {
        let doc = "defaults:\r\n  - db: mysql\r\n";
        let (out, n) = rewrite_entry(doc, "db", "mysql", "db", "pg");
        assert_eq!(n, 1);
        assert_eq!(out, "defaults:\r\n  - db: pg\r\n");
    }
}
