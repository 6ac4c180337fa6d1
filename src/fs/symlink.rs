use crate::*;
use super::disk::MAX_SYMLINK_LEN;

/// A stored target of the form `root?<uid0-path>:<other-path>` resolves to
/// one of its two halves depending on who asks; anything else resolves to
/// itself. The caller owns the returned string.
pub const COND_PREFIX: &str = "root?";

pub fn resolve_target(target: &str, uid: u32) -> String {
    match target.strip_prefix(COND_PREFIX) {
        None => target.to_string(),
        Some(rest) => match rest.split_once(':') {
            Some((uid0_path, other_path)) => {
                if uid == 0 {
                    uid0_path.to_string()
                } else {
                    other_path.to_string()
                }
            }
            // a conditional with no alternative is treated as a plain path
            None => target.to_string(),
        },
    }
}

/// Target validity at creation time: length only, contents are opaque.
pub fn check_target(target: &str) -> FsResult<()> {
    if target.len() > MAX_SYMLINK_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_targets_resolve_to_themselves() {
        assert_eq!(resolve_target("/plain", 0), "/plain");
        assert_eq!(resolve_target("/plain", 1000), "/plain");
        assert_eq!(resolve_target("relative/path", 42), "relative/path");
    }

    #[test]
    fn conditional_targets_split_on_the_callers_uid() {
        assert_eq!(resolve_target("root?/a:/b", 0), "/a");
        assert_eq!(resolve_target("root?/a:/b", 1000), "/b");
        // only the first colon separates the halves
        assert_eq!(resolve_target("root?/a:/b:/c", 1000), "/b:/c");
    }

    #[test]
    fn malformed_conditionals_fall_back_to_the_raw_target() {
        assert_eq!(resolve_target("root?nocolon", 0), "root?nocolon");
        assert_eq!(resolve_target("root?nocolon", 1000), "root?nocolon");
    }

    #[test]
    fn length_limits() {
        assert!(check_target(&"x".repeat(MAX_SYMLINK_LEN)).is_ok());
        assert_eq!(
            check_target(&"x".repeat(MAX_SYMLINK_LEN + 1)).err(),
            Some(FsError::NameTooLong)
        );
    }
}
