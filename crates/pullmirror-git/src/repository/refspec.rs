//! Remote names and refspecs used by mirrors.

use git2::{ReferenceType, Repository};

/// Remote the mirror fetches from.
pub const ORIGIN_REMOTE: &str = "origin";

/// Remote the mirror pushes to.
pub const TARGET_REMOTE: &str = "target";

/// All origin branches, as remote-tracking refs.
pub const ORIGIN_HEADS: &str = "+refs/heads/*:refs/remotes/origin/*";

/// All origin tags, force-updated.
pub const ORIGIN_TAGS: &str = "+refs/tags/*:refs/tags/*";

const TRACKING_PREFIX: &str = "refs/remotes/origin/";
const TAGS_PREFIX: &str = "refs/tags/";

/// Maps a local ref to the refspec that publishes it on the target.
///
/// Remote-tracking branches become branches on the target and tags keep their
/// name. Everything else, including the symbolic `origin/HEAD`, is not
/// pushed.
pub fn push_refspec(name: &str) -> Option<String> {
    if let Some(branch) = name.strip_prefix(TRACKING_PREFIX) {
        if branch.is_empty() || branch == "HEAD" {
            return None;
        }
        return Some(format!("+{name}:refs/heads/{branch}"));
    }

    if name.len() > TAGS_PREFIX.len() && name.starts_with(TAGS_PREFIX) {
        return Some(format!("+{name}:{name}"));
    }

    None
}

/// Computes the refspecs that mirror every origin branch and tag.
pub fn mirror_refspecs(repo: &Repository) -> Result<Vec<String>, git2::Error> {
    let mut refspecs = Vec::new();

    for reference in repo.references()? {
        let reference = reference?;
        if reference.kind() == Some(ReferenceType::Symbolic) {
            continue;
        }
        if let Some(refspec) = reference.name().and_then(push_refspec) {
            refspecs.push(refspec);
        }
    }

    refspecs.sort();
    Ok(refspecs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_refspec() {
        assert_eq!(
            push_refspec("refs/remotes/origin/main").as_deref(),
            Some("+refs/remotes/origin/main:refs/heads/main")
        );
        assert_eq!(
            push_refspec("refs/remotes/origin/feature/x").as_deref(),
            Some("+refs/remotes/origin/feature/x:refs/heads/feature/x")
        );
        assert_eq!(
            push_refspec("refs/tags/v1.0.0").as_deref(),
            Some("+refs/tags/v1.0.0:refs/tags/v1.0.0")
        );
    }

    #[test]
    fn test_push_refspec_skips_other_refs() {
        assert_eq!(push_refspec("refs/remotes/origin/HEAD"), None);
        assert_eq!(push_refspec("refs/remotes/target/main"), None);
        assert_eq!(push_refspec("refs/heads/main"), None);
        assert_eq!(push_refspec("refs/tags/"), None);
        assert_eq!(push_refspec("HEAD"), None);
    }
}
