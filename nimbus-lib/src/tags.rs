use std::collections::BTreeSet;

use crate::validation::check_control_leading_trailing;

pub const MAX_TAG_CHARS: usize = 128;

/// character separating tags when they arrive as a single string
pub const TAG_SEPARATOR: char = ',';

/// unordered, deduplicated tag collection
pub type TagSet = BTreeSet<String>;

pub fn tag_valid(given: &str) -> bool {
    !given.is_empty() && check_control_leading_trailing(given, Some(MAX_TAG_CHARS))
}

pub fn validate_set(given: &TagSet) -> bool {
    given.iter().all(|tag| tag_valid(tag))
}

/// builds a [`TagSet`] from raw values, dropping empty segments and
/// duplicates
pub fn normalize<I, T>(given: I) -> TagSet
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut rtn = TagSet::new();

    for tag in given {
        let trimmed = tag.as_ref().trim();

        if !trimmed.is_empty() {
            rtn.insert(trimmed.to_owned());
        }
    }

    rtn
}

/// splits a separator joined tag list into a [`TagSet`]
pub fn split_list(given: &str) -> TagSet {
    normalize(given.split(TAG_SEPARATOR))
}
