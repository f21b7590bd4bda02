pub const MAX_BASENAME_CHARS: usize = 512;
pub const MIN_BASENAME_CHARS: usize = 1;

/// separator used in full path strings
pub const PATH_SEP: char = '/';

fn valid_basename_char(ch: &char) -> bool {
    (match ch {
        '/' | '\\' => false,
        _ => true
    }) && !ch.is_control()
}

/// checks a single path segment. segments may not be empty, may not be
/// the "." or ".." traversal names, and may not contain a separator or
/// control characters
pub fn basename_valid(given: &str) -> bool {
    if given == "." || given == ".." {
        return false;
    }

    let mut count = 0;

    for ch in given.chars() {
        if !valid_basename_char(&ch) {
            return false;
        }

        count += 1;

        if count > MAX_BASENAME_CHARS {
            return false;
        }
    }

    count >= MIN_BASENAME_CHARS
}
