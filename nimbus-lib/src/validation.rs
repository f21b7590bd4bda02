pub fn check_control_leading_trailing<G>(
    given: G,
    max_chars: Option<usize>
) -> bool
where
    G: AsRef<str>
{
    let given_ref = given.as_ref();
    let mut iter = given_ref.chars();
    let mut char_count = 0;

    if let Some(ch) = iter.next() {
        char_count += 1;

        if ch.is_control() || ch.is_whitespace() {
            return false;
        }
    }

    if let Some(ch) = iter.next_back() {
        char_count += 1;

        if ch.is_control() || ch.is_whitespace() {
            return false;
        }
    }

    for ch in iter {
        if ch.is_control() {
            return false;
        }

        char_count += 1;

        if let Some(max) = max_chars {
            if char_count > max {
                return false;
            }
        }
    }

    true
}
