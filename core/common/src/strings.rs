// core/common/src/strings.rs
// Display-name formatting

/// Lower-cases the whole input, then capitalizes the first letter of every
/// word. Apostrophes stay inside a word, so "O'NEIL" becomes "O'neil".
pub fn to_title_case(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut word_start = true;

    for c in input.chars() {
        if c.is_alphanumeric() || c == '\'' {
            if word_start {
                output.extend(c.to_uppercase());
            } else {
                output.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            output.push(c);
            word_start = true;
        }
    }

    output
}
