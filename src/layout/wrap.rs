/// Multiplier from font size to baseline-to-baseline distance.
pub const LINE_HEIGHT: f32 = 1.2;

/// Slack applied to width/height comparisons so float noise never flips a fit.
pub(crate) const FIT_EPSILON: f32 = 1e-3;

/// Greedy line breaking using a caller-supplied width function.
///
/// Words longer than `max_width` are broken at character boundaries; hard
/// newlines always start a new line. An empty input produces no lines.
pub fn wrap_text<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let tokens = tokenize_text(text);
    wrap_tokens(&tokens, max_width, &measure)
}

fn wrap_tokens<F>(tokens: &[String], max_width: f32, measure: &F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut result = Vec::new();
    let mut current = String::new();

    for token in tokens {
        if token == "\n" {
            if !current.trim().is_empty() {
                result.push(current.trim_end().to_string());
            }
            current.clear();
            continue;
        }
        if token.is_empty() {
            continue;
        }
        if token == " " {
            if !current.ends_with(' ') && !current.is_empty() {
                current.push(' ');
            }
            continue;
        }

        let candidate = format!("{current}{token}");
        if measure(candidate.trim_end()) <= max_width + FIT_EPSILON {
            current = candidate;
            continue;
        }
        if !current.trim().is_empty() {
            result.push(current.trim_end().to_string());
            current.clear();
        }
        if measure(token) <= max_width + FIT_EPSILON {
            current.push_str(token);
            continue;
        }
        for piece in break_long_token(token, max_width, measure) {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            current = piece;
        }
    }

    if !current.trim().is_empty() {
        result.push(current.trim_end().to_string());
    }
    result
}

fn break_long_token<F>(token: &str, max_width: f32, measure: &F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in token.chars() {
        current.push(ch);
        if measure(&current) > max_width + FIT_EPSILON && current.chars().count() > 1 {
            current.pop();
            pieces.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    )
}

fn tokenize_text(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch == '\n' {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push("\n".to_string());
            continue;
        }
        if ch.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(" ".to_string());
            continue;
        }
        if is_cjk(ch) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(ch.to_string());
            continue;
        }
        current.push(ch);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Whether wrapped lines at `font_size` fit a `width` x `height` box.
///
/// A single line only has to fit horizontally; several lines must also stack
/// within the height at [`LINE_HEIGHT`].
pub fn lines_fit<F>(lines: &[String], font_size: f32, width: f32, height: f32, measure: F) -> bool
where
    F: Fn(&str) -> f32,
{
    if lines.iter().any(|line| measure(line) > width + FIT_EPSILON) {
        return false;
    }
    match lines.len() {
        0 | 1 => true,
        count => count as f32 * font_size * LINE_HEIGHT <= height + FIT_EPSILON,
    }
}
