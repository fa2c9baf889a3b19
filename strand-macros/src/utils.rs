use proc_macro::{Spacing, TokenStream, TokenTree};

/// Splits a `TokenStream` into comma-separated arguments.
///
/// Each argument is returned as a `Vec<TokenTree>`.
/// Commas at the top level are used as separators. Commas stay inside their
/// argument when they are nested in parentheses, brackets or braces, in a
/// turbofish generic list (`f::<A, B>()`) or in closure parameters
/// (`|a, b| ..`).
pub(crate) fn split_args(input: TokenStream) -> Vec<Vec<TokenTree>> {
    let mut args = Vec::new();
    let mut current: Vec<TokenTree> = Vec::new();

    // Open `<` of turbofish generic lists.
    let mut angles = 0usize;
    let mut in_params = false;

    let mut tokens = input.into_iter().peekable();

    while let Some(token) = tokens.next() {
        if let TokenTree::Punct(p) = &token {
            match p.as_char() {
                ',' if angles == 0 && !in_params => {
                    if !current.is_empty() {
                        args.push(std::mem::take(&mut current));
                    }
                    continue;
                }
                '|' if in_params => in_params = false,
                '|' if starts_closure(&current) => {
                    let no_params = p.spacing() == Spacing::Joint
                        && matches!(tokens.peek(), Some(TokenTree::Punct(n)) if n.as_char() == '|');

                    if no_params {
                        current.push(token);
                        current.extend(tokens.next());
                        continue;
                    }

                    in_params = true;
                }
                '<' if angles > 0 || follows_path_separator(&current) => angles += 1,
                '>' if angles > 0 && !follows(&current, '-') => angles -= 1,
                _ => {}
            }
        }

        current.push(token);
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// Returns `true` if a `|` here opens closure parameters.
fn starts_closure(current: &[TokenTree]) -> bool {
    match current {
        [] => true,
        [TokenTree::Ident(ident)] => ident.to_string() == "move",
        _ => false,
    }
}

fn follows_path_separator(current: &[TokenTree]) -> bool {
    matches!(
        current,
        [.., TokenTree::Punct(a), TokenTree::Punct(b)] if a.as_char() == ':' && b.as_char() == ':'
    )
}

fn follows(current: &[TokenTree], c: char) -> bool {
    matches!(current.last(), Some(TokenTree::Punct(p)) if p.as_char() == c)
}

/// Converts a slice of tokens into a Rust source string.
///
/// An identifier followed by an identifier or a literal gets a separating
/// space to avoid accidental token merging (e.g. `move x` vs `movex`).
pub(crate) fn tokens_to_string(tokens: &[TokenTree]) -> String {
    let mut out = String::new();
    let mut prev_was_ident = false;

    for t in tokens {
        let s = t.to_string();

        let needs_space =
            prev_was_ident && matches!(t, TokenTree::Ident(_) | TokenTree::Literal(_));

        if needs_space {
            out.push(' ');
        }

        out.push_str(&s);
        prev_was_ident = matches!(t, TokenTree::Ident(_));
    }

    out
}

/// Extracts `worker_threads = N` from an attribute argument string.
pub(crate) fn parse_worker_threads(attr: &str) -> Option<usize> {
    attr.split(',')
        .map(str::trim)
        .filter_map(|part| part.strip_prefix("worker_threads"))
        .find_map(|value| value.trim_start().trim_start_matches('=').trim().parse().ok())
}
