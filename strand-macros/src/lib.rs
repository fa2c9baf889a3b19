mod utils;

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Highest arity with a fixed-arity join function.
const MAX_PAR_ARITY: usize = 15;

/// Joins 2 to 15 tasks into a tuple task, failing fast on the first error.
///
/// `par!(a, b, c)` expands to `::strand::par::par3(a, b, c)`.
#[proc_macro]
pub fn par(input: TokenStream) -> TokenStream {
    let args = utils::split_args(input);
    let count = args.len();

    if !(2..=MAX_PAR_ARITY).contains(&count) {
        return compile_error(&format!(
            "par! expects between 2 and {MAX_PAR_ARITY} tasks, got {count}"
        ));
    }

    let args = args
        .iter()
        .map(|tokens| utils::tokens_to_string(tokens))
        .collect::<Vec<_>>()
        .join(", ");

    let output = format!("::strand::par::par{count}({args})");

    output.parse().unwrap_or_else(|err| {
        compile_error(&format!("par macro error: {err}"))
    })
}

/// Turns a function body into a test running against a fresh engine.
///
/// The body sees the engine as `engine`; it is shut down when the body
/// returns.
///
/// ```rust,ignore
/// #[strand::test]
/// fn doubles() {
///     let task = Task::value("x", 21).map("double", |x| x * 2);
///     assert_eq!(engine.block_on(&task).unwrap(), 42);
/// }
/// ```
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut tokens = item.into_iter().collect::<Vec<_>>();

    let worker_threads = utils::parse_worker_threads(&attr.to_string());

    let Some(pos) = tokens.iter().rposition(
        |t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace),
    ) else {
        return compile_error("#[strand::test] expects a function");
    };

    let block = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => return compile_error("#[strand::test] expects a function body"),
    };

    let mut builder = String::from("::strand::EngineBuilder::new()");

    if let Some(n) = worker_threads {
        builder.push_str(&format!(".worker_threads({n})"));
    }

    builder.push_str(".build()");

    let new_block = format!(
        "{{
        let engine = {builder};
        let __result = {{ {block} }};
        engine.shutdown();
        __result
    }}"
    );

    let Ok(stream) = new_block.parse::<TokenStream>() else {
        return compile_error("#[strand::test] could not expand the function body");
    };

    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, stream));

    let test_attr: TokenStream = "#[test]".parse().unwrap_or_default();
    let mut result: Vec<TokenTree> = test_attr.into_iter().collect();
    result.extend(tokens);

    result.into_iter().collect()
}

fn compile_error(message: &str) -> TokenStream {
    format!("compile_error!({message:?});")
        .parse()
        .unwrap_or_default()
}
