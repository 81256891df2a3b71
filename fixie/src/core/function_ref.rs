//! `namespace::name` function arguments.
//!
//! A namespace given on one argument sticks to the following arguments until
//! another qualified argument replaces it; a leading `::` clears it. The CLI
//! does not route its arguments through this yet and always looks functions up
//! unqualified.

/// A requested function, optionally scoped to a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub namespace: Option<String>,
    pub name: String,
}

/// Parse function arguments, skipping anything that looks like a flag.
pub fn parse_function_refs<I, S>(args: I) -> Vec<FunctionRef>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut namespace: Option<String> = None;
    let mut refs = Vec::new();

    for arg in args {
        let arg = arg.as_ref();
        if arg.starts_with('-') {
            continue;
        }
        let name = match arg.split_once("::") {
            Some((prefix, rest)) => {
                namespace = (!prefix.is_empty()).then(|| prefix.to_string());
                rest
            }
            None => arg,
        };
        refs.push(FunctionRef {
            namespace: namespace.clone(),
            name: name.to_string(),
        });
    }
    refs
}
