use log::warn;

use crate::errors::Result;

pub mod deconv;
pub mod reader;
pub mod table;

/// Drops (and logs) items that failed with a parse error; any other error is
/// passed through so the caller can abort the batch.
pub fn skip_malformed<T, I>(items: I, what: &'static str) -> impl Iterator<Item = Result<T>>
where
    I: IntoIterator<Item = Result<T>>,
{
    items.into_iter().filter(move |item| match item {
        Err(err) if err.is_parse() => {
            warn!("skipping malformed {}: {}", what, err);
            false
        }
        _ => true,
    })
}
