//! Whole-range reads over the paged `get_range` call

use std::sync::Arc;

use crate::traits::{StoreFuture, Transaction};
use crate::types::{KeySelector, KeyValue, RangeOptions};

/// Read every entry between `begin` and `end`, up to `options.limit`.
///
/// The first page is requested before this function returns; later pages
/// are requested as earlier ones arrive. Each page after the first narrows
/// the range past the last key seen and asks for the remaining limit.
pub fn read_range(
    tr: Arc<dyn Transaction>,
    begin: KeySelector,
    end: KeySelector,
    options: RangeOptions,
    snapshot: bool,
) -> StoreFuture<Vec<KeyValue>> {
    let first = tr.get_range(&begin, &end, &options, snapshot);
    Box::pin(async move {
        let mut begin = begin;
        let mut end = end;
        let mut options = options;
        let limit = options.limit;
        let mut out: Vec<KeyValue> = Vec::new();
        let mut page = first.await?;

        loop {
            let more = page.more;
            let last = page.entries.last().map(|kv| kv.key.clone());
            out.extend(page.entries);

            if limit > 0 && out.len() >= limit {
                out.truncate(limit);
                break;
            }
            let last = match (more, last) {
                (true, Some(last)) => last,
                _ => break,
            };

            if options.reverse {
                end = KeySelector::first_greater_or_equal(last);
            } else {
                begin = KeySelector::first_greater_than(last);
            }
            if limit > 0 {
                options.limit = limit - out.len();
            }
            options.iteration += 1;
            page = tr.get_range(&begin, &end, &options, snapshot).await?;
        }

        Ok(out)
    })
}
