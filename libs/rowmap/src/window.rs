use crate::error::MapError;
use crate::row::RowSource;

/// Field window of a tuple, with terminator columns split out.
///
/// Positions are measured in value fields: terminator columns are recorded
/// as breaks between values and never handed to a slot on their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TupleWindow {
    /// Raw row index of every value field, in order.
    columns: Vec<usize>,
    /// Value positions preceded by a terminator.
    breaks: Vec<usize>,
    /// Raw index one past the window.
    end: usize,
}

impl TupleWindow {
    pub(crate) fn scan(
        row: &dyn RowSource,
        index: usize,
        count: usize,
        terminator: Option<&str>,
    ) -> Self {
        let end = index + count;
        let mut columns = Vec::with_capacity(count);
        let mut breaks = Vec::new();
        for i in index..end {
            match terminator {
                Some(t) if row.field_name(i).eq_ignore_ascii_case(t) => breaks.push(columns.len()),
                _ => columns.push(i),
            }
        }
        Self {
            columns,
            breaks,
            end,
        }
    }

    /// Number of value fields.
    pub(crate) fn len(&self) -> usize {
        self.columns.len()
    }

    /// First terminator strictly after value position `cur`.
    pub(crate) fn next_break(&self, cur: usize) -> Option<usize> {
        self.breaks.iter().copied().find(|&b| b > cur)
    }

    /// Raw `(index, count)` covering `width` value fields from `start`.
    ///
    /// Interior terminators stay inside the span so nested tuples can see them.
    pub(crate) fn span(&self, start: usize, width: usize) -> (usize, usize) {
        if width == 0 {
            let at = self.columns.get(start).copied().unwrap_or(self.end);
            return (at, 0);
        }
        let first = self.columns[start];
        let last = self.columns[start + width - 1];
        (first, last + 1 - first)
    }
}

/// Width of a slot whose type does not declare one.
///
/// `widths` holds the declared width of every slot of the tuple, `cur` is the
/// value position where `slot` starts. Rules, first match wins:
///
/// 1. every later slot is fixed: take what they leave over
/// 2. a terminator follows: take everything up to it
/// 3. exactly one field is left per remaining variable slot: take one
pub(crate) fn infer_width(
    type_name: &'static str,
    widths: &[Option<usize>],
    slot: usize,
    cur: usize,
    window: &TupleWindow,
) -> Result<usize, MapError> {
    let total = window.len();
    let rest = &widths[slot + 1..];

    if let Some(known) = rest.iter().copied().sum::<Option<usize>>() {
        return total
            .checked_sub(cur + known)
            .ok_or(MapError::FieldCountMismatch {
                type_name,
                expected: cur + known,
                actual: total,
            });
    }

    if let Some(b) = window.next_break(cur) {
        tracing::trace!(type_name, slot, terminator_at = b, "tuple slot closed by terminator");
        return Ok(b - cur);
    }

    let fixed_rest: usize = rest.iter().flatten().sum();
    let variable = widths[slot..].iter().filter(|w| w.is_none()).count();
    if total.checked_sub(cur + fixed_rest) == Some(variable) {
        tracing::trace!(type_name, slot, "one field per variable tuple slot");
        return Ok(1);
    }

    Err(MapError::AmbiguousTupleWidth { type_name, slot })
}
