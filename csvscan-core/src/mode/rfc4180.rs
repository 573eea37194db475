use crate::dialect::{CsvMode, Dialect};
use crate::mode::Machine;
use crate::state::{ParserState, Sink, Step};

/// Strict RFC 4180 quoting.
///
/// A field is either unquoted, or starts with a quote and runs to a matching
/// closing quote, where `""` stands for one literal quote. Anything else
/// (a quote in the middle of an unquoted field, or data after a closing
/// quote) makes the field invalid. An invalid field keeps its raw text,
/// quotes included, and ends at the next delimiter or terminator.
///
/// The opening and closing quotes of a field are marked in the escape mask.
/// For a doubled quote, the first quote closes and is marked while the
/// second reopens and is kept, which leaves exactly one literal quote.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Rfc4180;

impl Machine for Rfc4180 {
    const MODE: CsvMode = CsvMode::Rfc4180;

    #[inline(always)]
    fn step(
        st: &mut ParserState,
        d: &Dialect,
        q: usize,
        sink: &mut Sink,
    ) -> Step {
        let b = st.buf[q];
        if st.field_invalid {
            if b == d.quote {
                return Step::Continue;
            }
            return st.boundary(d, q, sink);
        }
        if st.in_escape {
            if b == d.quote {
                st.in_escape = false;
                st.escapes.set(q - st.field_start);
                st.prev_escape = Some(q);
            } else {
                st.data_newline(q, d.term);
            }
            return Step::Continue;
        }
        if let Some(closed) = st.prev_escape {
            if b == d.quote && q == closed + 1 {
                st.in_escape = true;
                return Step::Continue;
            }
            if q != closed + 1 {
                // Non-special data followed the closing quote.
                st.field_invalid = true;
            }
            if b == d.quote {
                return Step::Continue;
            }
            return st.boundary(d, q, sink);
        }
        if b == d.quote {
            if q == st.field_start {
                st.in_escape = true;
                st.escapes.set(0);
            } else {
                st.field_invalid = true;
            }
            return Step::Continue;
        }
        st.boundary(d, q, sink)
    }

    fn finish(st: &mut ParserState, _: &Dialect) {
        if st.field_invalid {
            return;
        }
        if st.in_escape {
            // Unterminated quoted field.
            st.field_invalid = true;
        } else if let Some(closed) = st.prev_escape {
            if closed + 1 != st.len {
                st.field_invalid = true;
            }
        }
    }
}
