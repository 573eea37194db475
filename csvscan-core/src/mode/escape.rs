use crate::dialect::{CsvMode, Dialect};
use crate::mode::Machine;
use crate::state::{ParserState, Sink, Step};

/// Backslash style escaping.
///
/// An escape byte immediately followed by a special byte (delimiter,
/// terminator or another escape) is dropped and the special byte is kept as
/// data. An escape followed by anything else is kept as data.
///
/// Since only special bytes are ever visited, an escape is tentatively
/// marked for removal when it is seen. The mark is undone when the next
/// visited position turns out not to directly follow it, or when input ends.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Escape;

impl Machine for Escape {
    const MODE: CsvMode = CsvMode::Escape;

    #[inline(always)]
    fn step(
        st: &mut ParserState,
        d: &Dialect,
        q: usize,
        sink: &mut Sink,
    ) -> Step {
        if let Some(p) = st.prev_escape.take() {
            if q == p + 1 {
                st.data_newline(q, d.term);
                return Step::Continue;
            }
            st.escapes.unset(p - st.field_start);
        }
        if st.buf[q] == d.escape {
            st.escapes.set(q - st.field_start);
            st.prev_escape = Some(q);
            return Step::Continue;
        }
        st.boundary(d, q, sink)
    }

    fn finish(st: &mut ParserState, _: &Dialect) {
        if let Some(p) = st.prev_escape.take() {
            st.escapes.unset(p - st.field_start);
        }
    }
}
