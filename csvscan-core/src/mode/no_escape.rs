use crate::dialect::{CsvMode, Dialect};
use crate::mode::Machine;
use crate::state::{ParserState, Sink, Step};

/// No byte protects any other. Every delimiter and terminator is a
/// boundary.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NoEscape;

impl Machine for NoEscape {
    const MODE: CsvMode = CsvMode::NoEscape;

    #[inline(always)]
    fn step(
        st: &mut ParserState,
        d: &Dialect,
        q: usize,
        sink: &mut Sink,
    ) -> Step {
        st.boundary(d, q, sink)
    }

    fn finish(_: &mut ParserState, _: &Dialect) {}
}
