/*!
The per-dialect state machines.

Each mode visits the special positions reported by a locator, in ascending
order, and decides whether each one is data, an escape, a field boundary or
a record boundary. Modes are zero sized types so that the scanning loop is
monomorphized once per mode: the mode is picked once per call to
`Parser::read_record`, never per byte.
*/

use crate::dialect::{CsvMode, Dialect};
use crate::state::{ParserState, Sink, Step};

pub(crate) use self::escape::Escape;
pub(crate) use self::no_escape::NoEscape;
pub(crate) use self::rfc4180::Rfc4180;

mod escape;
mod no_escape;
mod rfc4180;

pub(crate) trait Machine {
    const MODE: CsvMode;

    /// Visit the special byte at `q`.
    ///
    /// `q` is always at or after `st.pos` and strictly before `st.len`.
    fn step(st: &mut ParserState, d: &Dialect, q: usize, sink: &mut Sink)
        -> Step;

    /// Settle any pending state for the final field at the end of input.
    fn finish(st: &mut ParserState, d: &Dialect);
}
