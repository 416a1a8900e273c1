//! Deterministic tape machine interpreter.

use log::trace;

use crate::schema::{MachineError, TAPE_CAPACITY, TableView, Tape};

/// Abnormal but expected end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionError {
    /// The head left the tape.
    OutOfBounds,
}

/// Statistics accumulated during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStatus {
    /// State the machine stopped in.
    pub state: usize,
    /// Transitions taken.
    pub steps: u64,
    /// Cells written.
    pub writes: u64,
    /// Set when the run ended abnormally.
    pub error: Option<ExecutionError>,
    /// Rightmost written cell.
    pub head_max: usize,
}

impl ExecutionStatus {
    /// Whether the machine ended in one of the terminal states.
    pub fn halted(&self, table: TableView<'_>) -> bool {
        self.state >= table.state_count()
    }
}

/// Step budget for a tape with `input_len` meaningful cells.
#[inline]
pub fn max_steps(input_len: usize) -> u64 {
    (input_len as u64).pow(3)
}

/// Run `table` on `tape` for at most `max_steps` transitions.
///
/// The head starts on cell 1, right of the boundary blank. The run ends
/// when a terminal state is entered, the budget is spent, or the head
/// leaves the tape; only the last is flagged in the returned status.
/// A lookup outside the table is a malformed table and is returned as
/// an error.
pub fn run(
    tape: &mut Tape,
    table: TableView<'_>,
    max_steps: u64,
) -> Result<ExecutionStatus, MachineError> {
    let mut status = ExecutionStatus::default();
    let mut head: usize = 1;

    while status.steps < max_steps && status.state < table.state_count() {
        status.steps += 1;
        let symbol = tape.get(head);
        let rule = table.rule(status.state, symbol as usize)?;
        status.state = rule.next_state as usize;

        if let Some(write) = rule.write {
            tape.set(head, write);
            status.writes += 1;
            if head > status.head_max {
                status.head_max = head;
            }
        }

        let next = head as isize + rule.shift.offset();
        if next < 0 || next as usize >= TAPE_CAPACITY {
            trace!("Head out of bounds after {} steps", status.steps);
            status.error = Some(ExecutionError::OutOfBounds);
            break;
        }
        head = next as usize;
    }

    Ok(status)
}
