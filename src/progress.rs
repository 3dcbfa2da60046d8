//! Coarse progress reporting at phase boundaries.

use std::fmt;

use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parsed,
    LookupBuilt,
    Joined,
    ExportBuilt,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Parsed => "parsing done",
            Phase::LookupBuilt => "lookup built",
            Phase::Joined => "join done",
            Phase::ExportBuilt => "export built",
        };
        f.write_str(label)
    }
}

pub trait Progress {
    fn phase(&mut self, phase: Phase);
}

impl<F: FnMut(Phase)> Progress for F {
    fn phase(&mut self, phase: Phase) {
        self(phase)
    }
}

/// Logs each phase at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn phase(&mut self, phase: Phase) {
        info!("Phase: {phase}");
    }
}
