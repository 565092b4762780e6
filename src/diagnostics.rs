//! Diagnostic sinks (spec §6): `warning` (counted against `max_i`) and
//! `trace` (gated by a global log level), plus the one-shot header that
//! precedes the first reported diff for a file pair.

/// A sink for the engine's two diagnostic channels. Kept as a trait so
/// tests can swap in a `CollectingDiagnostics` that records messages
/// instead of printing them, the way the teacher swaps comparison
/// functions behind small traits rather than hard-coding `eprintln!`.
pub trait Diagnostics {
    fn warning(&mut self, message: &str);
    fn trace(&mut self, message: &str);
    /// One-shot header identifying the two file paths (and an optional
    /// test-id label), emitted before the first reported diff.
    fn header(&mut self, lhs_path: &str, rhs_path: &str, test_id: Option<&str>);
}

/// Diagnostics sink that goes through the `log` facade, in the style the
/// wider example pack uses for leveled logging (`fgc`, `faxc-*`). The
/// process installs a concrete logger (`env_logger`, in the CLI binary);
/// the library itself only ever talks to the `log` facade.
#[derive(Debug, Default)]
pub struct LoggingDiagnostics {
    header_emitted: bool,
}

impl Diagnostics for LoggingDiagnostics {
    fn warning(&mut self, message: &str) {
        log::warn!("{message}");
    }

    fn trace(&mut self, message: &str) {
        log::trace!("{message}");
    }

    fn header(&mut self, lhs_path: &str, rhs_path: &str, test_id: Option<&str>) {
        if self.header_emitted {
            return;
        }
        self.header_emitted = true;
        match test_id {
            Some(id) => log::info!("comparing {lhs_path} vs {rhs_path} [{id}]"),
            None => log::info!("comparing {lhs_path} vs {rhs_path}"),
        }
    }
}

/// A sink that records every message instead of printing it, for tests
/// that want to assert on diagnostic content.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    pub warnings: Vec<String>,
    pub traces: Vec<String>,
    pub header: Option<(String, String, Option<String>)>,
}

impl Diagnostics for CollectingDiagnostics {
    fn warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    fn trace(&mut self, message: &str) {
        self.traces.push(message.to_string());
    }

    fn header(&mut self, lhs_path: &str, rhs_path: &str, test_id: Option<&str>) {
        if self.header.is_some() {
            return;
        }
        self.header = Some((lhs_path.to_string(), rhs_path.to_string(), test_id.map(String::from)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_one_shot() {
        let mut d = CollectingDiagnostics::default();
        d.header("a.txt", "b.txt", None);
        d.header("c.txt", "d.txt", None);
        assert_eq!(d.header.unwrap().0, "a.txt");
    }
}
