//! The numeric diff engine: owns the two line buffers and the register
//! file (spec §5 "Resources"), borrows a rule context and two line
//! sources, and drives line reading, seeking, and comparison accounting.
//!
//! This module holds the `Engine` struct, its constructor, the four line
//! operations (§4.3), option handling, and introspection. The tokenizer
//! (`next_num`), comparator (`test_num`), and seek operations
//! (`goto_line`/`goto_num`) are `impl Engine` blocks in their own modules
//! (`tokenizer.rs`, `comparator.rs`, `seek.rs`); the driver loop (§4.8) is
//! `Engine::run`, at the bottom of this file.

use crate::buffers::{LineBuffers, Side};
use crate::diagnostics::Diagnostics;
use crate::error::{NdiffError, NdiffResult};
use crate::line_source::{LineEnd, LineSource};
use crate::registers::RegisterFile;
use crate::rule::Action;
use crate::rule_context::RuleContext;
use std::io::Write;

/// Engine-wide options (spec §6 `set_options`).
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Cap on reported diffs (`max_i`). Must be `> 0`.
    pub keep: usize,
    /// Consume trailing blanks on both files once the driver loop ends, so
    /// EOF is consistent (§4.8, last paragraph).
    pub blank: bool,
    /// Cross-validate `get_incremental` against `get_at` every lookup.
    pub check: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            keep: usize::MAX,
            blank: false,
            check: false,
        }
    }
}

/// Summary returned by `Engine::get_info` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineInfo {
    pub row: usize,
    pub col: usize,
    pub cnt: usize,
    pub num: usize,
}

/// Outcome of running the full driver loop (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverSummary {
    pub rows: usize,
    pub diffs: usize,
    pub numbers: usize,
}

pub struct Engine {
    pub(crate) buffers: LineBuffers,
    pub(crate) regs: RegisterFile,
    pub(crate) lhs_source: Box<dyn LineSource>,
    pub(crate) rhs_source: Box<dyn LineSource>,
    pub(crate) ctx: Box<dyn RuleContext>,
    pub(crate) diagnostics: Box<dyn Diagnostics>,

    pub(crate) row_i: usize,
    pub(crate) col_i: usize,
    pub(crate) num_i: usize,
    pub(crate) cnt_i: usize,

    pub(crate) options: EngineOptions,

    pub(crate) lhs_eof: bool,
    pub(crate) rhs_eof: bool,

    pub(crate) lhs_label: String,
    pub(crate) rhs_label: String,
}

impl Engine {
    /// `initial_capacity` and `reg_count` are each clamped to a minimum
    /// (and `reg_count` also to `REG_MAX`); see `buffers::MIN_CAPACITY`
    /// and `registers::{REG_MIN, REG_MAX}`.
    pub fn new(
        lhs_source: Box<dyn LineSource>,
        rhs_source: Box<dyn LineSource>,
        ctx: Box<dyn RuleContext>,
        diagnostics: Box<dyn Diagnostics>,
        initial_capacity: usize,
        reg_count: usize,
    ) -> Self {
        Self {
            buffers: LineBuffers::new(initial_capacity),
            regs: RegisterFile::new(reg_count),
            lhs_source,
            rhs_source,
            ctx,
            diagnostics,
            row_i: 0,
            col_i: 0,
            num_i: 0,
            cnt_i: 0,
            options: EngineOptions::default(),
            lhs_eof: false,
            rhs_eof: false,
            lhs_label: String::from("lhs"),
            rhs_label: String::from("rhs"),
        }
    }

    pub fn with_labels(mut self, lhs_label: impl Into<String>, rhs_label: impl Into<String>) -> Self {
        self.lhs_label = lhs_label.into();
        self.rhs_label = rhs_label.into();
        self
    }

    /// Reset buffers and registers; configuration (sources, rule context,
    /// diagnostics sink, options) is preserved.
    pub fn clear(&mut self) {
        self.buffers = LineBuffers::new(crate::buffers::MIN_CAPACITY);
        self.regs.clear();
        self.row_i = 0;
        self.col_i = 0;
        self.num_i = 0;
        self.cnt_i = 0;
        self.lhs_eof = false;
        self.rhs_eof = false;
    }

    pub fn set_options(&mut self, keep: Option<usize>, blank: Option<bool>, check: Option<bool>) -> NdiffResult<()> {
        if let Some(keep) = keep {
            if keep == 0 {
                return Err(NdiffError::invalid_option("keep (max_i) must be > 0"));
            }
            self.options.keep = keep;
        }
        if let Some(blank) = blank {
            self.options.blank = blank;
        }
        if let Some(check) = check {
            self.options.check = check;
        }
        Ok(())
    }

    pub fn get_info(&self) -> EngineInfo {
        EngineInfo {
            row: self.row_i,
            col: self.col_i,
            cnt: self.cnt_i,
            num: self.num_i,
        }
    }

    /// `both = true`: EOF only once *both* sides are exhausted.
    /// `both = false`: EOF once *either* side is exhausted.
    pub fn feof(&self, both: bool) -> bool {
        if both {
            self.lhs_eof && self.rhs_eof
        } else {
            self.lhs_eof || self.rhs_eof
        }
    }

    /// True when both buffer cursors sit on their terminating NUL.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    // --- Line operations (spec §4.3) -----------------------------------

    /// Fill both buffers from their line sources, growing storage as
    /// needed; increments `row_i` and resets both cursors to 0.
    pub fn read_line(&mut self) -> NdiffResult<LineEnd> {
        let mut lhs_buf = Vec::new();
        let mut rhs_buf = Vec::new();
        let lhs_end = self.lhs_source.read_line(&mut lhs_buf)?;
        let rhs_end = self.rhs_source.read_line(&mut rhs_buf)?;
        self.buffers.set_side(Side::Lhs, &lhs_buf);
        self.buffers.set_side(Side::Rhs, &rhs_buf);
        self.buffers.reset_cursors();
        self.row_i += 1;
        self.col_i = 0;
        self.lhs_eof = lhs_end == LineEnd::Eof;
        self.rhs_eof = rhs_end == LineEnd::Eof;
        Ok(self.combined_end())
    }

    /// Discard one logical line from each side without materializing it;
    /// increments `row_i` and resets both cursors to 0.
    pub fn skip_line(&mut self) -> NdiffResult<LineEnd> {
        let lhs_end = self.lhs_source.skip_line()?;
        let rhs_end = self.rhs_source.skip_line()?;
        self.buffers.set_side(Side::Lhs, b"");
        self.buffers.set_side(Side::Rhs, b"");
        self.buffers.reset_cursors();
        self.row_i += 1;
        self.col_i = 0;
        self.lhs_eof = lhs_end == LineEnd::Eof;
        self.rhs_eof = rhs_end == LineEnd::Eof;
        Ok(self.combined_end())
    }

    /// Inject pre-made content (used by tests and by callers that supply
    /// inline comparisons); increments `row_i` and resets both cursors.
    pub fn fill_line(&mut self, lhs_str: &[u8], rhs_str: &[u8]) -> LineEnd {
        self.buffers.set_side(Side::Lhs, lhs_str);
        self.buffers.set_side(Side::Rhs, rhs_str);
        self.buffers.reset_cursors();
        self.row_i += 1;
        self.col_i = 0;
        self.lhs_eof = false;
        self.rhs_eof = false;
        self.combined_end()
    }

    /// Echo the currently held pair to optional output sinks. Unlike the
    /// other three line operations, this does NOT advance `row_i` or reset
    /// cursors — it just observes the buffers as they stand.
    pub fn out_line(
        &self,
        lhs_out: Option<&mut dyn Write>,
        rhs_out: Option<&mut dyn Write>,
    ) -> std::io::Result<LineEnd> {
        if let Some(w) = lhs_out {
            let content = &self.buffers.lhs()[..self.buffers.lhs().len() - 1];
            w.write_all(content)?;
            w.write_all(b"\n")?;
        }
        if let Some(w) = rhs_out {
            let content = &self.buffers.rhs()[..self.buffers.rhs().len() - 1];
            w.write_all(content)?;
            w.write_all(b"\n")?;
        }
        Ok(self.combined_end())
    }

    pub(crate) fn combined_end(&self) -> LineEnd {
        if self.lhs_eof || self.rhs_eof {
            LineEnd::Eof
        } else {
            LineEnd::Newline
        }
    }

    // --- Driver loop (spec §4.8) ----------------------------------------

    /// Runs the per-line orchestration loop until EOF on either side.
    pub fn run(
        &mut self,
        mut lhs_out: Option<&mut dyn Write>,
        mut rhs_out: Option<&mut dyn Write>,
    ) -> NdiffResult<DriverSummary> {
        self.diagnostics.header(&self.lhs_label.clone(), &self.rhs_label.clone(), None);
        let mut summary = DriverSummary::default();

        while !self.feof(false) {
            self.col_i = 0;
            let mut ret_bits_any = false;

            let mut rule = self.lookup_rule(self.row_i + 1, 0)?;

            match rule.action {
                Action::Skip => {
                    self.skip_line()?;
                    summary.rows += 1;
                    continue;
                }
                Action::GotoTag => {
                    self.goto_line(&rule)?;
                }
                Action::GotoNum => {
                    self.goto_num(&rule)?;
                }
                Action::Compare => {
                    self.read_line()?;
                }
            }

            loop {
                let col = self.next_num(&rule);
                if col == 0 {
                    break;
                }
                rule = self.lookup_rule(self.row_i, col)?;
                if rule.flags.sgg {
                    break;
                }
                let bits = self.test_num(&rule);
                if bits.any() {
                    ret_bits_any = true;
                }
                summary.numbers += 1;
            }

            if !ret_bits_any {
                let _ = self.out_line(
                    lhs_out.as_deref_mut(),
                    rhs_out.as_deref_mut(),
                );
            } else {
                summary.diffs += 1;
            }
            summary.rows += 1;
        }

        if self.options.blank {
            self.lhs_source.skip_space()?;
            self.rhs_source.skip_space()?;
        }

        Ok(summary)
    }

    /// Query the rule context, optionally cross-validating against
    /// `get_at` in `check` mode (spec §7.3).
    fn lookup_rule(&mut self, row: usize, col: usize) -> NdiffResult<crate::rule::Rule> {
        let incremental = self.ctx.get_incremental(row, col);
        if self.options.check {
            let at = self.ctx.get_at(row, col);
            let disagree = match (&incremental, &at) {
                (Some(a), Some(b)) => !rules_match(a, b),
                (None, None) => false,
                _ => true,
            };
            if disagree {
                self.diagnostics.warning(&format!(
                    "check mode: rule context disagreement at row {row}, col {col}\n{}",
                    self.ctx.print()
                ));
                return Err(NdiffError::RuleContextDisagreement { row, col });
            }
        }
        incremental.ok_or(NdiffError::NoRule { row, col })
    }

    pub(crate) fn record_diff(&mut self, message: &str, rule: &crate::rule::Rule) {
        self.cnt_i += 1;
        if self.cnt_i <= self.options.keep && !rule.flags.nofail {
            self.diagnostics.warning(message);
        }
        if rule.flags.onfail {
            self.ctx.on_fail(rule);
        }
    }
}

/// Rules are compared structurally for `check`-mode cross-validation: two
/// lookups "agree" when the part of the rule that drives comparison
/// behavior is the same. Register operation ordering and diagnostics
/// metadata (`rule_index`, `source_line`) are not required to match.
fn rules_match(a: &crate::rule::Rule, b: &crate::rule::Rule) -> bool {
    a.action == b.action
        && a.tolerance == b.tolerance
        && a.flags == b.flags
        && a.tag == b.tag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::line_source::StringLineSource;
    use crate::rule::Rule;
    use crate::rule_context::UniformRuleContext;

    fn build_engine(lhs: Vec<&str>, rhs: Vec<&str>, rule: Rule) -> Engine {
        Engine::new(
            Box::new(StringLineSource::new(lhs)),
            Box::new(StringLineSource::new(rhs)),
            Box::new(UniformRuleContext::new(rule)),
            Box::new(CollectingDiagnostics::default()),
            64,
            16,
        )
    }

    #[test]
    fn read_line_resets_cursors_and_advances_row() {
        let mut e = build_engine(vec!["1 2"], vec!["1 2"], Rule::with_abs_tolerance(1e-6));
        e.read_line().unwrap();
        assert_eq!(e.get_info().row, 1);
        assert_eq!(e.buffers.cursor(Side::Lhs), 0);
    }

    #[test]
    fn feof_both_vs_either_differ() {
        let mut e = build_engine(vec!["a"], vec!["a", "b"], Rule::with_abs_tolerance(1e-6));
        e.read_line().unwrap(); // consumes "a"/"a", lhs now exhausted
        assert!(e.feof(false));
        assert!(!e.feof(true));
    }

    #[test]
    fn set_options_rejects_zero_keep() {
        let mut e = build_engine(vec!["a"], vec!["a"], Rule::with_abs_tolerance(1e-6));
        assert!(e.set_options(Some(0), None, None).is_err());
    }

    #[test]
    fn identical_lines_round_trip_with_no_diff() {
        let mut e = build_engine(vec!["x = 1.0"], vec!["x = 1.0"], Rule::with_abs_tolerance(1e-6));
        let summary = e.run(None, None).unwrap();
        assert_eq!(summary.diffs, 0);
    }

    #[test]
    fn diff_cap_limits_emitted_diagnostics_but_not_the_count() {
        let lines: Vec<&str> = std::iter::repeat("1.0").take(10).collect();
        let other: Vec<&str> = std::iter::repeat("2.0").take(10).collect();
        let mut e = build_engine(lines, other, Rule::with_abs_tolerance(1e-9));
        e.set_options(Some(2), None, None).unwrap();
        let summary = e.run(None, None).unwrap();
        assert_eq!(summary.diffs, 10);
        assert_eq!(e.get_info().cnt, 10);
    }

    /// A `RuleContext` keyed by column rather than row, for the `sgg`
    /// group-break test below: column 1 gets an ordinary rule, column 2
    /// onward gets one with `sgg` set.
    struct ColumnSwitchingContext {
        first: Rule,
        rest: Rule,
    }

    impl crate::rule_context::RuleContext for ColumnSwitchingContext {
        fn get_incremental(&mut self, _row: usize, col: usize) -> Option<Rule> {
            Some(if col <= 1 { self.first.clone() } else { self.rest.clone() })
        }
        fn get_at(&self, _row: usize, col: usize) -> Option<Rule> {
            Some(if col <= 1 { self.first.clone() } else { self.rest.clone() })
        }
    }

    #[test]
    fn sgg_breaks_the_column_loop_before_testing_the_new_group() {
        let mut first = Rule::with_abs_tolerance(1e-9);
        first.col = crate::rule::ColumnSlice::full();
        let mut rest = Rule::with_abs_tolerance(1e-9);
        rest.flags.sgg = true;

        let mut e = Engine::new(
            Box::new(StringLineSource::new(["1 999"])),
            Box::new(StringLineSource::new(["1 1"])),
            Box::new(ColumnSwitchingContext { first, rest }),
            Box::new(CollectingDiagnostics::default()),
            64,
            16,
        );
        let summary = e.run(None, None).unwrap();
        // Column 1 ("1" vs "1") matches under `first`; column 2 ("999" vs
        // "1") is never reached by `test_num` because the column loop
        // breaks as soon as it crosses into the `sgg`-marked `rest` rule,
        // so no diff is recorded for the mismatched second column in this
        // pass.
        assert_eq!(summary.diffs, 0);
        assert_eq!(e.get_info().col, 2);
    }

    #[test]
    fn property_a_file_compared_against_itself_never_diffs() {
        use proptest::prelude::*;

        proptest!(|(rows in proptest::collection::vec("[a-z]{1,4} = -?[0-9]{1,4}(\\.[0-9]{1,4})?", 1..6))| {
            let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
            let mut e = build_engine(refs.clone(), refs, Rule::with_abs_tolerance(1e-9));
            let summary = e.run(None, None).unwrap();
            prop_assert_eq!(summary.diffs, 0);
        });
    }
}
