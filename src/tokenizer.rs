//! The tokenizer, `next_num` (spec §4.6): advances both buffer cursors in
//! lockstep to the next pair of numeric spans, or reports a text-level
//! difference, or signals end of line.

use crate::buffers::Side;
use crate::engine::Engine;
use crate::numparse::{is_number, is_number_start};
use crate::rule::Rule;

impl Engine {
    /// Returns `0` at end-of-line or on a reported text diff (`col_i` is
    /// reset to 0 in both cases); otherwise the new 1-based `col_i`.
    pub fn next_num(&mut self, rule: &Rule) -> usize {
        loop {
            if self.both_at_nul() {
                self.col_i = 0;
                return 0;
            }

            if rule.flags.istr {
                self.skip_non_digits_independent(Side::Lhs);
                self.skip_non_digits_independent(Side::Rhs);
            } else {
                self.match_non_numeric_prefix();
                if rule.flags.blank && self.lockstep_mismatch_is_blank() {
                    self.skip_blanks_independent(Side::Lhs);
                    self.skip_blanks_independent(Side::Rhs);
                    continue;
                }
            }

            if self.both_at_nul() {
                self.col_i = 0;
                return 0;
            }

            let lhs_byte = self.buffers.byte_at(Side::Lhs, self.buffers.lhs_i());
            let rhs_byte = self.buffers.byte_at(Side::Rhs, self.buffers.rhs_i());

            if !rule.flags.istr && lhs_byte != rhs_byte {
                // Before declaring a text diff, give `omit` a chance: an
                // identifier immediately followed by the rule's tag on
                // both sides (spec §8 scenario 7, "NaN value" vs
                // "Inf value" under tag = " value") is not a diff at all —
                // skip past the identifier and retry.
                if rule.flags.omit && self.omit_test(rule) {
                    let lhs_end = self.identifier_end(Side::Lhs, rule);
                    let rhs_end = self.identifier_end(Side::Rhs, rule);
                    self.buffers.set_cursor(Side::Lhs, lhs_end);
                    self.buffers.set_cursor(Side::Rhs, rhs_end);
                    continue;
                }

                let lhs_rest = &self.buffers.lhs()[self.buffers.lhs_i()..];
                let rhs_rest = &self.buffers.rhs()[self.buffers.rhs_i()..];
                if !is_number(lhs_rest) || !is_number(rhs_rest) {
                    self.report_text_diff(rule);
                    self.col_i = 0;
                    return 0;
                }
            }

            let lhs_start = crate::numparse::backtrack_number(
                self.buffers.lhs(),
                self.buffers.lhs_i(),
                0,
            );
            let rhs_start = crate::numparse::backtrack_number(
                self.buffers.rhs(),
                self.buffers.rhs_i(),
                0,
            );
            self.buffers.set_cursor(Side::Lhs, lhs_start);
            self.buffers.set_cursor(Side::Rhs, rhs_start);

            let lhs_ok = is_number_start(self.buffers.lhs(), lhs_start, 0, &rule.kept);
            let rhs_ok = is_number_start(self.buffers.rhs(), rhs_start, 0, &rule.kept);

            if lhs_ok && rhs_ok {
                self.col_i += 1;
                self.num_i += 1;
                return self.col_i;
            }

            // Not a true number start: an identifier runs into the digits
            // with no separator (e.g. "item123"). Treat it as an
            // identifier mismatch.
            if rule.flags.istr {
                self.skip_to_separator_independent(Side::Lhs, &rule.kept);
                self.skip_to_separator_independent(Side::Rhs, &rule.kept);
            } else if rule.flags.omit && self.omit_test(rule) {
                let lhs_end = self.identifier_end(Side::Lhs, rule);
                let rhs_end = self.identifier_end(Side::Rhs, rule);
                self.buffers.set_cursor(Side::Lhs, lhs_end);
                self.buffers.set_cursor(Side::Rhs, rhs_end);
            } else {
                self.skip_matching_identifier_prefix();
            }
            // loop back to the top and retry the matching step.
        }
    }

    fn both_at_nul(&self) -> bool {
        self.buffers.byte_at(Side::Lhs, self.buffers.lhs_i()) == 0
            && self.buffers.byte_at(Side::Rhs, self.buffers.rhs_i()) == 0
    }

    /// Advance both cursors together while the bytes match and are not
    /// digits.
    fn match_non_numeric_prefix(&mut self) {
        loop {
            let l = self.buffers.byte_at(Side::Lhs, self.buffers.lhs_i());
            let r = self.buffers.byte_at(Side::Rhs, self.buffers.rhs_i());
            if l == 0 || r == 0 || l != r || l.is_ascii_digit() {
                return;
            }
            self.buffers.set_cursor(Side::Lhs, self.buffers.lhs_i() + 1);
            self.buffers.set_cursor(Side::Rhs, self.buffers.rhs_i() + 1);
        }
    }

    fn lockstep_mismatch_is_blank(&self) -> bool {
        let l = self.buffers.byte_at(Side::Lhs, self.buffers.lhs_i());
        let r = self.buffers.byte_at(Side::Rhs, self.buffers.rhs_i());
        (l != r || l.is_ascii_digit()) && (is_blank(l) || is_blank(r))
    }

    fn skip_blanks_independent(&mut self, side: Side) {
        let mut i = self.buffers.cursor(side);
        while is_blank(self.buffers.byte_at(side, i)) {
            i += 1;
        }
        self.buffers.set_cursor(side, i);
    }

    fn skip_non_digits_independent(&mut self, side: Side) {
        let mut i = self.buffers.cursor(side);
        loop {
            let b = self.buffers.byte_at(side, i);
            if b == 0 || b.is_ascii_digit() {
                break;
            }
            i += 1;
        }
        self.buffers.set_cursor(side, i);
    }

    fn skip_to_separator_independent(&mut self, side: Side, kept: &[u8]) {
        let mut i = self.buffers.cursor(side);
        loop {
            let b = self.buffers.byte_at(side, i);
            if b == 0 || crate::numparse::is_separator(b, kept) {
                break;
            }
            i += 1;
        }
        self.buffers.set_cursor(side, i);
    }

    /// Byte offset of the first separator at or after `side`'s current
    /// cursor — the end of the identifier that starts there.
    fn identifier_end(&self, side: Side, rule: &Rule) -> usize {
        let mut i = self.buffers.cursor(side);
        loop {
            let b = self.buffers.byte_at(side, i);
            if b == 0 || crate::numparse::is_separator(b, &rule.kept) {
                return i;
            }
            i += 1;
        }
    }

    /// The omit test (spec §4.6 step 6 / §8 scenario 7): does the rule's
    /// `tag` appear immediately after the identifier that starts at each
    /// side's current cursor? Framed in the spec as looking "leftward up
    /// to len(tag) bytes" from the point just past the tag — which is
    /// exactly the forward window `[identifier_end, identifier_end +
    /// tag.len())` read from the other direction.
    fn omit_test(&self, rule: &Rule) -> bool {
        if rule.tag.is_empty() {
            return false;
        }
        let check = |buf: &[u8], end: usize| -> bool {
            let window_end = end + rule.tag.len();
            window_end <= buf.len() && &buf[end..window_end] == rule.tag.as_slice()
        };
        check(self.buffers.lhs(), self.identifier_end(Side::Lhs, rule))
            && check(self.buffers.rhs(), self.identifier_end(Side::Rhs, rule))
    }

    /// Advance both cursors together over a shared identifier prefix: bytes
    /// that match and are not separators. Stops at the first divergence
    /// (which the next loop iteration will report as a text diff) or at a
    /// separator on either side.
    fn skip_matching_identifier_prefix(&mut self) {
        loop {
            let l = self.buffers.byte_at(Side::Lhs, self.buffers.lhs_i());
            let r = self.buffers.byte_at(Side::Rhs, self.buffers.rhs_i());
            if l == 0 || r == 0 || l != r {
                return;
            }
            self.buffers.set_cursor(Side::Lhs, self.buffers.lhs_i() + 1);
            self.buffers.set_cursor(Side::Rhs, self.buffers.rhs_i() + 1);
        }
    }

    fn report_text_diff(&mut self, rule: &Rule) {
        let row = self.row_i;
        let lhs_pos = self.buffers.lhs_i();
        let rhs_pos = self.buffers.rhs_i();
        let message = format!(
            "row {row}: text differs at lhs byte {lhs_pos}, rhs byte {rhs_pos}"
        );
        self.record_diff(&message, rule);
        // Advance both cursors one past the mismatch so the driver can make
        // progress next time it is called for this line.
        self.buffers.set_cursor(Side::Lhs, lhs_pos + 1);
        self.buffers.set_cursor(Side::Rhs, rhs_pos + 1);
    }
}

fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::line_source::StringLineSource;
    use crate::rule::Rule;
    use crate::rule_context::UniformRuleContext;

    fn engine_with(lhs: &str, rhs: &str) -> Engine {
        let mut e = Engine::new(
            Box::new(StringLineSource::new([lhs])),
            Box::new(StringLineSource::new([rhs])),
            Box::new(UniformRuleContext::new(Rule::with_abs_tolerance(1e-6))),
            Box::new(CollectingDiagnostics::default()),
            64,
            16,
        );
        e.read_line().unwrap();
        e
    }

    #[test]
    fn identical_line_finds_one_number_column() {
        let mut e = engine_with("x = 1.0", "x = 1.0");
        let rule = Rule::with_abs_tolerance(1e-6);
        assert_eq!(e.next_num(&rule), 1);
    }

    #[test]
    fn pure_text_diff_returns_zero_and_counts_one() {
        let mut e = engine_with("foo bar", "foo baz");
        let rule = Rule::with_abs_tolerance(1e-6);
        assert_eq!(e.next_num(&rule), 0);
        assert_eq!(e.get_info().cnt, 1);
    }

    #[test]
    fn omit_skips_identifier_followed_by_tag() {
        let mut e = engine_with("NaN value", "Inf value");
        let mut rule = Rule::with_abs_tolerance(1e-6);
        rule.flags.omit = true;
        rule.tag = b" value".to_vec();
        // "NaN"/"Inf" are skipped via the omit test; the trailing " value"
        // text then matches in lockstep, so the line ends with no diff
        // and no number found.
        assert_eq!(e.next_num(&rule), 0);
        assert_eq!(e.get_info().cnt, 0);
    }

    #[test]
    fn without_omit_differing_identifier_is_a_text_diff() {
        let mut e = engine_with("NaN value", "Inf value");
        let rule = Rule::with_abs_tolerance(1e-6);
        assert_eq!(e.next_num(&rule), 0);
        assert_eq!(e.get_info().cnt, 1);
    }

    #[test]
    fn istr_mode_scans_to_next_digit_run() {
        let mut e = engine_with("val=42;", "val=42;");
        let mut rule = Rule::with_abs_tolerance(1e-6);
        rule.flags.istr = true;
        assert_eq!(e.next_num(&rule), 1);
    }
}
