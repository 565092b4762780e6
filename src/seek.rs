//! Seek operations (spec §4.4/§4.5): `goto_line` advances each side
//! independently until a tag substring is found; `goto_num` advances each
//! side until a number in the rule's target column equals the tag.
//!
//! Per the design notes (§9), `goto_num` does not alias the engine's own
//! line buffers with the tag the way the historical implementation's
//! save/restore dance does. Instead each candidate line is checked with a
//! throwaway scratch `Engine` (`probe_column_match`) that runs the real
//! tokenizer/comparator against the candidate and the tag in isolation,
//! sharing nothing with `self` but the register count.

use crate::buffers::Side;
use crate::diagnostics::CollectingDiagnostics;
use crate::engine::Engine;
use crate::error::NdiffResult;
use crate::line_source::{LineEnd, StringLineSource};
use crate::rule::Rule;
use crate::rule_context::UniformRuleContext;

impl Engine {
    /// Advance each side, reading lines independently, until a line
    /// containing the rule's tag as a substring is found on that side (or
    /// EOF). `row_i` advances by the lesser of the two per-side line
    /// counts; the buffers end up holding each side's matched line.
    pub fn goto_line(&mut self, rule: &Rule) -> NdiffResult<LineEnd> {
        let tag = self.effective_tag_bytes(rule);

        let (lhs_buf, lhs_lines, lhs_hit_eof) = {
            let mut buf = Vec::new();
            let mut lines = 0usize;
            let mut hit_eof = false;
            loop {
                buf.clear();
                let end = self.lhs_source.read_line(&mut buf)?;
                lines += 1;
                if contains_subslice(&buf, &tag) {
                    break;
                }
                if end == LineEnd::Eof {
                    hit_eof = true;
                    break;
                }
            }
            (buf, lines, hit_eof)
        };

        let (rhs_buf, rhs_lines, rhs_hit_eof) = {
            let mut buf = Vec::new();
            let mut lines = 0usize;
            let mut hit_eof = false;
            loop {
                buf.clear();
                let end = self.rhs_source.read_line(&mut buf)?;
                lines += 1;
                if contains_subslice(&buf, &tag) {
                    break;
                }
                if end == LineEnd::Eof {
                    hit_eof = true;
                    break;
                }
            }
            (buf, lines, hit_eof)
        };

        self.buffers.set_side(Side::Lhs, &lhs_buf);
        self.buffers.set_side(Side::Rhs, &rhs_buf);
        self.buffers.reset_cursors();
        self.row_i += lhs_lines.min(rhs_lines);
        self.col_i = 0;
        self.lhs_eof = lhs_hit_eof;
        self.rhs_eof = rhs_hit_eof;

        Ok(self.combined_end())
    }

    /// Advance each side until a number in the rule's target column equals
    /// the tag's numeric value, under the rule's own tolerance. The second
    /// (rhs) pass runs with `swap` set, per spec §4.5.
    pub fn goto_num(&mut self, rule: &Rule) -> NdiffResult<LineEnd> {
        if rule.flags.equ && rule.col.is_full() {
            return self.goto_line(rule);
        }

        let tag = self.effective_tag_bytes(rule);

        let (lhs_buf, lhs_lines, lhs_hit_eof) = {
            let mut buf = Vec::new();
            let mut lines = 0usize;
            let mut hit_eof = false;
            loop {
                buf.clear();
                let end = self.lhs_source.read_line(&mut buf)?;
                lines += 1;
                if self.probe_column_match(&buf, &tag, rule, false) {
                    break;
                }
                if end == LineEnd::Eof {
                    hit_eof = true;
                    break;
                }
            }
            (buf, lines, hit_eof)
        };

        let (rhs_buf, rhs_lines, rhs_hit_eof) = {
            let mut buf = Vec::new();
            let mut lines = 0usize;
            let mut hit_eof = false;
            loop {
                buf.clear();
                let end = self.rhs_source.read_line(&mut buf)?;
                lines += 1;
                if self.probe_column_match(&buf, &tag, rule, true) {
                    break;
                }
                if end == LineEnd::Eof {
                    hit_eof = true;
                    break;
                }
            }
            (buf, lines, hit_eof)
        };

        self.buffers.set_side(Side::Lhs, &lhs_buf);
        self.buffers.set_side(Side::Rhs, &rhs_buf);
        self.buffers.reset_cursors();
        self.row_i += lhs_lines.min(rhs_lines);
        self.col_i = 0;
        self.lhs_eof = lhs_hit_eof;
        self.rhs_eof = rhs_hit_eof;

        Ok(self.combined_end())
    }

    fn effective_tag_bytes(&self, rule: &Rule) -> Vec<u8> {
        if rule.flags.gto_reg {
            let v = self.regs.get(rule.gto_reg_idx, 0.0);
            format!("{v}").into_bytes()
        } else {
            rule.tag.clone()
        }
    }

    /// Run a throwaway scratch engine over `line` vs `tag` to see whether a
    /// number in the rule's target column matches, without touching `self`'s
    /// own buffers or registers.
    fn probe_column_match(&self, line: &[u8], tag: &[u8], rule: &Rule, swap: bool) -> bool {
        let mut probe_rule = rule.clone();
        probe_rule.flags.swap = swap;
        let mut scratch = Engine::new(
            Box::new(StringLineSource::new([line.to_vec()])),
            Box::new(StringLineSource::new([tag.to_vec()])),
            Box::new(UniformRuleContext::new(probe_rule.clone())),
            Box::new(CollectingDiagnostics::default()),
            line.len().max(tag.len()) + 1,
            self.regs.len(),
        );
        if scratch.read_line().is_err() {
            return false;
        }
        loop {
            let col = scratch.next_num(&probe_rule);
            if col == 0 {
                return false;
            }
            if !probe_rule.col.is_element(col) {
                continue;
            }
            return !scratch.test_num(&probe_rule).any();
        }
    }
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics as Collecting;
    use crate::rule_context::UniformRuleContext as Uniform;

    fn build_engine(lhs: Vec<&str>, rhs: Vec<&str>, rule: Rule) -> Engine {
        Engine::new(
            Box::new(StringLineSource::new(lhs)),
            Box::new(StringLineSource::new(rhs)),
            Box::new(Uniform::new(rule)),
            Box::new(Collecting::default()),
            64,
            16,
        )
    }

    #[test]
    fn goto_line_advances_row_by_the_lesser_side_count() {
        let mut rule = Rule::default();
        rule.tag = b"TAG".to_vec();
        let mut e = build_engine(vec!["a", "b", "TAG"], vec!["p", "q", "r", "TAG"], rule.clone());
        e.goto_line(&rule).unwrap();
        assert_eq!(e.get_info().row, 3);
        assert_eq!(&e.buffers.lhs()[..3], b"TAG");
        assert_eq!(&e.buffers.rhs()[..3], b"TAG");
    }

    #[test]
    fn goto_num_finds_matching_column_value_on_each_side() {
        let mut rule = Rule::with_abs_tolerance(1e-9);
        rule.tag = b"2.0".to_vec();
        let mut e = build_engine(
            vec!["1.0", "2.0", "3.0"],
            vec!["5.0", "2.0", "9.0"],
            rule.clone(),
        );
        e.goto_num(&rule).unwrap();
        assert_eq!(e.get_info().row, 2);
    }

    #[test]
    fn goto_num_with_equ_and_full_column_delegates_to_goto_line() {
        let mut rule = Rule::default();
        rule.flags.equ = true;
        rule.tag = b"TAG".to_vec();
        let mut e = build_engine(vec!["x", "TAG"], vec!["y", "z", "TAG"], rule.clone());
        e.goto_num(&rule).unwrap();
        assert_eq!(e.get_info().row, 2);
    }
}
