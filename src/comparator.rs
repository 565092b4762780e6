//! The comparator, `test_num` (spec §4.7): parses a pair of numeric spans,
//! computes the error vector, checks it against the active rule, updates
//! registers, and advances both cursors past the compared spans.

use crate::buffers::Side;
use crate::engine::Engine;
use crate::numparse::{self, NumShape};
use crate::registers::reserved;
use crate::rule::Rule;

/// The failure bitmask `test_num` returns (spec §7, class 1: "comparison
/// failures"). Each field is one of the historical `{equ, abs, rel, dig,
/// ign}` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffBits {
    pub equ: bool,
    pub abs: bool,
    pub rel: bool,
    pub dig: bool,
    pub ign: bool,
}

impl DiffBits {
    pub fn any(&self) -> bool {
        self.equ || self.abs || self.rel || self.dig || self.ign
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// `10^k` for integer `k`, computed the way the comparator's `pow_dec`
/// needs it (including negative exponents).
pub fn pow10(k: i32) -> f64 {
    10f64.powi(k)
}

struct ParsedSpan {
    shape: NumShape,
    value: f64,
}

fn parse_span(buf: &[u8]) -> ParsedSpan {
    let shape = numparse::parse_number(buf);
    if shape.len == 0 {
        return ParsedSpan { shape, value: 0.0 };
    }
    let mut owned = buf[..shape.len].to_vec();
    numparse::normalize_exponent_marker(&mut owned, &shape);
    // `shape.len` may include a single leading blank before a backtracked
    // sign (`parse_number` mirrors `is_number` there); `str::parse::<f64>`
    // rejects leading whitespace, so trim it before handing the literal off.
    let value = std::str::from_utf8(&owned)
        .ok()
        .map(|s| s.trim_start())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    ParsedSpan { shape, value }
}

impl Engine {
    pub fn test_num(&mut self, rule: &Rule) -> DiffBits {
        let lhs_start = self.buffers.lhs_i();
        let rhs_start = self.buffers.rhs_i();
        let lhs_span = parse_span(&self.buffers.lhs()[lhs_start..]);
        let rhs_span = parse_span(&self.buffers.rhs()[rhs_start..]);

        if lhs_span.shape.len == 0 || rhs_span.shape.len == 0 {
            let mut bits = DiffBits::default();
            if !(rule.flags.ign || rule.flags.istr) {
                bits.ign = true;
                // A missing number is itself a failing compare (the `ign`
                // bit above), so routing it through `record_diff` — which
                // fires `on_fail` once when `rule.flags.onfail` is set — is
                // correct here, same as the tolerance-check failure path
                // below; this is the only place `on_fail` fires for this
                // pair.
                self.record_diff(
                    &format!(
                        "row {}: number missing at lhs byte {lhs_start}, rhs byte {rhs_start}",
                        self.row_i
                    ),
                    rule,
                );
            }
            // Nothing sensible was parsed; advance past whatever was
            // there (at least one byte on each side) so the tokenizer can
            // keep making progress.
            self.buffers
                .set_cursor(Side::Lhs, lhs_start + lhs_span.shape.len.max(1));
            self.buffers
                .set_cursor(Side::Rhs, rhs_start + rhs_span.shape.len.max(1));
            return bits;
        }

        let lhs_literal = if rule.flags.lhs_literal {
            rule.lhs.resolve(&self.regs)
        } else {
            lhs_span.value
        };
        let rhs_literal = if rule.flags.rhs_literal {
            rule.rhs.resolve(&self.regs)
        } else {
            rhs_span.value
        };

        let scl = rule.scl.resolve(&self.regs);
        let off = rule.off.resolve(&self.regs);

        let min_mag = {
            let m = lhs_literal.abs().min(rhs_literal.abs());
            if m == 0.0 {
                1.0
            } else {
                m
            }
        };
        let pow_dec = pow10(-(lhs_span.shape.int_digits.max(rhs_span.shape.int_digits) as i32));

        let (lhs_val, rhs_val) = if rule.flags.swap {
            (rhs_literal, lhs_literal)
        } else {
            (lhs_literal, rhs_literal)
        };

        let dif = lhs_val - rhs_val;
        let err = scl * dif;
        let abs_err = err + off;
        let rel_err = abs_err / min_mag;
        let dig_err = abs_err / (min_mag * pow_dec);

        let mut bits = DiffBits::default();
        let is_float = lhs_span.shape.is_float || rhs_span.shape.is_float;

        if rule.flags.ign {
            // pass
        } else if rule.flags.omit && self.omit_tag_precedes_both(rule, lhs_start, rhs_start) {
            // pass
        } else if rule.flags.equ {
            let lhs_bytes = &self.buffers.lhs()[lhs_start..lhs_start + lhs_span.shape.len];
            let rhs_bytes = &self.buffers.rhs()[rhs_start..rhs_start + rhs_span.shape.len];
            if lhs_span.shape.len != rhs_span.shape.len || lhs_bytes != rhs_bytes {
                bits.equ = true;
            }
        } else {
            let mut checked = DiffBits::default();

            if rule.tolerance.abs {
                checked.abs = true;
                let upper = rule.abs.upper.resolve(&self.regs);
                let lower = rule.abs.effective_lower(&self.regs, upper);
                bits.abs = abs_err > upper || abs_err < lower;
            }
            if rule.tolerance.rel {
                checked.rel = true;
                let upper = rule.rel.upper.resolve(&self.regs);
                let lower = rule.rel.effective_lower(&self.regs, upper);
                bits.rel = rel_err > upper || rel_err < lower;
            }
            if rule.tolerance.dig && is_float {
                checked.dig = true;
                let upper = rule.dig.upper.resolve(&self.regs);
                let lower = rule.dig.effective_lower(&self.regs, upper);
                bits.dig = dig_err > upper || dig_err < lower;
            }

            if rule.tolerance.any {
                let requested_all_failed = (!checked.abs || bits.abs)
                    && (!checked.rel || bits.rel)
                    && (!checked.dig || bits.dig)
                    && bits.any();
                if !requested_all_failed {
                    bits.clear();
                }
            }
        }

        if bits.any() {
            self.record_diff(
                &format!(
                    "row {row} col {col}: lhs={lhs_val} rhs={rhs_val} dif={dif} abs_err={abs_err} rel_err={rel_err} dig_err={dig_err} bits={bits:?} rule#{idx} line {line}",
                    row = self.row_i,
                    col = self.col_i,
                    idx = rule.rule_index,
                    line = rule.source_line,
                ),
                rule,
            );
        }

        if !bits.any() || rule.flags.save {
            let (r1, r2) = if rule.flags.swap {
                (rhs_val, lhs_val)
            } else {
                (lhs_val, rhs_val)
            };
            self.regs.set(reserved::LHS, r1);
            self.regs.set(reserved::RHS, r2);
            self.regs.set(reserved::DIF, dif);
            self.regs.set(reserved::ERR, err);
            self.regs.set(reserved::ABS_ERR, abs_err);
            self.regs.set(reserved::REL_ERR, rel_err);
            self.regs.set(reserved::DIG_ERR, dig_err);
            self.regs.set(reserved::MIN_MAG, min_mag);
            self.regs.set(reserved::POW_DEC, pow_dec);

            for op in &rule.ops {
                self.regs.eval(op.dst, op.src, op.src2, op.op);
                if rule.flags.trace_r {
                    self.diagnostics.trace(&format!(
                        "reg[{}] := reg[{}] {:?} reg[{}] -> {}",
                        op.dst,
                        op.src,
                        op.op,
                        op.src2,
                        self.regs.get(op.dst, 0.0)
                    ));
                }
            }
        }

        // `on_fail` (spec §4.7 step 8) is fired by `record_diff` above when
        // this pair failed and `rule.flags.onfail` is set — not fired again
        // here, so the hook runs exactly once per failing compare.

        self.buffers
            .set_cursor(Side::Lhs, lhs_start + lhs_span.shape.len);
        self.buffers
            .set_cursor(Side::Rhs, rhs_start + rhs_span.shape.len);

        bits
    }

    /// The comparator's own omit check (spec §4.7 step 5), distinct from
    /// the tokenizer's identifier-level one in `next_num`: does `rule.tag`
    /// immediately precede both numeric spans?
    fn omit_tag_precedes_both(&self, rule: &Rule, lhs_pos: usize, rhs_pos: usize) -> bool {
        if rule.tag.is_empty() {
            return false;
        }
        let check = |buf: &[u8], pos: usize| -> bool {
            pos >= rule.tag.len() && &buf[pos - rule.tag.len()..pos] == rule.tag.as_slice()
        };
        check(self.buffers.lhs(), lhs_pos) && check(self.buffers.rhs(), rhs_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::line_source::StringLineSource;
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
    fn identical_numbers_pass() {
        let mut e = engine_with("1.0", "1.0");
        let rule = Rule::with_abs_tolerance(1e-6);
        e.next_num(&rule);
        let bits = e.test_num(&rule);
        assert!(!bits.any());
    }

    #[test]
    fn a_negative_number_preceded_by_a_blank_sign_does_not_report_a_missing_number() {
        // Regression for the tokenizer committing its cursor onto the blank
        // that precedes a backtracked sign: "a = -5" against itself must
        // not be misparsed as two missing numbers.
        let mut e = engine_with("a = -5", "a = -5");
        let rule = Rule::with_abs_tolerance(1e-9);
        let col = e.next_num(&rule);
        assert_eq!(col, 1);
        let bits = e.test_num(&rule);
        assert!(!bits.any());
        assert_eq!(e.regs.get(reserved::LHS, 0.0), -5.0);
    }

    #[test]
    fn float_drift_within_abs_tolerance_passes() {
        let mut e = engine_with("3.1415926", "3.1415930");
        let mut rule = Rule::with_abs_tolerance(1e-6);
        rule.abs = crate::rule::ToleranceBound::symmetric(1e-6);
        e.next_num(&rule);
        let bits = e.test_num(&rule);
        assert!(!bits.any());
        assert!(e.regs.get(reserved::ABS_ERR, 0.0).abs() < 1e-6);
    }

    #[test]
    fn float_drift_outside_rel_tolerance_fails() {
        let mut e = engine_with("1.0e3", "1.0e6");
        let mut rule = Rule::default();
        rule.tolerance.rel = true;
        rule.rel = crate::rule::ToleranceBound::symmetric(1e-3);
        e.next_num(&rule);
        let bits = e.test_num(&rule);
        assert!(bits.rel);
    }

    #[test]
    fn strict_equality_fails_on_differing_representation() {
        let mut e = engine_with("1.0", "1.00");
        let mut rule = Rule::default();
        rule.flags.equ = true;
        e.next_num(&rule);
        let bits = e.test_num(&rule);
        assert!(bits.equ);
    }

    #[test]
    fn integer_column_skips_dig_check() {
        let mut e = engine_with("42", "43");
        let mut rule = Rule::default();
        rule.tolerance.dig = true;
        rule.dig = crate::rule::ToleranceBound::symmetric(0.1);
        e.next_num(&rule);
        let bits = e.test_num(&rule);
        assert!(!bits.any());
    }

    #[test]
    fn save_flag_writes_registers_on_a_passing_pair() {
        let mut e = engine_with("2.0", "3.0");
        let mut rule = Rule::with_abs_tolerance(100.0);
        rule.flags.save = true;
        rule.ops.push(crate::rule::RegisterOp {
            dst: 10,
            src: reserved::LHS,
            src2: reserved::RHS,
            op: crate::registers::RegOp::Add,
        });
        e.next_num(&rule);
        e.test_num(&rule);
        assert_eq!(e.regs.get(10, 0.0), 5.0);
    }

    #[test]
    fn register_save_with_chained_arithmetic_ops() {
        // Spec §8 scenario 8: R10 := R1 + R2, R11 := R10 / 2. Register
        // operations take two register operands, so the divisor "2" is
        // first stashed in a scratch register (20) the rule's op list reads
        // from, rather than being a literal the `eval` closed set supports.
        let mut e = engine_with("2.0", "3.0");
        e.regs.set(20, 2.0);
        let mut rule = Rule::with_abs_tolerance(100.0);
        rule.flags.save = true;
        rule.ops.push(crate::rule::RegisterOp {
            dst: 10,
            src: reserved::LHS,
            src2: reserved::RHS,
            op: crate::registers::RegOp::Add,
        });
        rule.ops.push(crate::rule::RegisterOp {
            dst: 11,
            src: 10,
            src2: 20,
            op: crate::registers::RegOp::Div,
        });
        e.next_num(&rule);
        e.test_num(&rule);
        assert_eq!(e.regs.get(10, 0.0), 5.0); // lhs + rhs
        assert_eq!(e.regs.get(11, 0.0), 2.5); // (lhs + rhs) / 2
    }

    #[test]
    fn any_mode_passes_if_one_metric_is_within_bound() {
        let mut e = engine_with("100000.0", "100000.001");
        let mut rule = Rule::default();
        rule.tolerance.abs = true;
        rule.tolerance.rel = true;
        rule.tolerance.any = true;
        rule.abs = crate::rule::ToleranceBound::symmetric(0.0001);
        rule.rel = crate::rule::ToleranceBound::symmetric(1e-3);
        e.next_num(&rule);
        let bits = e.test_num(&rule);
        // abs_err (~0.001) exceeds the abs bound but rel_err (~1e-8) is
        // comfortably inside the rel bound; `any` means one passing metric
        // is enough.
        assert!(!bits.any());
    }

    #[test]
    fn pow10_matches_float_powi() {
        for k in -20..20 {
            assert_eq!(pow10(k), 10f64.powi(k));
        }
    }

    #[test]
    fn property_pow10_is_bit_for_bit_with_powi_across_the_full_range() {
        use proptest::prelude::*;

        proptest!(|(k in -100i32..100)| {
            prop_assert_eq!(pow10(k).to_bits(), 10f64.powi(k).to_bits());
        });
    }

    #[test]
    fn property_comparing_identical_numeric_literals_never_diffs() {
        use proptest::prelude::*;

        proptest!(|(lit in "-?[0-9]{1,6}(\\.[0-9]{1,6})?")| {
            let mut e = engine_with(&lit, &lit);
            let rule = Rule::with_abs_tolerance(1e-9);
            e.next_num(&rule);
            let bits = e.test_num(&rule);
            prop_assert!(!bits.any());
        });
    }
}
