//! Rule (`constraint`) data: the per-(row, column) configuration the engine
//! consumes. Per the spec's design notes (§9), the source's single bitmask
//! `eps.cmd` is decomposed here into orthogonal parts: an `Action` variant,
//! a `Tolerance` composition, and a `Flags` struct of independent booleans.
//! The low-level bitmask constants are confined to `config_flags` for
//! callers (e.g. a future rule-file parser) that need to round-trip the
//! historical numeric encoding; the engine itself never looks at a bitmask.

use crate::registers::RegOp;

/// What the driver should do with the current row before any column-level
/// comparison happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    Compare,
    Skip,
    GotoTag,
    GotoNum,
}

/// Which tolerance metrics are checked, and how they combine. `any` turns a
/// conjunction of the requested metrics into a disjunction (spec §4.7
/// step 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tolerance {
    pub abs: bool,
    pub rel: bool,
    pub dig: bool,
    pub any: bool,
}

impl Tolerance {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        !self.abs && !self.rel && !self.dig
    }
}

/// Independent behavioral flags, one bool per spec §3 bitmask bit not
/// otherwise captured by `Action`/`Tolerance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    /// `trace`: emit a trace line for this rule's activity.
    pub trace: bool,
    /// `traceR`: emit a trace line per register operation.
    pub trace_r: bool,
    /// `equ`: strict equality of numeric spans.
    pub equ: bool,
    /// `ign`: ignore this diff unconditionally.
    pub ign: bool,
    /// `omit`: ignore when preceded by `tag`.
    pub omit: bool,
    /// `istr`: search digits only, skipping non-digit bytes.
    pub istr: bool,
    /// `nofail`: compute the diff but do not emit a diagnostic.
    pub nofail: bool,
    /// `onfail`: fire the rule context's failure hook on a diff.
    pub onfail: bool,
    /// `lhs`/`rhs`: use the literal operand instead of the parsed value.
    pub lhs_literal: bool,
    pub rhs_literal: bool,
    /// `swap`: exchange lhs/rhs after parsing (used by `goto_num`'s second
    /// pass).
    pub swap: bool,
    /// `save`: always write registers, even when the pair passed.
    pub save: bool,
    /// `sgg`: marks the first rule of a new logical section; the driver's
    /// column loop breaks out when it crosses into such a rule.
    pub sgg: bool,
    /// `gto_reg`: `goto`/`gonum` should read the target tag from a
    /// register rather than from the rule's literal `tag` bytes.
    pub gto_reg: bool,
    /// `blank`: consume runs of blanks on both sides as one step.
    pub blank: bool,
}

/// A bound with an optional register override: `reg_getval(reg, literal)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundOperand {
    pub literal: f64,
    pub reg: usize,
}

impl BoundOperand {
    pub fn new(literal: f64) -> Self {
        Self { literal, reg: 0 }
    }

    pub fn with_reg(literal: f64, reg: usize) -> Self {
        Self { literal, reg }
    }

    pub fn resolve(&self, regs: &crate::registers::RegisterFile) -> f64 {
        regs.get(self.reg, self.literal)
    }
}

/// Upper/lower bound pair for one tolerance metric. When only `upper` is
/// configured the lower bound defaults to `-upper` (spec §4.7 step 6).
#[derive(Debug, Clone, Copy, Default)]
pub struct ToleranceBound {
    pub upper: BoundOperand,
    pub lower: Option<BoundOperand>,
}

impl ToleranceBound {
    pub fn symmetric(upper: f64) -> Self {
        Self {
            upper: BoundOperand::new(upper),
            lower: None,
        }
    }

    pub fn effective_lower(&self, regs: &crate::registers::RegisterFile, upper_val: f64) -> f64 {
        match &self.lower {
            Some(b) => b.resolve(regs),
            None => -upper_val,
        }
    }
}

/// A column selector: a range with optional stride, e.g. "every 3rd column
/// from 2 to 20".
#[derive(Debug, Clone, Copy)]
pub struct ColumnSlice {
    pub start: usize,
    pub end: Option<usize>,
    pub stride: usize,
    pub full: bool,
}

impl ColumnSlice {
    pub fn full() -> Self {
        Self {
            start: 1,
            end: None,
            stride: 1,
            full: true,
        }
    }

    pub fn range(start: usize, end: Option<usize>, stride: usize) -> Self {
        Self {
            start,
            end,
            stride: stride.max(1),
            full: false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn is_element(&self, col: usize) -> bool {
        if self.full {
            return true;
        }
        if col < self.start {
            return false;
        }
        if let Some(end) = self.end {
            if col > end {
                return false;
            }
        }
        (col - self.start) % self.stride == 0
    }
}

/// One entry of a rule's register-operation list: `dst := src op src2`.
#[derive(Debug, Clone, Copy)]
pub struct RegisterOp {
    pub dst: usize,
    pub src: usize,
    pub src2: usize,
    pub op: RegOp,
}

/// A fully resolved rule for one (row, column).
#[derive(Debug, Clone)]
pub struct Rule {
    pub action: Action,
    pub tolerance: Tolerance,
    pub flags: Flags,
    pub col: ColumnSlice,

    pub abs: ToleranceBound,
    pub rel: ToleranceBound,
    pub dig: ToleranceBound,

    pub scl: BoundOperand,
    pub off: BoundOperand,

    pub lhs: BoundOperand,
    pub rhs: BoundOperand,

    /// Byte string used by `goto`, `gonum`, and `omit`.
    pub tag: Vec<u8>,
    /// Register index to read the tag from when `flags.gto_reg` is set.
    pub gto_reg_idx: usize,

    pub ops: Vec<RegisterOp>,

    /// Characters besides alphanumerics that do NOT count as separators
    /// (spec §4.1's "kept" set).
    pub kept: Vec<u8>,

    /// The rule's 1-based index/ordinal in its source rule list, and the
    /// line of the configuration file it came from — carried only for
    /// diagnostics (spec §4.7 step 8).
    pub rule_index: usize,
    pub source_line: usize,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            action: Action::default(),
            tolerance: Tolerance::default(),
            flags: Flags::default(),
            col: ColumnSlice::full(),
            abs: ToleranceBound::default(),
            rel: ToleranceBound::default(),
            dig: ToleranceBound::default(),
            scl: BoundOperand::new(1.0),
            off: BoundOperand::new(0.0),
            lhs: BoundOperand::default(),
            rhs: BoundOperand::default(),
            tag: Vec::new(),
            gto_reg_idx: 0,
            ops: Vec::new(),
            kept: Vec::new(),
            rule_index: 0,
            source_line: 0,
        }
    }
}

impl Rule {
    /// A rule that compares with an absolute tolerance of `upper` applied
    /// symmetrically; the common case exercised by tests and by the CLI's
    /// `UniformRuleContext`.
    pub fn with_abs_tolerance(upper: f64) -> Self {
        Self {
            tolerance: Tolerance {
                abs: true,
                ..Tolerance::default()
            },
            abs: ToleranceBound::symmetric(upper),
            ..Self::default()
        }
    }
}

/// Bitmask constants matching the historical `eps.cmd` encoding, kept only
/// for a configuration-file parser (out of scope here) to translate to/from
/// a `Rule`. The engine never reads these.
pub mod config_flags {
    pub const SKIP: u32 = 1 << 0;
    pub const GOTO: u32 = 1 << 1;
    pub const GONUM: u32 = 1 << 2;
    pub const TRACE: u32 = 1 << 3;
    pub const TRACE_R: u32 = 1 << 4;
    pub const EQU: u32 = 1 << 5;
    pub const ABS: u32 = 1 << 6;
    pub const REL: u32 = 1 << 7;
    pub const DIG: u32 = 1 << 8;
    pub const IGN: u32 = 1 << 9;
    pub const OMIT: u32 = 1 << 10;
    pub const ISTR: u32 = 1 << 11;
    pub const ANY: u32 = 1 << 12;
    pub const NOFAIL: u32 = 1 << 13;
    pub const ONFAIL: u32 = 1 << 14;
    pub const LHS: u32 = 1 << 15;
    pub const RHS: u32 = 1 << 16;
    pub const SWAP: u32 = 1 << 17;
    pub const SAVE: u32 = 1 << 18;
    pub const SGG: u32 = 1 << 19;
    pub const GTO_REG: u32 = 1 << 20;
    pub const DRA: u32 = DIG | REL | ABS;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_slice_full_matches_everything() {
        let c = ColumnSlice::full();
        assert!(c.is_element(1));
        assert!(c.is_element(9999));
    }

    #[test]
    fn column_slice_stride_selects_every_nth() {
        let c = ColumnSlice::range(2, Some(10), 3);
        assert!(c.is_element(2));
        assert!(c.is_element(5));
        assert!(c.is_element(8));
        assert!(!c.is_element(3));
        assert!(!c.is_element(11));
    }

    #[test]
    fn single_upper_bound_implies_symmetric_lower() {
        let regs = crate::registers::RegisterFile::new(16);
        let b = ToleranceBound::symmetric(1e-6);
        let upper = b.upper.resolve(&regs);
        assert_eq!(b.effective_lower(&regs, upper), -1e-6);
    }
}
