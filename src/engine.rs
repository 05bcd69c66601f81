//! Calculator input state machine.
//!
//! The engine consumes one keypad event at a time (digit, decimal point,
//! sign toggle, square root, operator, equals, clear) and keeps a bounded
//! stack of three operand levels that implements operator precedence:
//!
//! - Level 0: the running total / final result.
//! - Level 1: the default lane (add/subtract) and its pending operator.
//! - Level 2: the priority lane (multiply/divide) and its pending operator.
//!
//! `a + b * c` parks `a + b` at levels 0/1, promotes to level 2 for the
//! multiplication, and collapses back down when an add/subtract or equals
//! arrives, so the priority lane is evaluated first. Same-precedence chains
//! evaluate left to right as each operator is pressed.
//!
//! Division by zero and square roots of negative numbers put the engine in
//! a sticky error state: the display pins to the error token and every key
//! except clear is inert until clear restores the initial state.

use serde::Serialize;

use crate::error::{CalcError, CalcResult};
use crate::format::format_number;
use crate::key::Key;

/// Operand levels: running total, default lane, priority lane.
const LEVELS: usize = 3;

/// Display text used for the error state unless overridden.
pub const DEFAULT_ERROR_TOKEN: &str = "error";

/// Arithmetic operator selected on the keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    /// Apply the operator, rejecting division by zero.
    fn apply(self, lhs: f64, rhs: f64) -> CalcResult<f64> {
        match self {
            Operator::Add => Ok(lhs + rhs),
            Operator::Subtract => Ok(lhs - rhs),
            Operator::Multiply => Ok(lhs * rhs),
            Operator::Divide => {
                if rhs == 0.0 {
                    Err(CalcError::DivisionByZero)
                } else {
                    Ok(lhs / rhs)
                }
            }
        }
    }

    /// True for the default-lane operators (add/subtract).
    fn is_additive(self) -> bool {
        matches!(self, Operator::Add | Operator::Subtract)
    }

    /// Keypad symbol for this operator.
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }
}

/// Label shown on the clear button.
///
/// `AllClear` ("AC") means the machine is fully cleared; `Clear` ("C")
/// means there is user input that a press would wipe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearLabel {
    AllClear,
    Clear,
}

impl ClearLabel {
    /// Button text for this label.
    pub fn text(self) -> &'static str {
        match self {
            ClearLabel::AllClear => "AC",
            ClearLabel::Clear => "C",
        }
    }
}

/// Fractional-entry cursor, present only while a decimal point is active.
#[derive(Debug, Clone, Copy, Serialize)]
struct DecimalEntry {
    /// Digits typed after the point.
    place: u32,
    /// True while only zeros have followed the point; keeps the literal
    /// "3." / "3.00" rendering alive until a nonzero digit lands.
    trailing_zero: bool,
}

/// Full dump of engine state, for diagnostics and logging.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub error: bool,
    pub input_active: bool,
    pub user_provided: bool,
    pub level: usize,
    pub registers: [f64; LEVELS],
    pub operators: [Option<Operator>; LEVELS],
    pub last_operator: Option<Operator>,
    pub last_operand: f64,
    pub decimal_place: Option<u32>,
    pub decimal_trailing_zero: Option<bool>,
    pub display: String,
}

/// Four-function calculator engine.
///
/// One instance per session; every keypad event is a synchronous call that
/// fully updates the state and the rendered display before returning.
#[derive(Debug)]
pub struct Engine {
    /// Sticky error flag; only `clear` resets it.
    error: bool,
    /// While true, digits continue the current number; while false, the
    /// next digit or decimal point starts a fresh calculation.
    input_active: bool,
    /// Whether the register at the current level holds typed input, as
    /// opposed to a freshly-zeroed placeholder.
    user_provided: bool,
    level: usize,
    registers: [f64; LEVELS],
    operators: [Option<Operator>; LEVELS],
    /// Most recent operator and operand typed, replayed by consecutive
    /// equals presses.
    last_operator: Option<Operator>,
    last_operand: f64,
    decimal: Option<DecimalEntry>,
    clear_label: ClearLabel,
    display: String,
    error_token: String,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine at the initial state.
    pub fn new() -> Self {
        Self::with_error_token(DEFAULT_ERROR_TOKEN)
    }

    /// Create an engine that displays `token` while in the error state.
    pub fn with_error_token(token: &str) -> Self {
        let mut engine = Self {
            error: false,
            input_active: true,
            user_provided: false,
            level: 0,
            registers: [0.0; LEVELS],
            operators: [None; LEVELS],
            last_operator: None,
            last_operand: 0.0,
            decimal: None,
            clear_label: ClearLabel::AllClear,
            display: String::new(),
            error_token: token.to_string(),
        };
        engine.update_display();
        engine
    }

    /// The rendered display text after the most recent event.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// The pending operator at the current level, for button highlighting.
    pub fn highlighted_operator(&self) -> Option<Operator> {
        self.operators[self.level]
    }

    /// The current clear-button label.
    pub fn clear_label(&self) -> ClearLabel {
        self.clear_label
    }

    /// Whether the engine is in the error state.
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Dispatch a keypad event to the matching operation.
    pub fn press(&mut self, key: Key) {
        match key {
            Key::Digit(digit) => self.digit(digit),
            Key::Point => self.decimal_point(),
            Key::ToggleSign => self.change_sign(),
            Key::SquareRoot => self.square_root(),
            Key::Op(op) => self.operator(op),
            Key::Equals => self.equals(),
            Key::Clear => self.clear(),
        }
    }

    /// Append a digit (0-9) to the number being entered.
    ///
    /// Entry is magnitude-first: a negated register keeps accumulating
    /// negative digits. The typed value is remembered as the replay operand
    /// for consecutive equals presses.
    pub fn digit(&mut self, digit: u8) {
        debug_assert!(digit <= 9, "keypad digits are 0-9");
        if self.error {
            return;
        }
        if !self.input_active {
            self.reset_levels();
        }

        if digit != 0 {
            self.user_provided = true;
            self.clear_label = ClearLabel::Clear;
        }

        let value = f64::from(digit);
        let sign = if self.registers[self.level].is_sign_negative() {
            -1.0
        } else {
            1.0
        };

        if let Some(entry) = self.decimal.as_mut() {
            entry.place += 1;
            if digit != 0 {
                entry.trailing_zero = false;
            }
            let scale = 10f64.powi(-(entry.place as i32));
            self.registers[self.level] += sign * value * scale;
        } else {
            self.registers[self.level] = self.registers[self.level] * 10.0 + sign * value;
        }

        self.last_operand = self.registers[self.level];
        self.update_display();
    }

    /// Start fractional entry for the current number.
    ///
    /// No-op while a decimal point is already active. Marks the register as
    /// user-provided without changing its value.
    pub fn decimal_point(&mut self) {
        if self.error || self.decimal.is_some() {
            return;
        }
        if !self.input_active {
            self.reset_levels();
        }
        self.decimal = Some(DecimalEntry {
            place: 0,
            trailing_zero: true,
        });
        self.user_provided = true;
        self.clear_label = ClearLabel::Clear;
        self.update_display();
    }

    /// Negate the current register.
    ///
    /// While input is active the remembered replay operand is negated too,
    /// so a sign change typed before equals replays with the corrected sign.
    pub fn change_sign(&mut self) {
        if self.error {
            return;
        }
        self.registers[self.level] *= -1.0;
        if self.input_active {
            self.last_operand *= -1.0;
        }
        self.user_provided = true;
        self.clear_label = ClearLabel::Clear;
        self.update_display();
    }

    /// Replace the current register with its square root.
    ///
    /// A negative register raises the domain error.
    pub fn square_root(&mut self) {
        if self.error {
            return;
        }
        if self.registers[self.level] < 0.0 {
            self.throw_error(CalcError::NegativeSquareRoot);
            return;
        }
        self.registers[self.level] = self.registers[self.level].sqrt();
        self.update_display();
    }

    /// Choose an operator, finalizing or promoting lanes as precedence
    /// requires.
    ///
    /// At level 2 the priority lane is finalized first; an add/subtract also
    /// collapses the default lane into the running total. At level 1 a
    /// multiply/divide on top of a pending add/subtract promotes to the
    /// priority lane instead of finalizing; same-precedence chains finalize
    /// left to right. At level 0 the default lane opens.
    pub fn operator(&mut self, op: Operator) {
        if self.error {
            return;
        }
        if let Err(error) = self.apply_operator(op) {
            self.throw_error(error);
        }
    }

    fn apply_operator(&mut self, op: Operator) -> CalcResult<()> {
        match self.level {
            2 => {
                self.finalize()?;
                if op.is_additive() {
                    self.level_down();
                    self.finalize()?;
                }
            }
            1 => {
                let pending_additive = self.operators[1].map_or(false, Operator::is_additive);
                if pending_additive && !op.is_additive() {
                    self.level = 2;
                } else {
                    self.finalize()?;
                }
            }
            _ => self.level = 1,
        }

        self.input_active = true;
        self.reset_input();
        self.operators[self.level] = Some(op);
        self.last_operator = Some(op);
        self.update_display();
        Ok(())
    }

    /// Finalize the pending operations down to the running total.
    ///
    /// With a typed operand the current lane is applied as entered; with no
    /// new operand the last typed operator/operand pair is replayed, which
    /// makes consecutive equals presses repeat the last operation.
    pub fn equals(&mut self) {
        if self.error {
            return;
        }
        if let Err(error) = self.apply_equals() {
            self.throw_error(error);
            return;
        }
        self.reset_input();
        self.update_display();
    }

    fn apply_equals(&mut self) -> CalcResult<()> {
        match self.level {
            2 => {
                if self.user_provided {
                    self.finalize()?;
                    self.level_down();
                } else {
                    self.level_down();
                    self.replay_last()?;
                }
                self.finalize()?;
                self.level_down();
            }
            1 => {
                if self.user_provided {
                    self.finalize()?;
                    self.level_down();
                } else {
                    self.level_down();
                    self.replay_last()?;
                }
            }
            _ => self.replay_last()?,
        }
        Ok(())
    }

    /// Clear one step: a typed register is zeroed in place, otherwise one
    /// level is popped. In the error state a single press restores the
    /// initial state.
    pub fn clear(&mut self) {
        if self.error {
            self.reset_levels();
            self.reset_input();
            self.clear_label = ClearLabel::AllClear;
            self.update_display();
            return;
        }

        if self.user_provided {
            self.registers[self.level] = 0.0;
        } else {
            self.level_down();
        }
        if self.level == 0 && self.registers == [0.0; LEVELS] {
            self.clear_label = ClearLabel::AllClear;
        }
        self.reset_input();
        self.update_display();
    }

    /// Diagnostic dump of every state field.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            error: self.error,
            input_active: self.input_active,
            user_provided: self.user_provided,
            level: self.level,
            registers: self.registers,
            operators: self.operators,
            last_operator: self.last_operator,
            last_operand: self.last_operand,
            decimal_place: self.decimal.map(|entry| entry.place),
            decimal_trailing_zero: self.decimal.map(|entry| entry.trailing_zero),
            display: self.display.clone(),
        }
    }

    /// Merge the current level's register into the one below with the
    /// pending operator, zeroing the register. Ends input mode.
    fn finalize(&mut self) -> CalcResult<()> {
        if let Some(op) = self.operators[self.level] {
            let merged = op.apply(self.registers[self.level - 1], self.registers[self.level])?;
            self.registers[self.level - 1] = merged;
            self.registers[self.level] = 0.0;
        }
        self.input_active = false;
        Ok(())
    }

    /// Replay the last typed operator/operand pair against the current
    /// level's register. Ends input mode.
    fn replay_last(&mut self) -> CalcResult<()> {
        if let Some(op) = self.last_operator {
            self.registers[self.level] =
                op.apply(self.registers[self.level], self.last_operand)?;
        }
        self.input_active = false;
        Ok(())
    }

    /// Drop one level, clearing its operator and register. Never goes below
    /// level 0; at level 0 this zeroes the running total.
    fn level_down(&mut self) {
        self.operators[self.level] = None;
        self.registers[self.level] = 0.0;
        if self.level > 0 {
            self.level -= 1;
        }
    }

    /// Return every register, operator and the replay pair to the initial
    /// state.
    fn reset_levels(&mut self) {
        self.error = false;
        self.input_active = true;
        self.level = 0;
        self.registers = [0.0; LEVELS];
        self.operators = [None; LEVELS];
        self.last_operator = None;
        self.last_operand = 0.0;
    }

    fn reset_input(&mut self) {
        self.user_provided = false;
        self.decimal = None;
    }

    /// Enter the sticky error state: full reset, display pinned to the
    /// error token until clear.
    fn throw_error(&mut self, error: CalcError) {
        tracing::warn!(%error, "calculation error");
        self.reset_levels();
        self.reset_input();
        self.error = true;
        self.display = self.error_token.clone();
    }

    /// Re-render the display from the visible register.
    ///
    /// When the current level has no typed digits yet, the level below is
    /// shown instead, so the user sees the operand they are about to
    /// combine with rather than a placeholder zero.
    fn update_display(&mut self) {
        let mut suffix = String::new();
        if let Some(entry) = self.decimal {
            if entry.trailing_zero {
                suffix = format!(".{}", "0".repeat(entry.place as usize));
            }
        }

        let visible = if !self.user_provided && self.level > 0 {
            self.level - 1
        } else {
            self.level
        };
        self.display = format!("{}{}", format_number(self.registers[visible]), suffix);
        tracing::trace!(state = ?self.snapshot(), "engine state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press_all(engine: &mut Engine, keys: &str) {
        for c in keys.chars() {
            engine.press(Key::from_char(c).expect("unbound test key"));
        }
    }

    fn display_after(keys: &str) -> String {
        let mut engine = Engine::new();
        press_all(&mut engine, keys);
        engine.display().to_string()
    }

    #[test]
    fn test_digit_accumulation() {
        assert_eq!(display_after("123"), "123");
        assert_eq!(display_after("0"), "0");
        assert_eq!(display_after("007"), "7");
    }

    #[test]
    fn test_decimal_entry() {
        assert_eq!(display_after("1.5"), "1.5");
        assert_eq!(display_after("1.25"), "1.25");
        assert_eq!(display_after("1.05"), "1.05");
    }

    #[test]
    fn test_decimal_suffix_rendering() {
        // The literal point and trailing zeros stay visible until a nonzero
        // fractional digit lands.
        assert_eq!(display_after("3."), "3.");
        assert_eq!(display_after("3.0"), "3.0");
        assert_eq!(display_after("3.00"), "3.00");
        assert_eq!(display_after("3.005"), "3.005");
    }

    #[test]
    fn test_second_decimal_point_ignored() {
        assert_eq!(display_after("3.."), "3.");
        assert_eq!(display_after("1.2.5"), "1.25");
    }

    #[test]
    fn test_sign_preserved_during_entry() {
        // Digits keep appending to a negated register, magnitude-first.
        assert_eq!(display_after("5s2"), "-52");
        assert_eq!(display_after("5s.25"), "-5.25");
    }

    #[test]
    fn test_sign_change_at_fresh_register() {
        assert_eq!(display_after("s"), "-0");
    }

    #[test]
    fn test_chained_same_precedence() {
        // Left-to-right evaluation.
        assert_eq!(display_after("2+3+4="), "9");
        assert_eq!(display_after("10-2-3="), "5");
        assert_eq!(display_after("2*3*4="), "24");
    }

    #[test]
    fn test_precedence_multiply_binds_tighter() {
        assert_eq!(display_after("2+3*4="), "14");
        assert_eq!(display_after("20-12/4="), "17");
    }

    #[test]
    fn test_priority_lane_collapses_on_additive() {
        assert_eq!(display_after("2+3*4+1="), "15");
        assert_eq!(display_after("2+3*4-1="), "13");
    }

    #[test]
    fn test_priority_lane_continues_on_multiplicative() {
        // 2 + 3*4/2 = 8
        assert_eq!(display_after("2+3*4/2="), "8");
    }

    #[test]
    fn test_division() {
        assert_eq!(display_after("14/4="), "3.5");
        assert_eq!(display_after("8/20="), "0.4");
    }

    #[test]
    fn test_square_root() {
        assert_eq!(display_after("9r"), "3");
        assert_eq!(display_after("2r"), format_number(2f64.sqrt()));
        // Digits keep appending to the result while input stays active.
        assert_eq!(display_after("9r5"), "35");
    }

    #[test]
    fn test_repeat_last_operation_on_equals() {
        let mut engine = Engine::new();
        press_all(&mut engine, "5+3=");
        assert_eq!(engine.display(), "8");
        engine.equals();
        assert_eq!(engine.display(), "11");
        engine.equals();
        assert_eq!(engine.display(), "14");
    }

    #[test]
    fn test_equals_right_after_operator_uses_typed_operand() {
        assert_eq!(display_after("5+="), "10");
        assert_eq!(display_after("3*="), "9");
    }

    #[test]
    fn test_repeat_equals_at_priority_lane() {
        // 2 + 3 * = squares the priority operand: 2 + 3*3 = 11.
        assert_eq!(display_after("2+3*="), "11");
    }

    #[test]
    fn test_sign_change_before_equals_updates_replay() {
        // The negation lands on both the register and the replay operand.
        assert_eq!(display_after("5+3s="), "2");
        assert_eq!(display_after("5+3s=="), "-1");
    }

    #[test]
    fn test_digit_after_equals_starts_fresh() {
        let mut engine = Engine::new();
        press_all(&mut engine, "5+3=");
        assert_eq!(engine.display(), "8");
        press_all(&mut engine, "2");
        assert_eq!(engine.display(), "2");
    }

    #[test]
    fn test_display_falls_back_to_level_below() {
        let mut engine = Engine::new();
        press_all(&mut engine, "2+");
        assert_eq!(engine.display(), "2");
        press_all(&mut engine, "3*");
        assert_eq!(engine.display(), "3");
        press_all(&mut engine, "4");
        assert_eq!(engine.display(), "4");
    }

    #[test]
    fn test_operator_highlight() {
        let mut engine = Engine::new();
        assert_eq!(engine.highlighted_operator(), None);
        press_all(&mut engine, "2+");
        assert_eq!(engine.highlighted_operator(), Some(Operator::Add));
        press_all(&mut engine, "3*");
        assert_eq!(engine.highlighted_operator(), Some(Operator::Multiply));
        press_all(&mut engine, "4=");
        assert_eq!(engine.highlighted_operator(), None);
    }

    #[test]
    fn test_replacing_operator_same_precedence_finalizes() {
        let mut engine = Engine::new();
        press_all(&mut engine, "5+3-");
        assert_eq!(engine.display(), "8");
        assert_eq!(engine.highlighted_operator(), Some(Operator::Subtract));
        press_all(&mut engine, "2=");
        assert_eq!(engine.display(), "6");
    }

    #[test]
    fn test_division_by_zero_enters_error_state() {
        let mut engine = Engine::new();
        press_all(&mut engine, "5/0=");
        assert!(engine.is_error());
        assert_eq!(engine.display(), "error");
    }

    #[test]
    fn test_division_by_typed_zero_via_operator() {
        let mut engine = Engine::new();
        press_all(&mut engine, "5/0+");
        assert!(engine.is_error());
        assert_eq!(engine.display(), "error");
        // No operator was recorded in the error state.
        assert_eq!(engine.highlighted_operator(), None);
    }

    #[test]
    fn test_square_root_of_negative_enters_error_state() {
        let mut engine = Engine::new();
        press_all(&mut engine, "4sr");
        assert!(engine.is_error());
        assert_eq!(engine.display(), "error");
    }

    #[test]
    fn test_error_state_is_sticky_until_clear() {
        let mut engine = Engine::new();
        press_all(&mut engine, "5/0=");
        press_all(&mut engine, "7+2=r.");
        assert!(engine.is_error());
        assert_eq!(engine.display(), "error");

        engine.clear();
        assert!(!engine.is_error());
        assert_eq!(engine.display(), "0");
        assert_eq!(engine.clear_label(), ClearLabel::AllClear);

        press_all(&mut engine, "1+2=");
        assert_eq!(engine.display(), "3");
    }

    #[test]
    fn test_custom_error_token() {
        let mut engine = Engine::with_error_token("Err");
        press_all(&mut engine, "1/0=");
        assert_eq!(engine.display(), "Err");
    }

    #[test]
    fn test_clear_steps_down_one_level_at_a_time() {
        let mut engine = Engine::new();
        press_all(&mut engine, "5+3");
        assert_eq!(engine.display(), "3");

        // First press wipes the typed operand, keeping the pending add.
        engine.clear();
        assert_eq!(engine.display(), "5");
        assert_eq!(engine.highlighted_operator(), Some(Operator::Add));

        press_all(&mut engine, "4=");
        assert_eq!(engine.display(), "9");
    }

    #[test]
    fn test_clear_pops_pending_operator_then_total() {
        let mut engine = Engine::new();
        press_all(&mut engine, "5+3");
        engine.clear();
        // Second press pops the default lane entirely.
        engine.clear();
        assert_eq!(engine.display(), "5");
        assert_eq!(engine.highlighted_operator(), None);
        // Third press zeroes the running total.
        engine.clear();
        assert_eq!(engine.display(), "0");
        assert_eq!(engine.clear_label(), ClearLabel::AllClear);
    }

    #[test]
    fn test_clear_is_idempotent_at_initial_state() {
        let mut engine = Engine::new();
        for _ in 0..3 {
            engine.clear();
            assert_eq!(engine.display(), "0");
            assert_eq!(engine.clear_label(), ClearLabel::AllClear);
        }
    }

    #[test]
    fn test_clear_label_transitions() {
        let mut engine = Engine::new();
        assert_eq!(engine.clear_label(), ClearLabel::AllClear);

        // A plain zero keystroke is not user input.
        engine.digit(0);
        assert_eq!(engine.clear_label(), ClearLabel::AllClear);

        engine.digit(5);
        assert_eq!(engine.clear_label(), ClearLabel::Clear);

        engine.clear();
        assert_eq!(engine.clear_label(), ClearLabel::AllClear);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut engine = Engine::new();
        press_all(&mut engine, "2+3.0");

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.level, 1);
        assert_eq!(snapshot.operators[1], Some(Operator::Add));
        assert_eq!(snapshot.decimal_place, Some(1));
        assert_eq!(snapshot.decimal_trailing_zero, Some(true));

        let json = serde_json::to_value(&snapshot).expect("snapshot should serialize");
        assert_eq!(json["level"], 1);
        assert_eq!(json["operators"][1], "add");
        assert_eq!(json["display"], "3.0");
    }
}
