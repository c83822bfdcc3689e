use serde::{Deserialize, Serialize};

/// Virtual key code as reported by the capture primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const RETURN: KeyCode = KeyCode(36);
    pub const KEYPAD_ENTER: KeyCode = KeyCode(76);
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            KeyCode::RETURN => f.write_str("Return"),
            KeyCode::KEYPAD_ENTER => f.write_str("Enter"),
            KeyCode(code) => write!(f, "key {code}"),
        }
    }
}

/// Modifier flags held while a key went down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub command: bool,
    pub control: bool,
    pub option: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        command: false,
        control: false,
        option: false,
    };

    /// Shift (newline), Command, Control and Option all mean "not a send".
    pub const PASS_THROUGH: Modifiers = Modifiers {
        shift: true,
        command: true,
        control: true,
        option: true,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };

    pub fn is_empty(&self) -> bool {
        *self == Modifiers::NONE
    }

    pub fn intersects(&self, other: Modifiers) -> bool {
        (self.shift && other.shift)
            || (self.command && other.command)
            || (self.control && other.control)
            || (self.option && other.option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersects_checks_each_flag() {
        assert!(Modifiers::SHIFT.intersects(Modifiers::PASS_THROUGH));
        assert!(!Modifiers::NONE.intersects(Modifiers::PASS_THROUGH));
        let cmd = Modifiers {
            command: true,
            ..Modifiers::NONE
        };
        assert!(!cmd.intersects(Modifiers::SHIFT));
        assert!(cmd.intersects(Modifiers::PASS_THROUGH));
    }

    #[test]
    fn display_names_enter_keys() {
        assert_eq!(KeyCode::RETURN.to_string(), "Return");
        assert_eq!(KeyCode(12).to_string(), "key 12");
    }
}
