use crate::connection::PacketSender;
use crate::error::Result;
use crate::stage::{Stage, Termination};

/// One Brainfuck instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `<`
    PointerDec,
    /// `>`
    PointerInc,
    /// `-`
    ValueDec,
    /// `+`
    ValueInc,
    /// `.`
    Emit,
    /// `,`
    Read,
    /// `[`
    LoopStart,
    /// `]`
    LoopEnd,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::PointerDec,
        Command::PointerInc,
        Command::ValueDec,
        Command::ValueInc,
        Command::Emit,
        Command::Read,
        Command::LoopStart,
        Command::LoopEnd,
    ];

    /// Map a code point to its command; anything else is a comment
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '<' => Some(Command::PointerDec),
            '>' => Some(Command::PointerInc),
            '-' => Some(Command::ValueDec),
            '+' => Some(Command::ValueInc),
            '.' => Some(Command::Emit),
            ',' => Some(Command::Read),
            '[' => Some(Command::LoopStart),
            ']' => Some(Command::LoopEnd),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Command::PointerDec => '<',
            Command::PointerInc => '>',
            Command::ValueDec => '-',
            Command::ValueInc => '+',
            Command::Emit => '.',
            Command::Read => ',',
            Command::LoopStart => '[',
            Command::LoopEnd => ']',
        }
    }
}

/// Turns code points into commands, silently dropping everything else
#[derive(Debug, Default)]
pub struct Lexer;

impl Stage for Lexer {
    type Input = char;
    type Output = Command;

    fn process(&mut self, input: char, output: &mut PacketSender<Command>) -> Result<()> {
        match Command::from_char(input) {
            Some(command) => output.emit(command),
            None => Ok(()),
        }
    }

    fn termination(&self) -> Termination {
        Termination::Propagate
    }

    fn name(&self) -> &str {
        "lexer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_roundtrip() {
        for command in Command::ALL {
            assert_eq!(Command::from_char(command.symbol()), Some(command));
        }
    }

    #[test]
    fn test_comments_ignored() {
        for c in ['a', ' ', '\n', '#', '→', char::REPLACEMENT_CHARACTER] {
            assert_eq!(Command::from_char(c), None);
        }
    }
}
