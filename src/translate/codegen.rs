use super::lexer::Command;
use crate::connection::PacketSender;
use crate::error::Result;
use crate::stage::{Stage, Termination};

impl Command {
    /// The C statement emitted for this command
    pub fn statement(self) -> &'static str {
        match self {
            Command::PointerDec => "pointer -= 1;\n",
            Command::PointerInc => "pointer += 1;\n",
            Command::ValueInc => "mem[pointer] += 1;\n",
            Command::ValueDec => "mem[pointer] -= 1;\n",
            Command::Emit => "putchar(mem[pointer]);\n",
            Command::Read => "mem[pointer] = getchar();\n",
            Command::LoopStart => "while (mem[pointer] != 0) {\n",
            Command::LoopEnd => "}\n",
        }
    }
}

/// Emits one C statement per command.
///
/// Loop brackets are translated as they come; nesting is never checked.
#[derive(Debug, Default)]
pub struct CodeGen;

impl Stage for CodeGen {
    type Input = Command;
    type Output = &'static str;

    fn process(&mut self, input: Command, output: &mut PacketSender<&'static str>) -> Result<()> {
        output.emit(input.statement())
    }

    fn termination(&self) -> Termination {
        Termination::Propagate
    }

    fn name(&self) -> &str {
        "codegen"
    }
}
