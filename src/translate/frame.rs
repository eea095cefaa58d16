use crate::connection::PacketSender;
use crate::error::Result;
use crate::stage::{Stage, Termination};

/// Opens `main`, declares the zeroed tape and the data pointer
pub const PROLOGUE: &str = "#include <stdio.h>\n\
void main() {\n\
unsigned char mem[6144];\n\
int i;\n\
for (i = 0; i < 6144; i++) {\n\
mem[i] = 0;\n\
}\n\
int pointer = 0;\n";

/// Closes `main`
pub const EPILOGUE: &str = "}\n";

/// Wraps the generated statements in a complete translation unit.
///
/// Re-framing: the upstream end of stream is replaced by the epilogue and a
/// fresh end of stream, so the output is a new stream rather than a relay.
#[derive(Debug, Default)]
pub struct Framer {
    statements: u64,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for Framer {
    type Input = &'static str;
    type Output = &'static str;

    fn on_start(&mut self, output: &mut PacketSender<&'static str>) -> Result<()> {
        output.emit(PROLOGUE)
    }

    fn process(&mut self, input: &'static str, output: &mut PacketSender<&'static str>) -> Result<()> {
        self.statements += 1;
        output.emit(input)
    }

    fn termination(&self) -> Termination {
        Termination::Reframe
    }

    fn on_end(&mut self, output: &mut PacketSender<&'static str>) -> Result<()> {
        tracing::debug!(statements = self.statements, "closing translation unit");
        output.emit(EPILOGUE)
    }

    fn name(&self) -> &str {
        "framer"
    }
}
